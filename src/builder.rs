//! Wiring of a [`ProxyPool`] from its parts.

use crate::checker::{HealthCheck, HttpHealthChecker};
use crate::config::{HttpCheckerConfig, ProxyPoolConfig};
use crate::error::Result;
use crate::observer::{NoopObserver, PoolObserver};
use crate::pool::ProxyPool;
use crate::scheduler::Scheduler;
use crate::source::{FileSource, HttpSource, ProxySource};
use crate::storage::{InMemoryStorage, ProxyStorage};

use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Builder for [`ProxyPool`].
///
/// Anything not set explicitly falls back to a default: an
/// [`HttpHealthChecker`] derived from the configuration, the scheduler of the
/// configured [`SelectionStrategy`](crate::SelectionStrategy), an
/// [`InMemoryStorage`] and a [`NoopObserver`].
#[derive(Default)]
pub struct ProxyPoolBuilder {
    config: Option<ProxyPoolConfig>,
    sources: Vec<Arc<dyn ProxySource>>,
    storage: Option<Arc<dyn ProxyStorage>>,
    checker: Option<Arc<dyn HealthCheck>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    observer: Option<Arc<dyn PoolObserver>>,
}

impl ProxyPoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ProxyPoolConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Add a source of proxy candidates.
    pub fn source(mut self, source: Arc<dyn ProxySource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a plain-text proxy list served over HTTP.
    pub fn http_source(self, url: impl Into<String>) -> Self {
        self.source(Arc::new(HttpSource::new(url)))
    }

    /// Add a plain-text proxy list read from disk.
    pub fn file_source(self, path: impl Into<PathBuf>) -> Self {
        self.source(Arc::new(FileSource::new(path)))
    }

    pub fn storage(mut self, storage: Arc<dyn ProxyStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn checker(mut self, checker: Arc<dyn HealthCheck>) -> Self {
        self.checker = Some(checker);
        self
    }

    /// Override the scheduler chosen by the configured strategy.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PoolObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the pool. It does not run until [`ProxyPool::start`] is called.
    pub fn build(self) -> Result<Arc<ProxyPool>> {
        let config = self.config.unwrap_or_default();

        let checker: Arc<dyn HealthCheck> = match self.checker {
            Some(checker) => checker,
            None => {
                Url::parse(&config.validation_url)?;
                Arc::new(HttpHealthChecker::new(HttpCheckerConfig::from_pool(&config)))
            }
        };
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| config.selection_strategy.scheduler());
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(InMemoryStorage::new()));
        let observer = self.observer.unwrap_or_else(|| Arc::new(NoopObserver));

        Ok(ProxyPool::new(
            config,
            self.sources,
            storage,
            checker,
            scheduler,
            observer,
        ))
    }
}
