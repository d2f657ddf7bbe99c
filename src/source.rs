//! Sources of proxy candidates.

use crate::error::SourceError;
use crate::parser::{LineParser, ProxyParser};
use crate::proxy::ProxyEndpoint;

use async_trait::async_trait;
use log::{info, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Produces proxy candidates for the pool.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Name recorded as the provenance of fetched candidates.
    fn name(&self) -> &str;

    /// Fetch up to `count` candidates, or every candidate when `count` is 0.
    async fn fetch(&self, count: usize) -> Result<Vec<ProxyEndpoint>, SourceError>;
}

fn take(mut proxies: Vec<ProxyEndpoint>, count: usize, source: &str) -> Vec<ProxyEndpoint> {
    if count > 0 {
        proxies.truncate(count);
    }
    for proxy in &mut proxies {
        proxy.source.get_or_insert_with(|| source.to_string());
    }
    proxies
}

/// Downloads a proxy list over HTTP.
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
    parser: Arc<dyn ProxyParser>,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            parser: Arc::new(LineParser::new()),
        }
    }

    /// Use a custom client for downloading the list.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ProxyParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProxySource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, count: usize) -> Result<Vec<ProxyEndpoint>, SourceError> {
        let content = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let proxies = self.parser.parse(&content);
        info!("Fetched {} proxies from {}", proxies.len(), self.url);
        Ok(take(proxies, count, self.name()))
    }
}

/// Reads a proxy list from a local file.
pub struct FileSource {
    path: PathBuf,
    parser: Arc<dyn ProxyParser>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            parser: Arc::new(LineParser::new()),
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn ProxyParser>) -> Self {
        self.parser = parser;
        self
    }
}

#[async_trait]
impl ProxySource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, count: usize) -> Result<Vec<ProxyEndpoint>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let proxies = self.parser.parse(&content);
        Ok(take(proxies, count, self.name()))
    }
}

/// Merges several sources, dropping duplicate identities.
///
/// A failing member is logged and skipped; the composite fails only when
/// every member fails.
pub struct CompositeSource {
    sources: Vec<Arc<dyn ProxySource>>,
}

impl CompositeSource {
    pub fn new(sources: Vec<Arc<dyn ProxySource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl ProxySource for CompositeSource {
    fn name(&self) -> &str {
        "composite"
    }

    async fn fetch(&self, count: usize) -> Result<Vec<ProxyEndpoint>, SourceError> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        let mut last_error = None;
        let mut succeeded = false;

        for source in &self.sources {
            match source.fetch(count).await {
                Ok(proxies) => {
                    succeeded = true;
                    merged.extend(proxies.into_iter().filter(|proxy| seen.insert(proxy.id())));
                }
                Err(e) => {
                    warn!("Failed to fetch proxies from {}: {}", source.name(), e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !succeeded => Err(e),
            _ => Ok(take(merged, count, self.name())),
        }
    }
}
