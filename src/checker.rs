//! Health checking of proxies.

use crate::config::HttpCheckerConfig;
use crate::proxy::Proxy;
use crate::validation::{ValidationKind, ValidationOutcome};

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum number of idle clients evicted inline when the cache is full.
const MAX_INLINE_EVICTIONS: usize = 16;

/// Probes a proxy and classifies the result.
///
/// Implementations never fail: every problem is reported as a failed
/// [`ValidationOutcome`].
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self, proxy: &Proxy) -> ValidationOutcome;
}

struct CachedEntry<C> {
    client: C,
    last_used: Instant,
}

/// Cache of per-proxy clients with idle eviction.
///
/// Entries idle for at least `idle_timeout` are dropped by a sweep that runs
/// at most once per idle window. When the cache is full, a few idle entries
/// are evicted before a new one is inserted.
pub(crate) struct ClientCache<C> {
    entries: Mutex<HashMap<String, CachedEntry<C>>>,
    last_sweep: Mutex<Option<Instant>>,
    max_entries: usize,
    idle_timeout: Duration,
}

impl<C: Clone> ClientCache<C> {
    pub(crate) fn new(max_entries: usize, idle_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            last_sweep: Mutex::new(None),
            max_entries,
            idle_timeout,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Return the cached client for `key`, building one with `make` if needed.
    pub(crate) fn get_or_insert_with<E, F>(&self, key: &str, now: Instant, make: F) -> Result<C, E>
    where
        F: FnOnce() -> Result<C, E>,
    {
        self.maybe_sweep(now);

        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.last_used = now;
            return Ok(entry.client.clone());
        }

        if entries.len() >= self.max_entries {
            let idle: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| self.is_idle(entry, now))
                .map(|(key, _)| key.clone())
                .take(MAX_INLINE_EVICTIONS)
                .collect();
            for key in idle {
                entries.remove(&key);
            }
        }

        let client = make()?;
        entries.insert(
            key.to_string(),
            CachedEntry {
                client: client.clone(),
                last_used: now,
            },
        );
        Ok(client)
    }

    /// Drop idle entries, unless a sweep already ran within the idle window.
    pub(crate) fn maybe_sweep(&self, now: Instant) {
        {
            let mut last_sweep = self.last_sweep.lock();
            if let Some(last) = *last_sweep {
                if now.saturating_duration_since(last) < self.idle_timeout {
                    return;
                }
            }
            *last_sweep = Some(now);
        }

        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_idle(entry, now));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!("Evicted {} idle health-check clients", evicted);
        }
    }

    fn is_idle(&self, entry: &CachedEntry<C>, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_used) >= self.idle_timeout
    }
}

/// Validates a proxy with one HTTP GET through it.
pub struct HttpHealthChecker {
    config: HttpCheckerConfig,
    clients: ClientCache<reqwest::Client>,
}

impl HttpHealthChecker {
    pub fn new(config: HttpCheckerConfig) -> Self {
        let clients = ClientCache::new(config.max_cached_clients, config.client_idle_timeout);
        Self { config, clients }
    }

    pub fn config(&self) -> &HttpCheckerConfig {
        &self.config
    }

    /// Number of per-proxy clients currently cached.
    pub fn cached_clients(&self) -> usize {
        self.clients.len()
    }

    fn client_for(&self, proxy: &Proxy) -> Result<reqwest::Client, reqwest::Error> {
        self.clients.get_or_insert_with(proxy.id(), Instant::now(), || {
            reqwest::Client::builder()
                .proxy(proxy.to_reqwest_proxy()?)
                .timeout(self.config.timeout)
                .pool_idle_timeout(self.config.connection_idle_timeout)
                .pool_max_idle_per_host(self.config.max_idle_connections_per_host)
                .default_headers(self.config.headers.clone())
                .build()
        })
    }

    fn classify_response(
        &self,
        response: &reqwest::Response,
        elapsed: Duration,
    ) -> ValidationOutcome {
        let status = response.status();
        if status == reqwest::StatusCode::PROXY_AUTHENTICATION_REQUIRED {
            return ValidationOutcome::failed(
                ValidationKind::AuthenticationFailed,
                elapsed,
                "Proxy authentication required",
            )
            .with_status(status.as_u16());
        }

        let accepted = match &self.config.predicate {
            Some(predicate) => predicate(response),
            None => status.is_success() && status.as_u16() == self.config.expected_status,
        };

        if accepted {
            ValidationOutcome::success(elapsed, status.as_u16())
        } else {
            ValidationOutcome::failed(
                ValidationKind::InvalidResponse,
                elapsed,
                format!("Unexpected response status {}", status),
            )
            .with_status(status.as_u16())
        }
    }
}

fn classify_error(err: &reqwest::Error, elapsed: Duration) -> ValidationOutcome {
    if err.is_timeout() {
        ValidationOutcome::timeout(elapsed)
    } else if err.is_connect() {
        ValidationOutcome::failed(ValidationKind::ConnectionFailed, elapsed, err.to_string())
    } else {
        ValidationOutcome::failed(ValidationKind::Exception, elapsed, err.to_string())
    }
}

#[async_trait]
impl HealthCheck for HttpHealthChecker {
    async fn check(&self, proxy: &Proxy) -> ValidationOutcome {
        let start = Instant::now();

        let client = match self.client_for(proxy) {
            Ok(client) => client,
            Err(e) => {
                return ValidationOutcome::failed(
                    ValidationKind::Exception,
                    start.elapsed(),
                    format!("Failed to build client for {}: {}", proxy, e),
                );
            }
        };

        let request = client.get(&self.config.validation_url).send();
        let outcome = match tokio::time::timeout(self.config.timeout, request).await {
            Err(_) => ValidationOutcome::timeout(start.elapsed()),
            Ok(Err(e)) => classify_error(&e, start.elapsed()),
            Ok(Ok(response)) => self.classify_response(&response, start.elapsed()),
        };

        debug!("Health check of {}: {} in {:?}", proxy, outcome.kind(), outcome.elapsed());
        outcome
    }
}

/// Runs several checks in order and stops at the first failure.
pub struct CompositeHealthCheck {
    checkers: Vec<Arc<dyn HealthCheck>>,
}

impl CompositeHealthCheck {
    pub fn new(checkers: Vec<Arc<dyn HealthCheck>>) -> Self {
        Self { checkers }
    }
}

#[async_trait]
impl HealthCheck for CompositeHealthCheck {
    async fn check(&self, proxy: &Proxy) -> ValidationOutcome {
        let mut total = Duration::ZERO;
        let mut last = None;

        for checker in &self.checkers {
            let outcome = checker.check(proxy).await;
            total += outcome.elapsed();
            if !outcome.is_success() {
                return outcome;
            }
            last = Some(outcome);
        }

        match last {
            Some(outcome) => outcome.with_elapsed(total),
            None => ValidationOutcome::failed(
                ValidationKind::Exception,
                Duration::ZERO,
                "No health checks configured",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ProxyEndpoint, ProxyType};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const IDLE: Duration = Duration::from_secs(300);

    fn insert(cache: &ClientCache<u32>, key: &str, value: u32, now: Instant) -> u32 {
        cache
            .get_or_insert_with(key, now, || Ok::<_, Infallible>(value))
            .unwrap()
    }

    #[test]
    fn test_cache_reuses_client() {
        let cache = ClientCache::new(8, IDLE);
        let now = Instant::now();
        assert_eq!(insert(&cache, "a", 1, now), 1);
        assert_eq!(insert(&cache, "a", 2, now), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_idle_entries_evicted_only_after_timeout() {
        let cache = ClientCache::new(8, IDLE);
        let t0 = Instant::now();
        insert(&cache, "a", 1, t0);

        cache.maybe_sweep(t0 + IDLE - Duration::from_secs(1));
        assert_eq!(cache.len(), 1);

        cache.maybe_sweep(t0 + IDLE);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_sweep_runs_once_per_window() {
        let cache = ClientCache::new(8, IDLE);
        let t0 = Instant::now();
        insert(&cache, "a", 1, t0);
        insert(&cache, "a", 1, t0 + Duration::from_secs(100));

        cache.maybe_sweep(t0 + IDLE);
        assert_eq!(cache.len(), 1);

        // "a" is idle by now, but a sweep already ran in this window.
        cache.maybe_sweep(t0 + IDLE + Duration::from_secs(150));
        assert_eq!(cache.len(), 1);

        cache.maybe_sweep(t0 + IDLE * 2);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_full_cache_evicts_idle_before_insert() {
        let cache = ClientCache::new(2, IDLE);
        let t0 = Instant::now();
        insert(&cache, "a", 1, t0);
        insert(&cache, "b", 2, t0 + Duration::from_secs(200));
        *cache.last_sweep.lock() = Some(t0 + Duration::from_secs(350));

        // "a" is idle, "b" is not.
        insert(&cache, "c", 3, t0 + Duration::from_secs(400));
        let mut keys: Vec<String> = cache.entries.lock().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_full_cache_still_inserts_when_nothing_idle() {
        let cache = ClientCache::new(1, IDLE);
        let now = Instant::now();
        insert(&cache, "a", 1, now);
        insert(&cache, "b", 2, now);
        assert_eq!(cache.len(), 2);
    }

    struct FixedCheck {
        outcome: ValidationOutcome,
        calls: AtomicUsize,
    }

    impl FixedCheck {
        fn new(outcome: ValidationOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HealthCheck for FixedCheck {
        async fn check(&self, _proxy: &Proxy) -> ValidationOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn proxy() -> Proxy {
        Proxy::new(ProxyEndpoint::new("127.0.0.1", 3128, ProxyType::Http), 5.0)
    }

    #[tokio::test]
    async fn test_composite_sums_elapsed() {
        let first = FixedCheck::new(ValidationOutcome::success(Duration::from_millis(100), 200));
        let second = FixedCheck::new(ValidationOutcome::success(Duration::from_millis(50), 204));
        let composite = CompositeHealthCheck::new(vec![first as Arc<dyn HealthCheck>, second]);

        let outcome = composite.check(&proxy()).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.elapsed(), Duration::from_millis(150));
        assert_eq!(outcome.status(), Some(204));
    }

    #[tokio::test]
    async fn test_composite_short_circuits() {
        let failing = FixedCheck::new(ValidationOutcome::timeout(Duration::from_secs(1)));
        let never = FixedCheck::new(ValidationOutcome::success(Duration::from_millis(1), 200));
        let composite =
            CompositeHealthCheck::new(vec![failing.clone() as Arc<dyn HealthCheck>, never.clone()]);

        let outcome = composite.check(&proxy()).await;
        assert_eq!(outcome.kind(), ValidationKind::Timeout);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_composite_fails() {
        let outcome = CompositeHealthCheck::new(Vec::new()).check(&proxy()).await;
        assert_eq!(outcome.kind(), ValidationKind::Exception);
    }
}
