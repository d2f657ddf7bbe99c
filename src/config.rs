//! Configuration for the proxy pool and its health checker.

use http::HeaderMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Strategy for selecting a proxy from the available set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    /// Weighted random selection favouring reliable, fast, recently used proxies.
    #[default]
    Weighted,
    /// Select proxies in round-robin fashion.
    RoundRobin,
    /// Select a random available proxy.
    Random,
}

/// Configuration for the proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Timeout for a single health check.
    pub validation_timeout: Duration,
    /// Number of concurrent validation workers.
    pub validation_concurrency: usize,
    /// URL requested through each proxy to validate it.
    pub validation_url: String,
    /// Available proxies are re-validated once their last check is this old.
    pub validation_interval: Duration,
    /// A warning is logged while the pool holds fewer proxies than this.
    pub min_pool_size: usize,
    /// Upper bound on registered proxies; acquisition pauses when reached.
    pub max_pool_size: usize,
    /// Proxies older than this are dropped instead of being re-validated.
    pub proxy_ttl: Duration,
    /// Consecutive failures after which a proxy is disabled instead of cooled down.
    pub max_consecutive_failures: u32,
    /// How long a failed proxy rests before it is validated again.
    pub cooldown_duration: Duration,
    /// Wait used by `get` when the caller gives no timeout.
    pub default_get_timeout: Duration,
    /// Hand proxies out once and forget them.
    pub remove_after_get: bool,
    /// Maximum number of candidates requested from each source per fetch.
    pub fetch_batch_size: usize,
    /// Interval between acquisition passes.
    pub fetch_interval: Duration,
    /// Newly fetched proxies skip validation while this many are available.
    pub max_available_for_validation: Option<usize>,
    /// Strategy for selecting proxies.
    pub selection_strategy: SelectionStrategy,
    /// Maximum requests per second per proxy, enforced by the middleware.
    pub max_requests_per_second: f64,
    /// Number of times the middleware retries a request with another proxy.
    pub retry_count: usize,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        ProxyPoolConfigBuilder::new().build()
    }
}

/// Builder for `ProxyPoolConfig`.
#[derive(Default)]
pub struct ProxyPoolConfigBuilder {
    validation_timeout: Option<Duration>,
    validation_concurrency: Option<usize>,
    validation_url: Option<String>,
    validation_interval: Option<Duration>,
    min_pool_size: Option<usize>,
    max_pool_size: Option<usize>,
    proxy_ttl: Option<Duration>,
    max_consecutive_failures: Option<u32>,
    cooldown_duration: Option<Duration>,
    default_get_timeout: Option<Duration>,
    remove_after_get: bool,
    fetch_batch_size: Option<usize>,
    fetch_interval: Option<Duration>,
    max_available_for_validation: Option<usize>,
    selection_strategy: Option<SelectionStrategy>,
    max_requests_per_second: Option<f64>,
    retry_count: Option<usize>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout for health checks.
    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = Some(timeout);
        self
    }

    /// Set the number of concurrent validation workers.
    pub fn validation_concurrency(mut self, workers: usize) -> Self {
        self.validation_concurrency = Some(workers);
        self
    }

    /// Set the URL used for health checks.
    pub fn validation_url(mut self, url: impl Into<String>) -> Self {
        self.validation_url = Some(url.into());
        self
    }

    /// Set the interval after which available proxies are re-validated.
    pub fn validation_interval(mut self, interval: Duration) -> Self {
        self.validation_interval = Some(interval);
        self
    }

    pub fn min_pool_size(mut self, size: usize) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Set how long a proxy may stay in the pool.
    pub fn proxy_ttl(mut self, ttl: Duration) -> Self {
        self.proxy_ttl = Some(ttl);
        self
    }

    pub fn max_consecutive_failures(mut self, count: u32) -> Self {
        self.max_consecutive_failures = Some(count);
        self
    }

    pub fn cooldown_duration(mut self, duration: Duration) -> Self {
        self.cooldown_duration = Some(duration);
        self
    }

    pub fn default_get_timeout(mut self, timeout: Duration) -> Self {
        self.default_get_timeout = Some(timeout);
        self
    }

    /// Remove proxies from the pool once they are handed out.
    pub fn remove_after_get(mut self, remove: bool) -> Self {
        self.remove_after_get = remove;
        self
    }

    pub fn fetch_batch_size(mut self, size: usize) -> Self {
        self.fetch_batch_size = Some(size);
        self
    }

    pub fn fetch_interval(mut self, interval: Duration) -> Self {
        self.fetch_interval = Some(interval);
        self
    }

    /// Stop validating new arrivals while at least `count` proxies are available.
    pub fn max_available_for_validation(mut self, count: usize) -> Self {
        self.max_available_for_validation = Some(count);
        self
    }

    /// Set the strategy for selecting proxies.
    pub fn selection_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.selection_strategy = Some(strategy);
        self
    }

    /// Set the maximum requests per second per proxy.
    pub fn max_requests_per_second(mut self, rps: f64) -> Self {
        self.max_requests_per_second = Some(rps);
        self
    }

    /// Set the number of times to retry a request with different proxies.
    pub fn retry_count(mut self, count: usize) -> Self {
        self.retry_count = Some(count);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            validation_timeout: self.validation_timeout.unwrap_or(Duration::from_secs(10)),
            validation_concurrency: self.validation_concurrency.unwrap_or(10).max(1),
            validation_url: self
                .validation_url
                .unwrap_or_else(|| "http://httpbin.org/ip".to_string()),
            validation_interval: self.validation_interval.unwrap_or(Duration::from_secs(300)),
            min_pool_size: self.min_pool_size.unwrap_or(5),
            max_pool_size: self.max_pool_size.unwrap_or(100),
            proxy_ttl: self.proxy_ttl.unwrap_or(Duration::from_secs(3600)),
            max_consecutive_failures: self.max_consecutive_failures.unwrap_or(3),
            cooldown_duration: self.cooldown_duration.unwrap_or(Duration::from_secs(60)),
            default_get_timeout: self.default_get_timeout.unwrap_or(Duration::from_secs(30)),
            remove_after_get: self.remove_after_get,
            fetch_batch_size: self.fetch_batch_size.unwrap_or(50),
            fetch_interval: self.fetch_interval.unwrap_or(Duration::from_secs(60)),
            max_available_for_validation: self
                .max_available_for_validation
                .filter(|count| *count > 0),
            selection_strategy: self.selection_strategy.unwrap_or_default(),
            max_requests_per_second: self.max_requests_per_second.unwrap_or(5.0),
            retry_count: self.retry_count.unwrap_or(3),
        }
    }
}

/// Custom acceptance check applied to a probe response.
pub type ResponsePredicate = Arc<dyn Fn(&reqwest::Response) -> bool + Send + Sync>;

/// Configuration for [`HttpHealthChecker`](crate::HttpHealthChecker).
#[derive(Clone)]
pub struct HttpCheckerConfig {
    /// URL requested through the proxy.
    pub validation_url: String,
    /// Deadline for one probe.
    pub timeout: Duration,
    /// Status code a healthy proxy must return when no predicate is set.
    pub expected_status: u16,
    /// Replaces the status check when set.
    pub predicate: Option<ResponsePredicate>,
    /// Headers sent with every probe.
    pub headers: HeaderMap,
    /// Upper bound on cached per-proxy clients.
    pub max_cached_clients: usize,
    /// Cached clients unused for this long are dropped.
    pub client_idle_timeout: Duration,
    /// Idle timeout of pooled connections inside one client.
    pub connection_idle_timeout: Duration,
    /// Idle connections kept per target host inside one client.
    pub max_idle_connections_per_host: usize,
}

impl HttpCheckerConfig {
    pub fn new(validation_url: impl Into<String>) -> Self {
        Self {
            validation_url: validation_url.into(),
            timeout: Duration::from_secs(10),
            expected_status: 200,
            predicate: None,
            headers: HeaderMap::new(),
            max_cached_clients: 512,
            client_idle_timeout: Duration::from_secs(300),
            connection_idle_timeout: Duration::from_secs(120),
            max_idle_connections_per_host: 4,
        }
    }

    /// Checker settings derived from the pool configuration.
    pub fn from_pool(config: &ProxyPoolConfig) -> Self {
        Self::new(config.validation_url.clone()).timeout(config.validation_timeout)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn expected_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    /// Accept a response only if `predicate` returns true.
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&reqwest::Response) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn max_cached_clients(mut self, max: usize) -> Self {
        self.max_cached_clients = max;
        self
    }

    pub fn client_idle_timeout(mut self, timeout: Duration) -> Self {
        self.client_idle_timeout = timeout;
        self
    }

    pub fn connection_idle_timeout(mut self, timeout: Duration) -> Self {
        self.connection_idle_timeout = timeout;
        self
    }

    pub fn max_idle_connections_per_host(mut self, max: usize) -> Self {
        self.max_idle_connections_per_host = max;
        self
    }
}

impl fmt::Debug for HttpCheckerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCheckerConfig")
            .field("validation_url", &self.validation_url)
            .field("timeout", &self.timeout)
            .field("expected_status", &self.expected_status)
            .field("predicate", &self.predicate.is_some())
            .field("max_cached_clients", &self.max_cached_clients)
            .field("client_idle_timeout", &self.client_idle_timeout)
            .finish()
    }
}
