//! A self-maintaining proxy pool.
//!
//! The pool fetches proxy candidates from one or more sources, validates them
//! concurrently, tracks per-proxy reliability and latency, and hands healthy
//! proxies to consumers, who can wait with a timeout when none is available.
//! [`ProxyPoolMiddleware`] plugs the pool into a `reqwest-middleware` client.

mod builder;
mod checker;
mod config;
mod error;
mod middleware;
mod observer;
mod parser;
mod pool;
mod proxy;
mod scheduler;
mod source;
mod state;
mod stats;
mod storage;
mod validation;

pub use builder::ProxyPoolBuilder;
pub use checker::{CompositeHealthCheck, HealthCheck, HttpHealthChecker};
pub use config::{
    HttpCheckerConfig, ProxyPoolConfig, ProxyPoolConfigBuilder, ResponsePredicate,
    SelectionStrategy,
};
pub use error::{Error, Result, SourceError};
pub use middleware::ProxyPoolMiddleware;
pub use observer::{NoopObserver, PoolObserver};
pub use parser::{LineParser, ProxyParser};
pub use pool::ProxyPool;
pub use proxy::{Proxy, ProxyEndpoint, ProxyRateLimiter, ProxyState, ProxyType};
pub use scheduler::{RandomScheduler, RoundRobinScheduler, Scheduler, WeightedScheduler};
pub use source::{CompositeSource, FileSource, HttpSource, ProxySource};
pub use state::{PoolCounters, PoolSnapshot};
pub use stats::ProxyStatistics;
pub use storage::{InMemoryStorage, ProxyStorage};
pub use validation::{ValidationKind, ValidationOutcome};

pub use tokio_util::sync::CancellationToken;
