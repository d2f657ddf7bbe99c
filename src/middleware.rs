//! Middleware implementation for reqwest.

use crate::pool::ProxyPool;
use crate::proxy::Proxy;
use crate::validation::ValidationKind;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest_middleware::{Error, Middleware, Next, Result};
use std::sync::Arc;
use std::time::Instant;

/// Middleware that sends each request through a proxy taken from a [`ProxyPool`].
///
/// A failed attempt is reported to the pool and retried with another proxy,
/// up to the configured retry count.
#[derive(Clone)]
pub struct ProxyPoolMiddleware {
    pool: Arc<ProxyPool>,
}

impl ProxyPoolMiddleware {
    /// Create a middleware backed by a pool. The pool must be started.
    pub fn new(pool: Arc<ProxyPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    async fn attempt(
        &self,
        proxy: &Arc<Proxy>,
        request: reqwest::Request,
    ) -> std::result::Result<reqwest::Response, (ValidationKind, Error)> {
        // Apply rate limiting
        proxy.limiter().until_ready().await;

        let reqwest_proxy = proxy
            .to_reqwest_proxy()
            .map_err(|e| (ValidationKind::Exception, Error::Reqwest(e)))?;
        let client = reqwest::Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.pool.config().validation_timeout)
            .build()
            .map_err(|e| (ValidationKind::Exception, Error::Reqwest(e)))?;

        let response = client.execute(request).await.map_err(|e| {
            let kind = if e.is_timeout() {
                ValidationKind::Timeout
            } else if e.is_connect() {
                ValidationKind::ConnectionFailed
            } else {
                ValidationKind::Exception
            };
            (kind, Error::Reqwest(e))
        })?;

        if response.status() == reqwest::StatusCode::PROXY_AUTHENTICATION_REQUIRED {
            return Err((
                ValidationKind::AuthenticationFailed,
                Error::Middleware(anyhow!("Proxy {} requires authentication", proxy)),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl Middleware for ProxyPoolMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        _extensions: &mut http::Extensions,
        _next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let max_retries = self.pool.config().retry_count;
        let mut retry_count = 0;

        loop {
            // Clone before taking a proxy so a streaming body never strands one in use.
            let proxied_request = req.try_clone().ok_or_else(|| {
                Error::Middleware(anyhow!(
                    "Request object is not cloneable. Are you passing a streaming body?"
                ))
            })?;

            let proxy = self
                .pool
                .get(None)
                .await
                .map_err(|e| Error::Middleware(anyhow!(e)))?;

            debug!("Using proxy: {} (attempt {})", proxy, retry_count + 1);
            let start = Instant::now();

            match self.attempt(&proxy, proxied_request).await {
                Ok(response) => {
                    self.pool.report_success(&proxy, start.elapsed()).await;
                    return Ok(response);
                }
                Err((kind, err)) => {
                    warn!(
                        "Request failed with proxy {} (attempt {}): {}",
                        proxy,
                        retry_count + 1,
                        err
                    );
                    self.pool.report_failure(&proxy, kind).await;

                    retry_count += 1;
                    if retry_count > max_retries {
                        return Err(err);
                    }
                }
            }
        }
    }
}
