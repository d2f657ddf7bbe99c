#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use proxy_pilot::{
    HealthCheck, PoolObserver, PoolSnapshot, Proxy, ProxyEndpoint, ProxySource, ProxyState,
    ProxyType, SourceError, ValidationKind, ValidationOutcome,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn endpoint(i: usize) -> ProxyEndpoint {
    ProxyEndpoint::new(format!("10.0.0.{i}"), 8080, ProxyType::Http)
}

/// Source serving a list that tests can grow between fetches.
pub struct MockSource {
    proxies: Mutex<Vec<ProxyEndpoint>>,
    fail: AtomicBool,
    fetches: AtomicUsize,
}

impl MockSource {
    pub fn new(count: usize) -> Arc<Self> {
        Self::with((1..=count).map(endpoint).collect())
    }

    pub fn with(proxies: Vec<ProxyEndpoint>) -> Arc<Self> {
        Arc::new(Self {
            proxies: Mutex::new(proxies),
            fail: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn push(&self, proxy: ProxyEndpoint) {
        self.proxies.lock().push(proxy);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxySource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, count: usize) -> Result<Vec<ProxyEndpoint>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("mock source down").into());
        }
        let mut proxies = self.proxies.lock().clone();
        if count > 0 {
            proxies.truncate(count);
        }
        Ok(proxies)
    }
}

/// Checker returning a fixed verdict after an optional delay.
pub struct MockChecker {
    healthy: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockChecker {
    pub fn healthy() -> Arc<Self> {
        Self::new(true, Duration::ZERO)
    }

    pub fn failing() -> Arc<Self> {
        Self::new(false, Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::new(true, delay)
    }

    fn new(healthy: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            healthy,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthCheck for MockChecker {
    async fn check(&self, _proxy: &Proxy) -> ValidationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let elapsed = self.delay.max(Duration::from_millis(10));
        if self.healthy {
            ValidationOutcome::success(elapsed, 200)
        } else {
            let reason = "connection refused";
            ValidationOutcome::failed(ValidationKind::ConnectionFailed, elapsed, reason)
        }
    }
}

/// Observer recording transitions and checking every published snapshot.
#[derive(Default)]
pub struct RecordingObserver {
    pub transitions: Mutex<Vec<(String, ProxyState, ProxyState)>>,
    pub validations: AtomicUsize,
    pub inconsistent_snapshots: AtomicUsize,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saw(&self, from: ProxyState, to: ProxyState) -> bool {
        self.transitions
            .lock()
            .iter()
            .any(|(_, f, t)| *f == from && *t == to)
    }
}

impl PoolObserver for RecordingObserver {
    fn on_validated(&self, _proxy: &Proxy, _outcome: &ValidationOutcome) {
        self.validations.fetch_add(1, Ordering::SeqCst);
    }

    fn on_state_changed(&self, proxy: &Proxy, from: ProxyState, to: ProxyState) {
        self.transitions.lock().push((proxy.id().to_string(), from, to));
    }

    fn on_pool_changed(&self, snapshot: &PoolSnapshot) {
        if snapshot.state_sum() != snapshot.total_count {
            self.inconsistent_snapshots.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Observer that panics on every event.
pub struct PanickingObserver;

impl PoolObserver for PanickingObserver {
    fn on_state_changed(&self, _proxy: &Proxy, _from: ProxyState, _to: ProxyState) {
        panic!("observer failure");
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Minimal HTTP proxy answering every request with `response`.
pub async fn fake_proxy(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Proxy that accepts connections and never answers.
pub async fn silent_proxy() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn local_proxy(addr: SocketAddr) -> Proxy {
    Proxy::new(ProxyEndpoint::new("127.0.0.1", addr.port(), ProxyType::Http), 100.0)
}
