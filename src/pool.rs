//! Core proxy pool implementation.
//!
//! The pool keeps every proxy in a registry, moves it through the lifecycle
//! state machine and hands healthy proxies to consumers. Background tasks
//! fetch new candidates, validate them on a resizable worker pool, re-validate
//! stale proxies and release proxies whose cooldown elapsed.
//!
//! Locks are always taken in the order waiter queue, proxy record, counters.

use crate::builder::ProxyPoolBuilder;
use crate::checker::HealthCheck;
use crate::config::ProxyPoolConfig;
use crate::error::{Error, Result};
use crate::observer::PoolObserver;
use crate::proxy::{Proxy, ProxyRecord, ProxyState};
use crate::scheduler::Scheduler;
use crate::source::ProxySource;
use crate::state::{PoolCounters, PoolSnapshot};
use crate::storage::ProxyStorage;
use crate::validation::ValidationKind;

use futures::future;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest period accepted for the background loops.
const MIN_LOOP_PERIOD: Duration = Duration::from_millis(1);

/// A state change applied under the proxy lock and not yet published.
struct Transition {
    from: ProxyState,
    to: ProxyState,
    /// The proxy left the pool without expiring (remove-after-get).
    detached: bool,
    snapshot: PoolSnapshot,
}

struct Waiter {
    tx: oneshot::Sender<Arc<Proxy>>,
}

/// Why a proxy offered to the waiter queue was not handed over.
enum Missed {
    /// No live waiter is queued.
    NoWaiter,
    /// The proxy was no longer available when claimed.
    Taken,
}

struct Worker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Workers {
    active: Vec<Worker>,
    /// Workers cancelled by a shrink that may still be finishing a probe.
    retired: Vec<JoinHandle<()>>,
}

struct Run {
    token: CancellationToken,
    loops: Vec<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy)]
enum Maintenance {
    Acquire,
    Revalidate,
    Cooldown,
}

/// Keeps the "waiting" counter in step with a queued consumer.
struct WaitingGuard<'a> {
    counters: &'a Mutex<PoolCounters>,
}

impl<'a> WaitingGuard<'a> {
    fn new(counters: &'a Mutex<PoolCounters>) -> Self {
        counters.lock().increment_waiting();
        Self { counters }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.counters.lock().decrement_waiting();
    }
}

fn failure_state(consecutive_failures: u32, max_failures: u32) -> ProxyState {
    if consecutive_failures >= max_failures {
        ProxyState::Disabled
    } else {
        ProxyState::Cooldown
    }
}

/// A self-maintaining pool of proxies.
///
/// Created with [`ProxyPool::builder`] and shared as `Arc<ProxyPool>`.
/// Background work only runs between [`start`](Self::start) and
/// [`stop`](Self::stop).
pub struct ProxyPool {
    config: ProxyPoolConfig,
    sources: Vec<Arc<dyn ProxySource>>,
    storage: Arc<dyn ProxyStorage>,
    checker: Arc<dyn HealthCheck>,
    scheduler: Arc<dyn Scheduler>,
    observer: Arc<dyn PoolObserver>,

    counters: Mutex<PoolCounters>,
    waiters: Mutex<VecDeque<Waiter>>,

    queue_tx: mpsc::UnboundedSender<Arc<Proxy>>,
    queue_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<Proxy>>>,

    workers: Mutex<Workers>,
    desired_workers: AtomicUsize,
    run: Mutex<Option<Run>>,
}

impl ProxyPool {
    /// Create a builder for a new pool.
    pub fn builder() -> ProxyPoolBuilder {
        ProxyPoolBuilder::new()
    }

    pub(crate) fn new(
        config: ProxyPoolConfig,
        sources: Vec<Arc<dyn ProxySource>>,
        storage: Arc<dyn ProxyStorage>,
        checker: Arc<dyn HealthCheck>,
        scheduler: Arc<dyn Scheduler>,
        observer: Arc<dyn PoolObserver>,
    ) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let workers = config.validation_concurrency.max(1);

        Arc::new(Self {
            config,
            sources,
            storage,
            checker,
            scheduler,
            observer,
            counters: Mutex::new(PoolCounters::new()),
            waiters: Mutex::new(VecDeque::new()),
            queue_tx,
            queue_rx: tokio::sync::Mutex::new(queue_rx),
            workers: Mutex::new(Workers::default()),
            desired_workers: AtomicUsize::new(workers),
            run: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ProxyPoolConfig {
        &self.config
    }

    /// Whether the background tasks are running.
    pub fn is_running(&self) -> bool {
        self.run.lock().is_some()
    }

    /// Start the background tasks and perform one initial fetch.
    ///
    /// Calling `start` on a running pool does nothing.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::NoSource);
        }

        let token = {
            let mut run = self.run.lock();
            if run.is_some() {
                return Ok(());
            }
            let token = CancellationToken::new();
            *run = Some(Run {
                token: token.clone(),
                loops: Vec::new(),
            });
            token
        };

        self.restore_counts().await;

        let tasks = [Maintenance::Acquire, Maintenance::Revalidate, Maintenance::Cooldown];
        let loops: Vec<JoinHandle<()>> = tasks
            .into_iter()
            .map(|task| tokio::spawn(Arc::clone(self).maintain(task, token.child_token())))
            .collect();
        if let Some(run) = self.run.lock().as_mut() {
            run.loops.extend(loops);
        }

        let workers = self.resize_workers();
        info!(
            "Proxy pool started with {} sources and {} validation workers",
            self.sources.len(),
            workers
        );

        self.fetch_now().await;
        Ok(())
    }

    /// Stop every background task and unblock waiting consumers.
    ///
    /// Waiting consumers fail with [`Error::Stopped`]. Calling `stop` on a
    /// stopped pool does nothing.
    pub async fn stop(&self) {
        let Some(run) = self.run.lock().take() else {
            return;
        };
        run.token.cancel();

        let mut handles = run.loops;
        {
            let mut workers = self.workers.lock();
            for worker in workers.active.drain(..) {
                worker.token.cancel();
                handles.push(worker.handle);
            }
            handles.append(&mut workers.retired);
        }

        // Dropping the senders wakes every waiter with `Stopped`.
        let waiters: Vec<Waiter> = self.waiters.lock().drain(..).collect();
        drop(waiters);

        for result in future::join_all(handles).await {
            if let Err(e) = result {
                if e.is_panic() {
                    warn!("Pool task panicked: {}", e);
                }
            }
        }
        info!("Proxy pool stopped");
    }

    /// Take an available proxy without waiting.
    pub async fn try_get(&self) -> Option<Arc<Proxy>> {
        self.counters.lock().record_get_request();
        self.take_available().await
    }

    /// Wait up to `timeout` (or the configured default) for a proxy.
    pub async fn get(&self, timeout: Option<Duration>) -> Result<Arc<Proxy>> {
        self.wait_for_proxy(timeout, None).await
    }

    /// Like [`get`](Self::get), but gives up with [`Error::Cancelled`] when
    /// `cancel` fires.
    pub async fn get_cancellable(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Proxy>> {
        self.wait_for_proxy(timeout, Some(cancel)).await
    }

    /// Like [`get`](Self::get), but a timeout yields `Ok(None)`.
    pub async fn try_get_or_none(&self, timeout: Option<Duration>) -> Result<Option<Arc<Proxy>>> {
        match self.get(timeout).await {
            Ok(proxy) => Ok(Some(proxy)),
            Err(Error::Timeout(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Report that a request through `proxy` succeeded.
    pub async fn report_success(&self, proxy: &Arc<Proxy>, elapsed: Duration) {
        self.scheduler.on_proxy_used(proxy, true, Some(elapsed));
        self.counters.lock().record_use_time(elapsed);

        if self.config.remove_after_get {
            proxy.record_use(true, Some(elapsed), ValidationKind::Success);
            return;
        }

        let transition = self.transition_with(proxy, |record| {
            record.statistics.record_use(true, Some(elapsed), ValidationKind::Success);
            (record.state == ProxyState::InUse).then_some(ProxyState::Available)
        });
        if let Some(transition) = transition {
            self.publish(proxy, transition).await;
            let _ = self.dispatch(proxy).await;
        }
    }

    /// Report that a request through `proxy` failed.
    pub async fn report_failure(&self, proxy: &Arc<Proxy>, reason: ValidationKind) {
        self.scheduler.on_proxy_used(proxy, false, None);

        if self.config.remove_after_get {
            proxy.record_use(false, None, reason);
            return;
        }

        let max_failures = self.config.max_consecutive_failures;
        let transition = self.transition_with(proxy, |record| {
            record.statistics.record_use(false, None, reason);
            (record.state == ProxyState::InUse)
                .then(|| failure_state(record.statistics.consecutive_failures, max_failures))
        });
        if let Some(transition) = transition {
            if transition.to == ProxyState::Disabled {
                warn!("Proxy {} disabled after {} consecutive failures", proxy, max_failures);
            }
            self.publish(proxy, transition).await;
        }
    }

    /// Change the number of validation workers.
    ///
    /// On a stopped pool the count is recorded and applied by the next
    /// [`start`](Self::start).
    pub fn update_validation_concurrency(self: &Arc<Self>, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(Error::InvalidConcurrency(workers));
        }
        self.desired_workers.store(workers, Ordering::SeqCst);
        self.resize_workers();
        Ok(())
    }

    /// Desired number of validation workers.
    pub fn validation_concurrency(&self) -> usize {
        self.desired_workers.load(Ordering::SeqCst)
    }

    /// Number of validation workers currently running.
    pub fn active_workers(&self) -> usize {
        let workers = self.workers.lock();
        let active = workers.active.iter().filter(|worker| !worker.handle.is_finished());
        let retired = workers.retired.iter().filter(|handle| !handle.is_finished());
        active.count() + retired.count()
    }

    /// Copy of the aggregate counters.
    pub fn snapshot(&self) -> PoolSnapshot {
        self.counters.lock().snapshot()
    }

    /// Proxies currently in `state`.
    pub async fn proxies(&self, state: ProxyState) -> Vec<Arc<Proxy>> {
        self.storage.list_by_state(state).await
    }

    /// Run one acquisition pass and return how many proxies were added.
    pub async fn fetch_now(&self) -> usize {
        let mut added = 0;

        for source in &self.sources {
            let total = self.counters.lock().total();
            let remaining = self.config.max_pool_size.saturating_sub(total);
            if remaining == 0 {
                debug!("Proxy pool is full ({} proxies), skipping fetch", total);
                break;
            }
            let count = match self.config.fetch_batch_size {
                0 => remaining,
                batch => batch.min(remaining),
            };

            let endpoints = match source.fetch(count).await {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    warn!("Failed to fetch proxies from {}: {}", source.name(), e);
                    continue;
                }
            };

            for endpoint in endpoints {
                if self.counters.lock().total() >= self.config.max_pool_size {
                    break;
                }
                let proxy = Arc::new(Proxy::new(endpoint, self.config.max_requests_per_second));
                if !self.storage.add(Arc::clone(&proxy)).await {
                    continue;
                }

                let snapshot = {
                    let record = proxy.lock();
                    let mut counters = self.counters.lock();
                    counters.add(record.state);
                    counters.snapshot()
                };
                self.notify(|observer| observer.on_pool_changed(&snapshot));
                added += 1;

                if self.admits_validation() {
                    self.enqueue(proxy);
                }
            }
        }

        let snapshot = self.snapshot();
        info!(
            "Fetched {} new proxies, pool has {} ({} available)",
            added, snapshot.total_count, snapshot.available_count
        );
        if snapshot.total_count < self.config.min_pool_size {
            warn!(
                "Proxy pool below minimum size: {}/{}",
                snapshot.total_count, self.config.min_pool_size
            );
        }
        added
    }

    async fn restore_counts(&self) {
        let states: Vec<ProxyState> = self
            .storage
            .list()
            .await
            .iter()
            .map(|proxy| proxy.state())
            .collect();

        let mut counters = self.counters.lock();
        counters.reset_counts();
        for state in states {
            counters.add(state);
        }
    }

    fn admits_validation(&self) -> bool {
        match self.config.max_available_for_validation {
            Some(ceiling) => self.counters.lock().count(ProxyState::Available) < ceiling,
            None => true,
        }
    }

    fn enqueue(&self, proxy: Arc<Proxy>) {
        // The receiver lives as long as the pool, so this cannot fail.
        let _ = self.queue_tx.send(proxy);
    }

    /// Converge the running workers on the desired count and return it.
    fn resize_workers(self: &Arc<Self>) -> usize {
        let run = self.run.lock();
        let mut workers = self.workers.lock();
        // Read under the locks so the last resize applies the last stored count.
        let target = self.validation_concurrency();
        let Some(run) = run.as_ref() else {
            return target;
        };

        workers.retired.retain(|handle| !handle.is_finished());

        while workers.active.len() < target {
            let token = run.token.child_token();
            let handle = tokio::spawn(Arc::clone(self).run_worker(token.clone()));
            workers.active.push(Worker { token, handle });
        }
        while workers.active.len() > target {
            if let Some(worker) = workers.active.pop() {
                worker.token.cancel();
                workers.retired.push(worker.handle);
            }
        }
        debug!("Validation workers resized to {}", target);
        target
    }

    async fn run_worker(self: Arc<Self>, token: CancellationToken) {
        loop {
            let proxy = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                proxy = self.next_queued() => match proxy {
                    Some(proxy) => proxy,
                    None => break,
                },
            };
            self.validate(proxy).await;
        }
    }

    async fn next_queued(&self) -> Option<Arc<Proxy>> {
        self.queue_rx.lock().await.recv().await
    }

    async fn validate(&self, proxy: Arc<Proxy>) {
        let claimed = self.transition_from(&proxy, ProxyState::Pending, ProxyState::Validating);
        let Some(claimed) = claimed else {
            return;
        };
        self.publish(&proxy, claimed).await;

        if proxy.age() >= self.config.proxy_ttl {
            let expired = self.transition_from(&proxy, ProxyState::Validating, ProxyState::Expired);
            if let Some(expired) = expired {
                debug!("Proxy {} expired after {:?}", proxy, proxy.age());
                self.publish(&proxy, expired).await;
            }
            return;
        }

        let outcome = self.checker.check(&proxy).await;
        self.counters.lock().record_validation(&outcome);

        let max_failures = self.config.max_consecutive_failures;
        let transition = self.transition_with(&proxy, |record| {
            record.statistics.record_validation(&outcome);
            if record.state != ProxyState::Validating {
                return None;
            }
            Some(if outcome.is_success() {
                ProxyState::Available
            } else {
                failure_state(record.statistics.consecutive_failures, max_failures)
            })
        });
        self.notify(|observer| observer.on_validated(&proxy, &outcome));

        let Some(transition) = transition else {
            return;
        };
        if transition.to == ProxyState::Disabled {
            warn!(
                "Proxy {} disabled after {} consecutive failed validations ({})",
                proxy,
                max_failures,
                outcome.kind()
            );
        }
        let available = transition.to == ProxyState::Available;
        self.publish(&proxy, transition).await;
        if available {
            let _ = self.dispatch(&proxy).await;
        }
    }

    async fn maintain(self: Arc<Self>, task: Maintenance, token: CancellationToken) {
        let period = match task {
            Maintenance::Acquire => self.config.fetch_interval,
            Maintenance::Revalidate => self.config.validation_interval,
            Maintenance::Cooldown => self.config.cooldown_duration,
        }
        .max(MIN_LOOP_PERIOD);

        // `start` already fetched once, so acquisition waits a full period.
        let mut ticker = match task {
            Maintenance::Acquire => time::interval_at(time::Instant::now() + period, period),
            _ => time::interval(period),
        };
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let work = async {
                match task {
                    Maintenance::Acquire => {
                        self.fetch_now().await;
                    }
                    Maintenance::Revalidate => self.requeue_stale().await,
                    Maintenance::Cooldown => self.requeue_rested().await,
                }
            };
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = work => {}
            }
        }
        debug!("{:?} loop stopped", task);
    }

    /// Send available proxies whose last validation is too old back to the queue.
    async fn requeue_stale(&self) {
        let interval = self.config.validation_interval;
        let now = Instant::now();
        let mut requeued = 0;

        for proxy in self.storage.list_by_state(ProxyState::Available).await {
            let transition = self.transition_with(&proxy, |record| {
                let stale = record
                    .statistics
                    .last_validated_at
                    .map_or(true, |at| now.saturating_duration_since(at) >= interval);
                (record.state == ProxyState::Available && stale).then_some(ProxyState::Pending)
            });
            if let Some(transition) = transition {
                self.publish(&proxy, transition).await;
                self.enqueue(proxy);
                requeued += 1;
            }
        }
        if requeued > 0 {
            debug!("Re-validating {} proxies", requeued);
        }
    }

    /// Send proxies whose cooldown elapsed back to the queue.
    async fn requeue_rested(&self) {
        let cooldown = self.config.cooldown_duration;
        let now = Instant::now();

        for proxy in self.storage.list_by_state(ProxyState::Cooldown).await {
            let transition = self.transition_with(&proxy, |record| {
                let rested = record
                    .statistics
                    .last_failure_at
                    .is_some_and(|at| now.saturating_duration_since(at) >= cooldown);
                (record.state == ProxyState::Cooldown && rested).then_some(ProxyState::Pending)
            });
            if let Some(transition) = transition {
                self.publish(&proxy, transition).await;
                self.enqueue(proxy);
            }
        }
    }

    /// Claim a proxy picked by the scheduler.
    async fn take_available(&self) -> Option<Arc<Proxy>> {
        loop {
            let candidates = self.storage.list_by_state(ProxyState::Available).await;
            let proxy = self.scheduler.select(&candidates)?;
            if let Some(claimed) = self.claim(&proxy) {
                self.counters.lock().record_get_success();
                self.publish(&proxy, claimed).await;
                return Some(proxy);
            }
            // Another consumer won the race for this proxy.
        }
    }

    async fn wait_for_proxy(
        &self,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Arc<Proxy>> {
        self.counters.lock().record_get_request();
        if let Some(proxy) = self.take_available().await {
            return Ok(proxy);
        }

        let timeout = timeout.unwrap_or(self.config.default_get_timeout);
        if timeout.is_zero() {
            return Err(Error::Timeout(timeout));
        }

        let (tx, mut rx) = oneshot::channel();
        {
            let mut waiters = self.waiters.lock();
            if !self.is_running() {
                return Err(Error::Stopped);
            }
            waiters.retain(|waiter| !waiter.tx.is_closed());
            waiters.push_back(Waiter { tx });
        }
        let _waiting = WaitingGuard::new(&self.counters);

        // A proxy may have become available while the waiter was queued.
        self.dispatch_available().await;

        let cancel = cancel.cloned().unwrap_or_else(CancellationToken::new);
        let result = tokio::select! {
            received = &mut rx => received.map_err(|_| Error::Stopped),
            _ = time::sleep(timeout) => Err(Error::Timeout(timeout)),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        };

        match result {
            Ok(proxy) => Ok(proxy),
            Err(e) => {
                // A proxy sent concurrently with the timeout is still ours.
                rx.close();
                rx.try_recv().map_err(|_| e)
            }
        }
    }

    fn has_waiters(&self) -> bool {
        self.waiters.lock().iter().any(|waiter| !waiter.tx.is_closed())
    }

    /// Hand available proxies to queued consumers while both exist.
    async fn dispatch_available(&self) {
        while self.has_waiters() {
            let candidates = self.storage.list_by_state(ProxyState::Available).await;
            let Some(proxy) = self.scheduler.select(&candidates) else {
                return;
            };
            match self.dispatch(&proxy).await {
                // A pick claimed by another consumer after the listing is retried.
                Ok(()) | Err(Missed::Taken) => continue,
                Err(Missed::NoWaiter) => return,
            }
        }
    }

    /// Hand `proxy` to the oldest live waiter and publish the claim.
    async fn dispatch(&self, proxy: &Arc<Proxy>) -> std::result::Result<(), Missed> {
        let transition = self.hand_to_waiter(proxy)?;
        self.publish(proxy, transition).await;
        Ok(())
    }

    fn hand_to_waiter(&self, proxy: &Arc<Proxy>) -> std::result::Result<Transition, Missed> {
        let mut waiters = self.waiters.lock();
        while let Some(waiter) = waiters.pop_front() {
            if waiter.tx.is_closed() {
                continue;
            }
            let Some(claimed) = self.claim(proxy) else {
                waiters.push_front(waiter);
                return Err(Missed::Taken);
            };
            match waiter.tx.send(Arc::clone(proxy)) {
                Ok(()) => {
                    self.counters.lock().record_get_success();
                    return Ok(claimed);
                }
                // The consumer gave up between the check and the send.
                Err(_) => self.release(proxy, &claimed),
            }
        }
        Err(Missed::NoWaiter)
    }

    /// Atomically move an available proxy to the consumer.
    fn claim(&self, proxy: &Proxy) -> Option<Transition> {
        let mut record = proxy.lock();
        if record.state != ProxyState::Available {
            return None;
        }
        record.state = ProxyState::InUse;

        let detached = self.config.remove_after_get;
        let mut counters = self.counters.lock();
        if detached {
            counters.remove(ProxyState::Available);
        } else {
            counters.change(ProxyState::Available, ProxyState::InUse);
        }
        Some(Transition {
            from: ProxyState::Available,
            to: ProxyState::InUse,
            detached,
            snapshot: counters.snapshot(),
        })
    }

    /// Undo an unpublished claim.
    fn release(&self, proxy: &Proxy, claimed: &Transition) {
        let mut record = proxy.lock();
        record.state = ProxyState::Available;
        let mut counters = self.counters.lock();
        if claimed.detached {
            counters.add(ProxyState::Available);
        } else {
            counters.change(ProxyState::InUse, ProxyState::Available);
        }
    }

    fn transition_with<F>(&self, proxy: &Proxy, decide: F) -> Option<Transition>
    where
        F: FnOnce(&mut ProxyRecord) -> Option<ProxyState>,
    {
        let mut record = proxy.lock();
        let from = record.state;
        let to = decide(&mut record)?;
        if to == from {
            return None;
        }
        record.state = to;

        let mut counters = self.counters.lock();
        counters.change(from, to);
        Some(Transition {
            from,
            to,
            detached: false,
            snapshot: counters.snapshot(),
        })
    }

    fn transition_from(
        &self,
        proxy: &Proxy,
        expected: ProxyState,
        to: ProxyState,
    ) -> Option<Transition> {
        self.transition_with(proxy, |record| (record.state == expected).then_some(to))
    }

    async fn publish(&self, proxy: &Arc<Proxy>, transition: Transition) {
        if transition.to == ProxyState::Expired || transition.detached {
            self.storage.remove(proxy.id()).await;
        } else {
            self.storage.update(proxy).await;
        }

        debug!("Proxy {} {:?} -> {:?}", proxy, transition.from, transition.to);
        self.notify(|observer| observer.on_state_changed(proxy, transition.from, transition.to));
        self.notify(|observer| observer.on_pool_changed(&transition.snapshot));
    }

    fn notify<F>(&self, event: F)
    where
        F: FnOnce(&dyn PoolObserver),
    {
        let observer = self.observer.as_ref();
        if panic::catch_unwind(AssertUnwindSafe(|| event(observer))).is_err() {
            warn!("Pool observer panicked while handling an event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_state_threshold() {
        assert_eq!(failure_state(1, 3), ProxyState::Cooldown);
        assert_eq!(failure_state(2, 3), ProxyState::Cooldown);
        assert_eq!(failure_state(3, 3), ProxyState::Disabled);
        assert_eq!(failure_state(4, 3), ProxyState::Disabled);
    }

    #[test]
    fn test_waiting_guard_tracks_count() {
        let counters = Mutex::new(PoolCounters::new());
        {
            let _first = WaitingGuard::new(&counters);
            let _second = WaitingGuard::new(&counters);
            assert_eq!(counters.lock().snapshot().waiting_get_requests, 2);
        }
        assert_eq!(counters.lock().snapshot().waiting_get_requests, 0);
    }
}
