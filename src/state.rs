//! Aggregate pool statistics.

use crate::proxy::{Proxy, ProxyState};
use crate::validation::ValidationOutcome;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Immutable view of the pool at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSnapshot {
    pub timestamp: SystemTime,

    pub total_count: usize,
    pub pending_count: usize,
    pub validating_count: usize,
    pub available_count: usize,
    pub in_use_count: usize,
    pub cooldown_count: usize,
    pub disabled_count: usize,

    pub total_validations: u64,
    pub successful_validations: u64,
    pub failed_validations: u64,

    pub total_get_requests: u64,
    pub successful_get_requests: u64,
    pub waiting_get_requests: u64,

    /// Mean probe duration in milliseconds.
    pub avg_validation_ms: f64,
    /// Mean response time in milliseconds, over probes and reported uses.
    pub avg_response_ms: f64,
    pub overall_success_rate: f64,
}

impl PoolSnapshot {
    /// Number of proxies in `state`. Always 0 for `Expired`.
    pub fn count(&self, state: ProxyState) -> usize {
        match state {
            ProxyState::Pending => self.pending_count,
            ProxyState::Validating => self.validating_count,
            ProxyState::Available => self.available_count,
            ProxyState::InUse => self.in_use_count,
            ProxyState::Cooldown => self.cooldown_count,
            ProxyState::Disabled => self.disabled_count,
            ProxyState::Expired => 0,
        }
    }

    /// Sum of the per-state counts.
    pub fn state_sum(&self) -> usize {
        ProxyState::LIVE.iter().map(|state| self.count(*state)).sum()
    }

    /// Recompute a snapshot by scanning proxy records.
    ///
    /// Get-request totals come from per-proxy use counters; nobody is waiting
    /// from the point of view of a registry.
    pub fn scan(proxies: &[Arc<Proxy>]) -> Self {
        let mut counters = PoolCounters::new();
        let mut weighted_ms = 0.0;
        let mut response_ms_sum = 0.0;
        let mut uses = 0;
        let mut use_successes = 0;

        for proxy in proxies {
            let record = proxy.lock();
            if record.state == ProxyState::Expired {
                continue;
            }
            counters.add(record.state);

            let stats = &record.statistics;
            counters.total_validations += stats.total_validations;
            counters.successful_validations += stats.validation_successes;
            counters.failed_validations += stats.validation_failures;
            weighted_ms += stats.avg_response_ms * stats.total_validations as f64;
            response_ms_sum += stats.avg_response_ms;
            uses += stats.total_uses;
            use_successes += stats.use_successes;
        }

        let mut snapshot = counters.snapshot();
        snapshot.avg_validation_ms = if snapshot.total_validations > 0 {
            weighted_ms / snapshot.total_validations as f64
        } else {
            0.0
        };
        snapshot.avg_response_ms = if snapshot.total_count > 0 {
            response_ms_sum / snapshot.total_count as f64
        } else {
            0.0
        };
        snapshot.total_get_requests = uses;
        snapshot.successful_get_requests = use_successes;
        snapshot
    }
}

/// Running aggregate maintained by the pool.
///
/// Per-state counts only move through [`add`](Self::add),
/// [`remove`](Self::remove) and [`change`](Self::change), so the sum of the
/// per-state counts always equals `total`. The pool keeps this behind a single
/// mutex.
#[derive(Debug, Clone)]
pub struct PoolCounters {
    by_state: [usize; ProxyState::ALL.len()],
    total: usize,

    total_validations: u64,
    successful_validations: u64,
    failed_validations: u64,
    validation_ms_sum: f64,

    response_samples: u64,
    response_ms_sum: f64,

    total_get_requests: u64,
    successful_get_requests: u64,
    waiting_get_requests: u64,

    timestamp: SystemTime,
}

impl Default for PoolCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolCounters {
    pub fn new() -> Self {
        Self {
            by_state: [0; ProxyState::ALL.len()],
            total: 0,
            total_validations: 0,
            successful_validations: 0,
            failed_validations: 0,
            validation_ms_sum: 0.0,
            response_samples: 0,
            response_ms_sum: 0.0,
            total_get_requests: 0,
            successful_get_requests: 0,
            waiting_get_requests: 0,
            timestamp: SystemTime::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn count(&self, state: ProxyState) -> usize {
        self.by_state[state.index()]
    }

    /// A proxy entered the pool in `state`. Expired proxies are not counted.
    pub fn add(&mut self, state: ProxyState) {
        if state == ProxyState::Expired {
            return;
        }
        self.by_state[state.index()] += 1;
        self.total += 1;
        self.touch();
    }

    /// A proxy in `state` left the pool.
    pub fn remove(&mut self, state: ProxyState) {
        if state == ProxyState::Expired {
            return;
        }
        let slot = &mut self.by_state[state.index()];
        if *slot == 0 {
            return;
        }
        *slot -= 1;
        self.total -= 1;
        self.touch();
    }

    /// A proxy moved from `from` to `to`. Moving to `Expired` removes it.
    pub fn change(&mut self, from: ProxyState, to: ProxyState) {
        if from == to {
            return;
        }
        if to == ProxyState::Expired {
            self.remove(from);
            return;
        }
        if from == ProxyState::Expired {
            self.add(to);
            return;
        }
        let slot = &mut self.by_state[from.index()];
        if *slot == 0 {
            // Unknown origin: count it as a new arrival.
            self.add(to);
            return;
        }
        *slot -= 1;
        self.by_state[to.index()] += 1;
        self.touch();
    }

    /// Drop all per-state counts, keeping the request and validation totals.
    pub fn reset_counts(&mut self) {
        self.by_state = [0; ProxyState::ALL.len()];
        self.total = 0;
        self.touch();
    }

    pub fn record_validation(&mut self, outcome: &ValidationOutcome) {
        self.total_validations += 1;
        if outcome.is_success() {
            self.successful_validations += 1;
        } else {
            self.failed_validations += 1;
        }
        let ms = duration_ms(outcome.elapsed());
        self.validation_ms_sum += ms;
        self.record_response(ms);
    }

    /// Record the elapsed time a consumer reported for a use.
    pub fn record_use_time(&mut self, elapsed: Duration) {
        self.record_response(duration_ms(elapsed));
    }

    pub fn record_get_request(&mut self) {
        self.total_get_requests += 1;
        self.touch();
    }

    pub fn record_get_success(&mut self) {
        self.successful_get_requests += 1;
        self.touch();
    }

    pub fn increment_waiting(&mut self) {
        self.waiting_get_requests += 1;
        self.touch();
    }

    pub fn decrement_waiting(&mut self) {
        self.waiting_get_requests = self.waiting_get_requests.saturating_sub(1);
        self.touch();
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let avg = |sum: f64, n: u64| if n > 0 { sum / n as f64 } else { 0.0 };
        PoolSnapshot {
            timestamp: self.timestamp,
            total_count: self.total,
            pending_count: self.count(ProxyState::Pending),
            validating_count: self.count(ProxyState::Validating),
            available_count: self.count(ProxyState::Available),
            in_use_count: self.count(ProxyState::InUse),
            cooldown_count: self.count(ProxyState::Cooldown),
            disabled_count: self.count(ProxyState::Disabled),
            total_validations: self.total_validations,
            successful_validations: self.successful_validations,
            failed_validations: self.failed_validations,
            total_get_requests: self.total_get_requests,
            successful_get_requests: self.successful_get_requests,
            waiting_get_requests: self.waiting_get_requests,
            avg_validation_ms: avg(self.validation_ms_sum, self.total_validations),
            avg_response_ms: avg(self.response_ms_sum, self.response_samples),
            overall_success_rate: if self.total_validations > 0 {
                self.successful_validations as f64 / self.total_validations as f64
            } else {
                0.0
            },
        }
    }

    fn record_response(&mut self, ms: f64) {
        self.response_samples += 1;
        self.response_ms_sum += ms;
        self.touch();
    }

    fn touch(&mut self) {
        self.timestamp = SystemTime::now();
    }
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
