//! Per-proxy reliability and latency statistics.

use crate::validation::{ValidationKind, ValidationOutcome};
use std::time::{Duration, Instant};

/// Counters and timings collected for a single proxy.
///
/// Response times are kept in milliseconds. The running average covers every
/// validation plus every use that reported an elapsed time.
#[derive(Debug, Clone, Default)]
pub struct ProxyStatistics {
    pub total_validations: u64,
    pub validation_successes: u64,
    pub validation_failures: u64,
    pub validation_timeouts: u64,

    pub total_uses: u64,
    pub use_successes: u64,
    pub use_failures: u64,
    pub use_timeouts: u64,

    pub min_response_ms: f64,
    pub max_response_ms: f64,
    pub avg_response_ms: f64,
    pub last_response_ms: f64,

    pub consecutive_successes: u32,
    pub consecutive_failures: u32,

    pub first_validated_at: Option<Instant>,
    pub last_validated_at: Option<Instant>,
    pub last_used_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
    pub last_failure_at: Option<Instant>,

    timed_samples: u64,
}

impl ProxyStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of validations that succeeded, 0 when never validated.
    pub fn validation_success_rate(&self) -> f64 {
        if self.total_validations == 0 {
            return 0.0;
        }
        self.validation_successes as f64 / self.total_validations as f64
    }

    /// Fraction of consumer uses that succeeded, 0 when never used.
    pub fn use_success_rate(&self) -> f64 {
        if self.total_uses == 0 {
            return 0.0;
        }
        self.use_successes as f64 / self.total_uses as f64
    }

    /// Record the outcome of a health-check probe.
    pub fn record_validation(&mut self, outcome: &ValidationOutcome) {
        let at = outcome.validated_at();
        self.total_validations += 1;
        self.last_validated_at = Some(at);
        self.first_validated_at.get_or_insert(at);

        if outcome.is_success() {
            self.validation_successes += 1;
            self.mark_success(at);
        } else {
            self.validation_failures += 1;
            self.mark_failure(at);
            if outcome.kind() == ValidationKind::Timeout {
                self.validation_timeouts += 1;
            }
        }

        self.record_response_time(outcome.elapsed());
    }

    /// Record a consumer's use of the proxy.
    pub fn record_use(&mut self, success: bool, elapsed: Option<Duration>, kind: ValidationKind) {
        let now = Instant::now();
        self.total_uses += 1;
        self.last_used_at = Some(now);

        if success {
            self.use_successes += 1;
            self.mark_success(now);
        } else {
            self.use_failures += 1;
            self.mark_failure(now);
            if kind == ValidationKind::Timeout {
                self.use_timeouts += 1;
            }
        }

        if let Some(elapsed) = elapsed {
            self.record_response_time(elapsed);
        }
    }

    /// Selection weight at `now`. Always strictly positive.
    ///
    /// A proxy that has never been used gets full freshness, so brand-new
    /// proxies are favoured over long-idle ones.
    pub fn weight(&self, now: Instant) -> f64 {
        let success_rate = self.validation_success_rate().clamp(0.01, 1.0);
        let response_ms = self.avg_response_ms.max(1.0);
        let freshness = match self.last_used_at {
            None => 1.0,
            Some(used) => {
                let minutes = now.saturating_duration_since(used).as_secs_f64() / 60.0;
                1.0 / (1.0 + minutes.min(60.0))
            }
        };
        success_rate * (1.0 / response_ms) * (0.5 + freshness)
    }

    fn mark_success(&mut self, at: Instant) {
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        self.last_success_at = Some(at);
    }

    fn mark_failure(&mut self, at: Instant) {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.last_failure_at = Some(at);
    }

    fn record_response_time(&mut self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.last_response_ms = ms;
        self.timed_samples += 1;

        if self.timed_samples == 1 {
            self.min_response_ms = ms;
            self.max_response_ms = ms;
            self.avg_response_ms = ms;
            return;
        }

        self.min_response_ms = self.min_response_ms.min(ms);
        self.max_response_ms = self.max_response_ms.max(ms);
        let n = self.timed_samples as f64;
        self.avg_response_ms = (self.avg_response_ms * (n - 1.0) + ms) / n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(ms: u64) -> ValidationOutcome {
        ValidationOutcome::success(Duration::from_millis(ms), 200)
    }

    #[test]
    fn test_record_validation_updates_counters() {
        let mut stats = ProxyStatistics::new();
        stats.record_validation(&ok(100));
        stats.record_validation(&ValidationOutcome::timeout(Duration::from_millis(300)));

        assert_eq!(stats.total_validations, 2);
        assert_eq!(stats.validation_successes, 1);
        assert_eq!(stats.validation_failures, 1);
        assert_eq!(stats.validation_timeouts, 1);
        assert_eq!(stats.consecutive_failures, 1);
        assert_eq!(stats.consecutive_successes, 0);
        assert!(stats.first_validated_at.is_some());
        assert!(stats.last_failure_at.is_some());
        assert_eq!(stats.validation_success_rate(), 0.5);
    }

    #[test]
    fn test_response_time_running_average() {
        let mut stats = ProxyStatistics::new();
        stats.record_validation(&ok(100));
        stats.record_validation(&ok(300));
        stats.record_use(true, Some(Duration::from_millis(200)), ValidationKind::Success);

        assert!((stats.avg_response_ms - 200.0).abs() < 1e-6);
        assert!((stats.min_response_ms - 100.0).abs() < 1e-6);
        assert!((stats.max_response_ms - 300.0).abs() < 1e-6);
        assert!((stats.last_response_ms - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_consecutive_counters_reset_each_other() {
        let mut stats = ProxyStatistics::new();
        stats.record_use(false, None, ValidationKind::Timeout);
        stats.record_use(false, None, ValidationKind::Exception);
        assert_eq!(stats.consecutive_failures, 2);
        assert_eq!(stats.use_timeouts, 1);

        stats.record_use(true, None, ValidationKind::Success);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.consecutive_successes, 1);
        assert_eq!(stats.total_uses, 3);
        assert!((stats.use_success_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_use_without_elapsed_keeps_average() {
        let mut stats = ProxyStatistics::new();
        stats.record_validation(&ok(80));
        stats.record_use(true, None, ValidationKind::Success);
        assert!((stats.avg_response_ms - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_weight_positive_when_never_validated() {
        let stats = ProxyStatistics::new();
        let weight = stats.weight(Instant::now());
        assert!(weight > 0.0);
        // 0.01 success floor, 1ms floor, full freshness
        assert!((weight - 0.01 * 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_weight_positive_after_failures() {
        let mut stats = ProxyStatistics::new();
        for _ in 0..10 {
            stats.record_validation(&ValidationOutcome::timeout(Duration::from_secs(10)));
            stats.record_use(false, Some(Duration::from_secs(30)), ValidationKind::Timeout);
        }
        assert!(stats.weight(Instant::now() + Duration::from_secs(7200)) > 0.0);
    }

    #[test]
    fn test_weight_prefers_faster_proxy() {
        let mut fast = ProxyStatistics::new();
        fast.record_validation(&ok(50));
        let mut slow = ProxyStatistics::new();
        slow.record_validation(&ok(500));

        let now = Instant::now();
        assert!(fast.weight(now) > slow.weight(now));
    }

    #[test]
    fn test_weight_decays_with_idle_time() {
        let mut stats = ProxyStatistics::new();
        stats.record_validation(&ok(100));
        stats.record_use(true, None, ValidationKind::Success);

        let used = stats.last_used_at.unwrap();
        let fresh = stats.weight(used);
        let idle = stats.weight(used + Duration::from_secs(30 * 60));
        let capped = stats.weight(used + Duration::from_secs(600 * 60));
        assert!(fresh > idle);
        assert!(idle > capped);
        // freshness bottoms out at 1/61
        let expected = 1.0 / 100.0 * (0.5 + 1.0 / 61.0);
        assert!((capped - expected).abs() < 1e-9);
    }
}
