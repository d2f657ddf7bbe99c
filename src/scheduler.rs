//! Strategies for picking one proxy out of the available set.

use crate::config::SelectionStrategy;
use crate::proxy::Proxy;

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lowest weight a candidate can contribute to the roulette wheel.
const MIN_WEIGHT: f64 = 0.0001;

/// Picks a proxy from a list of candidates.
pub trait Scheduler: Send + Sync {
    /// Select one candidate, or `None` if the list is empty.
    fn select(&self, candidates: &[Arc<Proxy>]) -> Option<Arc<Proxy>>;

    /// Feedback after a consumer used a proxy.
    fn on_proxy_used(&self, _proxy: &Proxy, _success: bool, _elapsed: Option<Duration>) {}
}

/// Weighted random selection based on each proxy's statistics.
#[derive(Debug, Default)]
pub struct WeightedScheduler;

impl WeightedScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Roulette-wheel selection using the given random source.
    pub fn select_with<R: Rng>(
        &self,
        candidates: &[Arc<Proxy>],
        rng: &mut R,
    ) -> Option<Arc<Proxy>> {
        let last = candidates.last()?;
        let now = Instant::now();
        let weights: Vec<f64> = candidates
            .iter()
            .map(|proxy| proxy.weight(now).max(MIN_WEIGHT))
            .collect();
        let total: f64 = weights.iter().sum();
        let roll = rng.random::<f64>() * total;

        let mut cumulative = 0.0;
        for (proxy, weight) in candidates.iter().zip(&weights) {
            cumulative += weight;
            if roll <= cumulative {
                return Some(Arc::clone(proxy));
            }
        }

        // Floating point rounding can leave the roll just above the sum.
        Some(Arc::clone(last))
    }
}

impl Scheduler for WeightedScheduler {
    fn select(&self, candidates: &[Arc<Proxy>]) -> Option<Arc<Proxy>> {
        self.select_with(candidates, &mut rand::rng())
    }
}

/// Cycles through candidates in list order.
#[derive(Debug, Default)]
pub struct RoundRobinScheduler {
    next: AtomicUsize,
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for RoundRobinScheduler {
    fn select(&self, candidates: &[Arc<Proxy>]) -> Option<Arc<Proxy>> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(Arc::clone(&candidates[index]))
    }
}

/// Uniform random selection.
#[derive(Debug, Default)]
pub struct RandomScheduler;

impl RandomScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for RandomScheduler {
    fn select(&self, candidates: &[Arc<Proxy>]) -> Option<Arc<Proxy>> {
        if candidates.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..candidates.len());
        Some(Arc::clone(&candidates[index]))
    }
}

impl SelectionStrategy {
    /// Build the scheduler implementing this strategy.
    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        match self {
            SelectionStrategy::Weighted => Arc::new(WeightedScheduler::new()),
            SelectionStrategy::RoundRobin => Arc::new(RoundRobinScheduler::new()),
            SelectionStrategy::Random => Arc::new(RandomScheduler::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ProxyEndpoint, ProxyState, ProxyType};
    use crate::validation::{ValidationKind, ValidationOutcome};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn proxy(host: &str) -> Arc<Proxy> {
        Arc::new(Proxy::with_state(
            ProxyEndpoint::new(host, 8080, ProxyType::Http),
            5.0,
            ProxyState::Available,
        ))
    }

    fn proxy_with_latency(host: &str, ms: u64) -> Arc<Proxy> {
        let proxy = proxy(host);
        proxy.record_validation(&ValidationOutcome::success(Duration::from_millis(ms), 200));
        proxy.record_use(true, None, ValidationKind::Success);
        proxy
    }

    #[test]
    fn test_empty_candidates_return_none() {
        assert!(WeightedScheduler::new().select(&[]).is_none());
        assert!(RoundRobinScheduler::new().select(&[]).is_none());
        assert!(RandomScheduler::new().select(&[]).is_none());
    }

    #[test]
    fn test_round_robin_visits_each_in_order() {
        let candidates = vec![proxy("a"), proxy("b"), proxy("c")];
        let scheduler = RoundRobinScheduler::new();

        let picked: Vec<String> = (0..6)
            .map(|_| scheduler.select(&candidates).unwrap().id().to_string())
            .collect();
        assert_eq!(picked, vec!["a:8080", "b:8080", "c:8080", "a:8080", "b:8080", "c:8080"]);
    }

    #[test]
    fn test_single_candidate_always_selected() {
        let candidates = vec![proxy("only")];
        let weighted = WeightedScheduler::new();
        let random = RandomScheduler::new();
        for _ in 0..10 {
            assert_eq!(weighted.select(&candidates).unwrap().id(), "only:8080");
            assert_eq!(random.select(&candidates).unwrap().id(), "only:8080");
        }
    }

    #[test]
    fn test_weighted_prefers_faster_proxy() {
        let fast = proxy_with_latency("fast", 50);
        let slow = proxy_with_latency("slow", 500);
        let candidates = vec![fast, slow];
        let scheduler = WeightedScheduler::new();
        let mut rng = StdRng::seed_from_u64(42);

        let mut fast_hits = 0;
        let mut slow_hits = 0;
        for _ in 0..1000 {
            match scheduler.select_with(&candidates, &mut rng).unwrap().id() {
                "fast:8080" => fast_hits += 1,
                _ => slow_hits += 1,
            }
        }
        assert!(fast_hits > slow_hits, "fast={fast_hits} slow={slow_hits}");
    }

    #[test]
    fn test_random_covers_all_candidates() {
        let candidates = vec![proxy("a"), proxy("b"), proxy("c")];
        let scheduler = RandomScheduler::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(scheduler.select(&candidates).unwrap().id().to_string());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_strategy_builds_scheduler() {
        let candidates = vec![proxy("a"), proxy("b")];
        let scheduler = SelectionStrategy::RoundRobin.scheduler();
        assert_eq!(scheduler.select(&candidates).unwrap().id(), "a:8080");
        assert_eq!(scheduler.select(&candidates).unwrap().id(), "b:8080");
    }
}
