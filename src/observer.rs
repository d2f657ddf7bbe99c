//! Hooks for watching the pool.

use crate::proxy::{Proxy, ProxyState};
use crate::state::PoolSnapshot;
use crate::validation::ValidationOutcome;

/// Receives pool events. Every method defaults to a no-op.
///
/// Callbacks run on pool tasks and should return quickly. A panicking
/// observer is logged and otherwise ignored.
pub trait PoolObserver: Send + Sync {
    /// A probe finished.
    fn on_validated(&self, _proxy: &Proxy, _outcome: &ValidationOutcome) {}

    /// A proxy moved between lifecycle states.
    fn on_state_changed(&self, _proxy: &Proxy, _from: ProxyState, _to: ProxyState) {}

    /// The aggregate counters changed.
    fn on_pool_changed(&self, _snapshot: &PoolSnapshot) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PoolObserver for NoopObserver {}
