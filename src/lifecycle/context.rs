use crate::baker_actor::Conveyor;
use crate::framework::{ActorSignals, BoundedChannel, CapacityGate, SignalBroadcaster, StateGuard};
use crate::model::{
    BatchReport, Catalog, CheckoutRequest, CustomerId, Receipt, RegisterId, SharedState,
    SimulationConfig,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Handles to the shared primitives, injected into every actor at spawn time.
#[derive(Clone)]
pub struct ShopContext {
    pub config: Arc<SimulationConfig>,
    pub catalog: Arc<Catalog>,
    pub state: StateGuard<SharedState>,
    /// Shop floor capacity.
    pub entry: CapacityGate,
    pub conveyor: Conveyor,
    pub checkout: BoundedChannel<RegisterId, CheckoutRequest>,
    pub receipts: BoundedChannel<CustomerId, Receipt>,
    pub signals: ActorSignals,
    pub batches: mpsc::Sender<BatchReport>,
}

/// The orchestrator-side halves that belong with a [`ShopContext`].
pub struct ContextParts {
    pub signals: SignalBroadcaster,
    pub batches: mpsc::Receiver<BatchReport>,
}

impl ShopContext {
    /// Creates the shared record, gates and channels.
    pub fn build(config: SimulationConfig) -> (Self, ContextParts) {
        let config = Arc::new(config);
        let catalog = Arc::new(Catalog::with_size(config.product_count));
        let state = StateGuard::new("shared state", SharedState::new(&config, Arc::clone(&catalog)));
        let broadcaster = SignalBroadcaster::new();
        let (batch_tx, batch_rx) = mpsc::channel(64);

        let ctx = Self {
            entry: CapacityGate::new("entry", config.max_occupancy),
            conveyor: Conveyor::new(&catalog, config.queue_byte_budget),
            checkout: BoundedChannel::with_byte_budget("checkout", config.queue_byte_budget),
            receipts: BoundedChannel::with_byte_budget("receipts", config.queue_byte_budget),
            signals: broadcaster.subscribe(),
            batches: batch_tx,
            config,
            catalog,
            state,
        };
        let parts = ContextParts {
            signals: broadcaster,
            batches: batch_rx,
        };
        (ctx, parts)
    }

    /// Books a change in the shared record. A record already torn down only
    /// gets a debug line; callers on that path are unwinding anyway.
    pub fn update(&self, what: &'static str, f: impl FnOnce(&mut SharedState)) {
        if let Err(e) = self.state.with_lock(f) {
            debug!(error = %e, what, "state update dropped");
        }
    }
}
