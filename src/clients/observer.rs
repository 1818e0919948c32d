use crate::framework::{CapacityGate, FrameworkError};
use crate::model::{SharedState, Snapshot};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Read-only diagnostic view of a running simulation. Never takes the shared
/// state lock; it reads the last published copy instead.
#[derive(Clone)]
pub struct SnapshotObserver {
    published: watch::Receiver<Option<SharedState>>,
    entry: CapacityGate,
    active_customers: Arc<AtomicUsize>,
}

impl SnapshotObserver {
    pub fn new(
        published: watch::Receiver<Option<SharedState>>,
        entry: CapacityGate,
        active_customers: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            published,
            entry,
            active_customers,
        }
    }

    /// `Gone` once the simulation has been torn down.
    pub fn snapshot(&self) -> Result<Snapshot, FrameworkError> {
        let published = self.published.borrow();
        let state = published
            .as_ref()
            .ok_or(FrameworkError::Gone("shared state"))?;
        Ok(Snapshot::capture(
            state,
            self.entry.peek(),
            Some(self.active_customers.load(Ordering::Relaxed)),
        ))
    }
}
