//! # Capacity Gate
//!
//! A counting semaphore with a fixed upper bound. Every successful acquire hands
//! back a [`GatePermit`]; dropping the permit returns the unit. Because the unit
//! travels with a value instead of relying on the holder to call `release`, a
//! task that is aborted or panics while holding a permit still gives the unit
//! back when its future is dropped.

use crate::framework::FrameworkError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Cloneable handle to a bounded counting semaphore.
#[derive(Clone)]
pub struct CapacityGate {
    name: Arc<str>,
    bound: usize,
    semaphore: Arc<Semaphore>,
}

/// One unit taken from a [`CapacityGate`]. Returned to the gate on drop.
#[must_use = "dropping the permit releases the unit immediately"]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl CapacityGate {
    pub fn new(name: impl Into<Arc<str>>, bound: usize) -> Self {
        Self {
            name: name.into(),
            bound,
            semaphore: Arc::new(Semaphore::new(bound)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Current number of free units, or `None` once the gate is gone.
    pub fn peek(&self) -> Option<usize> {
        if self.semaphore.is_closed() {
            None
        } else {
            Some(self.semaphore.available_permits())
        }
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Waits until a unit is free. Returns `Gone` if the gate is closed while waiting.
    pub async fn acquire(&self) -> Result<GatePermit, FrameworkError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map(|permit| GatePermit { _permit: permit })
            .map_err(|_| FrameworkError::Gone("capacity gate"))
    }

    /// Non-blocking acquire. `WouldBlock` when no unit is free.
    pub fn try_acquire(&self) -> Result<GatePermit, FrameworkError> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(GatePermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) => {
                trace!(gate = %self.name, "gate exhausted");
                Err(FrameworkError::WouldBlock)
            }
            Err(TryAcquireError::Closed) => Err(FrameworkError::Gone("capacity gate")),
        }
    }

    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<GatePermit, FrameworkError> {
        tokio::time::timeout(timeout, self.acquire())
            .await
            .map_err(|_| FrameworkError::TimedOut)?
    }

    /// Like [`acquire`](Self::acquire) but gives up with `Interrupted` as soon as
    /// `cancel` fires. A cancelled wait never consumes a unit.
    pub async fn acquire_interruptible(
        &self,
        cancel: &CancellationToken,
    ) -> Result<GatePermit, FrameworkError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FrameworkError::Interrupted),
            acquired = self.acquire() => acquired,
        }
    }

    /// Tears the gate down. Pending and future acquires return `Gone`.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

impl fmt::Debug for CapacityGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapacityGate")
            .field("name", &self.name)
            .field("bound", &self.bound)
            .field("free", &self.peek())
            .finish()
    }
}

impl GatePermit {
    /// Explicit release. Equivalent to dropping the permit.
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for GatePermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GatePermit")
    }
}
