//! Scoped bookkeeping for a customer's stay.
//!
//! [`Visit`] owns the entry permit and the occupancy increment; [`QueueSpot`]
//! owns a register queue-length increment until the checkout request is handed
//! to the channel. Both undo themselves on drop, so a customer that returns
//! early, panics or is aborted leaves the counters as it found them.

use crate::framework::{FrameworkError, GatePermit, StateGuard};
use crate::model::{RegisterId, SharedState};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

const OUTSIDE: u8 = 0;
const INSIDE: u8 = 1;
const LEFT: u8 = 2;

/// Shared marker of where a customer is. The supervisor keeps a clone so it
/// can settle the occupancy of a customer whose task died inside the shop.
#[derive(Debug, Clone, Default)]
pub struct VisitTicket(Arc<AtomicU8>);

impl VisitTicket {
    pub fn is_inside(&self) -> bool {
        self.0.load(Ordering::Acquire) == INSIDE
    }

    pub fn has_left(&self) -> bool {
        self.0.load(Ordering::Acquire) == LEFT
    }

    /// Moves the ticket from inside to left. Only the first caller wins.
    pub fn settle(&self) -> bool {
        self.0
            .compare_exchange(INSIDE, LEFT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn enter(&self) {
        let _ = self
            .0
            .compare_exchange(OUTSIDE, INSIDE, Ordering::AcqRel, Ordering::Acquire);
    }
}

#[must_use = "dropping the visit ends it"]
pub struct Visit {
    state: StateGuard<SharedState>,
    ticket: VisitTicket,
    _permit: GatePermit,
}

impl Visit {
    /// Counts the customer in. On failure the permit is released right away.
    pub fn begin(
        permit: GatePermit,
        state: StateGuard<SharedState>,
        ticket: VisitTicket,
    ) -> Result<Self, FrameworkError> {
        state.with_lock(|s| {
            s.occupancy += 1;
            s.admitted += 1;
        })?;
        ticket.enter();
        Ok(Self {
            state,
            ticket,
            _permit: permit,
        })
    }
}

impl Drop for Visit {
    fn drop(&mut self) {
        if self.ticket.settle() {
            if let Err(e) = self
                .state
                .with_lock(|s| s.occupancy = s.occupancy.saturating_sub(1))
            {
                debug!(error = %e, "occupancy release dropped");
            }
        }
        // the entry permit is released after this, when the fields drop
    }
}

/// A register queue-length increment not yet backed by a queued request.
pub struct QueueSpot {
    state: StateGuard<SharedState>,
    register: RegisterId,
    armed: bool,
}

impl QueueSpot {
    pub fn new(state: StateGuard<SharedState>, register: RegisterId) -> Self {
        Self {
            state,
            register,
            armed: true,
        }
    }

    /// The request is queued; from now on the cashier or a withdrawal
    /// accounts for the spot.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for QueueSpot {
    fn drop(&mut self) {
        if self.armed {
            let register = self.register;
            if let Err(e) = self.state.with_lock(|s| {
                if let Some(r) = s.register_mut(register) {
                    r.queue_len = r.queue_len.saturating_sub(1);
                }
            }) {
                debug!(error = %e, %register, "queue spot release dropped");
            }
        }
    }
}
