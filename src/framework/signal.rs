//! # Signals
//!
//! Mode changes are broadcast through cancellation tokens instead of flags
//! polled in loops. Every actor gets an [`ActorSignals`] at spawn time and
//! passes [`ActorSignals::interrupt`] to each blocking call, so termination and
//! evacuation both wake any task parked on a gate or channel.
//!
//! Inventory audits are not a stop condition; they bump a generation counter
//! on a `watch` channel that actors check between work units.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Orchestrator-side handle that raises signals.
#[derive(Debug)]
pub struct SignalBroadcaster {
    terminate: CancellationToken,
    evacuate: CancellationToken,
    interrupt: CancellationToken,
    audit: watch::Sender<u64>,
}

/// Actor-side view of the broadcast signals.
#[derive(Debug, Clone)]
pub struct ActorSignals {
    terminate: CancellationToken,
    evacuate: CancellationToken,
    interrupt: CancellationToken,
    audit: watch::Receiver<u64>,
}

impl SignalBroadcaster {
    pub fn new() -> Self {
        let (audit, _) = watch::channel(0);
        Self {
            terminate: CancellationToken::new(),
            evacuate: CancellationToken::new(),
            interrupt: CancellationToken::new(),
            audit,
        }
    }

    pub fn subscribe(&self) -> ActorSignals {
        ActorSignals {
            terminate: self.terminate.clone(),
            evacuate: self.evacuate.clone(),
            interrupt: self.interrupt.clone(),
            audit: self.audit.subscribe(),
        }
    }

    /// Graceful termination. Wakes every interruptible wait.
    pub fn terminate(&self) {
        if !self.terminate.is_cancelled() {
            info!("broadcasting termination");
        }
        self.terminate.cancel();
        self.interrupt.cancel();
    }

    pub fn evacuate(&self) {
        if !self.evacuate.is_cancelled() {
            info!("broadcasting evacuation");
        }
        self.evacuate.cancel();
        self.interrupt.cancel();
    }

    /// Starts a new audit generation and returns its number.
    pub fn audit(&self) -> u64 {
        let mut generation = 0;
        self.audit.send_modify(|g| {
            *g += 1;
            generation = *g;
        });
        info!(generation, "broadcasting inventory audit");
        generation
    }

    pub fn is_evacuating(&self) -> bool {
        self.evacuate.is_cancelled()
    }
}

impl Default for SignalBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorSignals {
    pub fn is_terminating(&self) -> bool {
        self.terminate.is_cancelled()
    }

    pub fn is_evacuating(&self) -> bool {
        self.evacuate.is_cancelled()
    }

    /// True once either stop signal has been raised.
    pub fn should_stop(&self) -> bool {
        self.interrupt.is_cancelled()
    }

    /// Token cancelled by termination or evacuation.
    pub fn interrupt(&self) -> &CancellationToken {
        &self.interrupt
    }

    /// Token cancelled by evacuation only.
    pub fn evacuation(&self) -> &CancellationToken {
        &self.evacuate
    }

    /// Returns the new audit generation if one was raised since the last call.
    pub fn take_audit(&mut self) -> Option<u64> {
        match self.audit.has_changed() {
            Ok(true) => Some(*self.audit.borrow_and_update()),
            _ => None,
        }
    }
}
