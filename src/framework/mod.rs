//! Coordination primitives shared by every actor.
//!
//! # Main Components
//!
//! - [`CapacityGate`] - bounded counting semaphore with RAII permits
//! - [`StateGuard`] - crash-safe lock over the single shared record
//! - [`BoundedChannel`] - slot-accounted, per-key FIFO message channel
//! - [`SignalBroadcaster`] / [`ActorSignals`] - termination, evacuation and audit broadcast
//! - [`SlotTable`] - arena of live actors indexed by stable handles
//! - [`Actor`] - the spawn seam used by the supervisor
//! - [`FrameworkError`] - expected outcomes of the above

pub mod actor;
pub mod channel;
pub mod error;
pub mod gate;
pub mod guard;
pub mod signal;
pub mod table;

pub use actor::{Actor, ActorKind};
pub use channel::{derive_capacity, BoundedChannel, RecvKey};
pub use error::FrameworkError;
pub use gate::{CapacityGate, GatePermit};
pub use guard::StateGuard;
pub use signal::{ActorSignals, SignalBroadcaster};
pub use table::{Handle, SlotTable};
