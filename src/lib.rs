//! # Bakery Simulation
//!
//! > **Concurrent actors coordinating through gates, a guarded record and bounded channels.**
//!
//! A bakery with a shop floor is simulated as a set of independently scheduled
//! Tokio tasks: a baker filling per-product conveyors, two cashiers working
//! checkout registers, and a steady stream of short-lived customers. An
//! orchestrator advances a logical clock, opens and closes the shop, staffs
//! the second register by load and shuts everything down in two phases.
//!
//! No actor ever calls another. They only meet at the shared primitives:
//!
//! - a [`CapacityGate`](framework::CapacityGate) at the entry and per conveyor,
//! - the [`StateGuard`](framework::StateGuard) around the single shared record,
//! - [`BoundedChannel`](framework::BoundedChannel)s for conveyor items,
//!   checkout requests and receipts.
//!
//! ## Crash safety
//!
//! Every acquisition is a value. Gate permits, a customer's
//! [`Visit`](customer_actor::Visit) and its queue spot all undo themselves on
//! drop, so an actor that returns early, panics or is aborted by the
//! supervisor never leaks capacity. The guard's critical sections are plain
//! closures; nothing can suspend while holding the lock.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Primitives ([`framework`])
//! Gates, guard, channels, signals, the slot table and the [`Actor`](framework::Actor) seam.
//!
//! ### 2. The Data ([`model`])
//! Configuration, catalog, messages, the shared record, snapshot and report.
//!
//! ### 3. The Actors ([`baker_actor`], [`cashier_actor`], [`customer_actor`])
//! One module per role.
//!
//! ### 4. The Orchestrator ([`lifecycle`])
//! [`BakerySystem`](lifecycle::BakerySystem), the supervisor and the policies.
//!
//! ### 5. The Interface ([`clients`])
//! [`ControlClient`](clients::ControlClient) for audits and evacuation,
//! [`SnapshotObserver`](clients::SnapshotObserver) for diagnostics.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Default configuration
//! RUST_LOG=info cargo run
//!
//! # Overrides from a JSON file
//! RUST_LOG=info cargo run -- bakery.json
//! ```

pub mod baker_actor;
pub mod cashier_actor;
pub mod clients;
pub mod customer_actor;
pub mod framework;
pub mod lifecycle;
pub mod model;
