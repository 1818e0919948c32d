//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter driven by
//! `RUST_LOG`.
//!
//! ## What Gets Traced
//!
//! - **Actor lifecycle**: every supervised task runs inside an `actor` span
//!   carrying its kind and name, so a customer's log lines read
//!   `actor:customer_42: ...`. Baker workers add a nested `worker` span.
//! - **Orchestrator**: shop opening and closing, load policy changes, control
//!   requests, unexpected deaths, forced terminations, teardown.
//! - **Resource exhaustion**: full conveyors, a full shop and receipt waits are
//!   `trace`/`debug` only. They are control flow, not failures.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Orchestrator events and per-actor summaries
//! RUST_LOG=info cargo run
//!
//! # Every batch, serve and customer exit
//! RUST_LOG=debug cargo run
//!
//! # Only the coordination primitives
//! RUST_LOG=bakery_sim::framework=trace cargo run
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // spans already name the actor
        .compact()
        .init();
}
