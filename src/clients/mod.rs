//! Outside-facing handles onto a running simulation.

pub mod control_client;
pub mod observer;

pub use control_client::*;
pub use observer::*;
