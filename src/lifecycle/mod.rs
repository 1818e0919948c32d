//! Orchestration: building the shared primitives, supervising actors and
//! driving the run from start to teardown.

pub mod bakery_system;
pub mod context;
pub mod error;
pub mod policy;
pub mod supervisor;
pub mod tracing;

pub use bakery_system::{BakerySystem, Phase, StopReason};
pub use context::{ContextParts, ShopContext};
pub use error::SystemError;
pub use supervisor::{ActorReport, ExitStatus, Supervisor};
