//! Plain data: configuration, catalog, messages, the shared record and the
//! records derived from it.

pub mod catalog;
pub mod config;
pub mod messages;
pub mod report;
pub mod snapshot;
pub mod state;

pub use catalog::*;
pub use config::*;
pub use messages::*;
pub use report::*;
pub use snapshot::*;
pub use state::*;
