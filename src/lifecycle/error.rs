//! Fatal failures. Nothing else ever aborts a run.

use crate::framework::FrameworkError;
use crate::model::ConfigError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SystemError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot start {actor}: {source}")]
    Spawn {
        actor: String,
        #[source]
        source: FrameworkError,
    },

    #[error("core primitive unavailable: {0}")]
    Unavailable(#[from] FrameworkError),
}
