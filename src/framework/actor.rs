//! # Actor Seam
//!
//! Everything the supervisor spawns implements [`Actor`]. Dependencies arrive
//! through `run(ctx)` rather than the constructor, so the orchestrator can
//! build actors cheaply and wire them to the shared primitives at spawn time.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Role of a supervised actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActorKind {
    Baker,
    Cashier,
    Customer,
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ActorKind::Baker => "baker",
            ActorKind::Cashier => "cashier",
            ActorKind::Customer => "customer",
        };
        f.write_str(kind)
    }
}

#[async_trait]
pub trait Actor: Send + Sized + 'static {
    /// Handles injected at spawn time.
    type Context: Send + 'static;
    /// What the actor hands back when its task completes normally.
    type Output: Send + 'static;

    fn name(&self) -> String;

    fn kind(&self) -> ActorKind;

    async fn run(self, ctx: Self::Context) -> Self::Output;
}
