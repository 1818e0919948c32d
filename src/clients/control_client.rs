//! # Control Client
//!
//! Out-of-band command surface for a running simulation. Requests travel over
//! an mpsc channel to the orchestrator, which drains them once per tick and
//! acknowledges each one on a oneshot channel after broadcasting it.

use crate::framework::FrameworkError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

/// Type alias for the one-shot acknowledgement channel.
pub type Response<T> = oneshot::Sender<Result<T, FrameworkError>>;

#[derive(Debug)]
pub enum ControlRequest {
    InventoryAudit { respond_to: Response<()> },
    Evacuation { respond_to: Response<()> },
}

impl ControlRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ControlRequest::InventoryAudit { .. } => "inventory_audit",
            ControlRequest::Evacuation { .. } => "evacuation",
        }
    }
}

/// Generates a `request_<name>` method that sends the matching
/// [`ControlRequest`] variant and waits for its acknowledgement.
macro_rules! control_method {
    ($(#[$meta:meta])* $name:ident => $variant:ident) => {
        paste::paste! {
            $(#[$meta])*
            #[instrument(skip(self))]
            pub async fn [<request_ $name>](&self) -> Result<(), FrameworkError> {
                debug!("Sending request");
                let (respond_to, response) = oneshot::channel();
                self.sender
                    .send(ControlRequest::$variant { respond_to })
                    .await
                    .map_err(|_| FrameworkError::Gone("orchestrator"))?;
                response
                    .await
                    .map_err(|_| FrameworkError::Gone("orchestrator"))?
            }
        }
    };
}

/// Cheap to clone; holds only the request sender.
#[derive(Clone)]
pub struct ControlClient {
    sender: mpsc::Sender<ControlRequest>,
}

impl ControlClient {
    pub fn new(sender: mpsc::Sender<ControlRequest>) -> Self {
        Self { sender }
    }

    control_method!(
        /// Asks every live actor to take stock. Bakers keep producing.
        inventory_audit => InventoryAudit
    );

    control_method!(
        /// Closes the shop at once; customers drop their carts and leave.
        evacuation => Evacuation
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_are_acknowledged() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = ControlClient::new(tx);

        let orchestrator = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(request) = rx.recv().await {
                seen.push(request.name());
                match request {
                    ControlRequest::InventoryAudit { respond_to }
                    | ControlRequest::Evacuation { respond_to } => {
                        let _ = respond_to.send(Ok(()));
                    }
                }
            }
            seen
        });

        client.request_inventory_audit().await.unwrap();
        client.request_evacuation().await.unwrap();
        drop(client);

        assert_eq!(orchestrator.await.unwrap(), vec!["inventory_audit", "evacuation"]);
    }

    #[tokio::test]
    async fn test_gone_orchestrator_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let client = ControlClient::new(tx);
        assert_eq!(
            client.request_evacuation().await,
            Err(FrameworkError::Gone("orchestrator"))
        );
    }
}
