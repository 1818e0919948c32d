use crate::model::{RegisterId, SharedState};
use tokio::sync::watch;
use tracing::trace;

/// Follows the published shared state and flips `active` whenever the
/// register's `open` flag changes. Ends when the state is torn down or the
/// cashier drops its receiver.
pub async fn watch_register(
    register: RegisterId,
    mut published: watch::Receiver<Option<SharedState>>,
    active: watch::Sender<bool>,
) {
    loop {
        let open = match published.borrow_and_update().as_ref() {
            Some(state) => state.register(register).is_some_and(|r| r.open),
            None => break,
        };
        let flipped = active.send_if_modified(|current| {
            if *current == open {
                false
            } else {
                *current = open;
                true
            }
        });
        if flipped {
            trace!(%register, open, "register toggled");
        }
        if active.is_closed() || published.changed().await.is_err() {
            break;
        }
    }
}
