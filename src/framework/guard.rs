//! # Shared State Guard
//!
//! Mutual exclusion over a single shared record. Critical sections are plain
//! closures, so nothing can `.await` while the lock is held: a task aborted at a
//! suspension point is never inside a section, and a holder that panics only
//! poisons the mutex, which the guard recovers from on the next lock.
//!
//! Every mutation publishes a copy of the record on a `watch` channel so
//! diagnostic readers never touch the lock.

use crate::framework::FrameworkError;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::warn;

/// Cloneable handle to the guarded record.
pub struct StateGuard<T> {
    inner: Arc<GuardInner<T>>,
}

struct GuardInner<T> {
    name: &'static str,
    state: Mutex<Option<T>>,
    published: watch::Sender<Option<T>>,
}

impl<T> Clone for StateGuard<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> StateGuard<T> {
    pub fn new(name: &'static str, state: T) -> Self {
        let (published, _) = watch::channel(Some(state.clone()));
        Self {
            inner: Arc::new(GuardInner {
                name,
                state: Mutex::new(Some(state)),
                published,
            }),
        }
    }

    /// Runs `f` with exclusive access and publishes the result for observers.
    ///
    /// Returns `Gone` once the record has been taken down.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, FrameworkError> {
        let mut slot = self.lock();
        let state = slot.as_mut().ok_or(FrameworkError::Gone(self.inner.name))?;
        let result = f(state);
        self.inner.published.send_replace(Some(state.clone()));
        Ok(result)
    }

    /// Exclusive read without publishing.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, FrameworkError> {
        let slot = self.lock();
        slot.as_ref().map(f).ok_or(FrameworkError::Gone(self.inner.name))
    }

    /// Receiver of the last published copy. `None` after teardown.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.inner.published.subscribe()
    }

    /// Removes the record. Later sections return `Gone`. Only the first call
    /// returns the record.
    pub fn take(&self) -> Option<T> {
        let taken = self.lock().take();
        if taken.is_some() {
            self.inner.published.send_replace(None);
        }
        taken
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.inner.state.lock().unwrap_or_else(|poisoned| {
            warn!(guard = self.inner.name, "holder died inside critical section, recovering lock");
            self.inner.state.clear_poison();
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn test_panicking_holder_does_not_leave_lock_held() {
        let guard = StateGuard::new("counter", 0u32);
        guard.with_lock(|n| *n += 1).unwrap();

        let crashed = catch_unwind(AssertUnwindSafe(|| {
            guard
                .with_lock(|n| {
                    *n += 1;
                    panic!("holder crashed");
                })
                .ok();
        }));
        assert!(crashed.is_err());

        let value = guard.with_lock(|n| {
            *n += 1;
            *n
        });
        assert_eq!(value, Ok(3));
    }

    #[test]
    fn test_take_is_idempotent_and_gone_afterwards() {
        let guard = StateGuard::new("state", String::from("open"));
        let observer = guard.subscribe();

        assert_eq!(guard.take().as_deref(), Some("open"));
        assert_eq!(guard.take(), None);
        assert_eq!(guard.with_lock(|_| ()), Err(FrameworkError::Gone("state")));
        assert!(observer.borrow().is_none());
    }

    #[test]
    fn test_mutations_are_published() {
        let guard = StateGuard::new("counter", 10u32);
        let observer = guard.subscribe();
        guard.with_lock(|n| *n -= 3).unwrap();
        assert_eq!(*observer.borrow(), Some(7));
        // reads do not republish
        assert_eq!(guard.read(|n| *n), Ok(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let guard = StateGuard::new("counter", 0u64);
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let guard = guard.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    guard.with_lock(|n| *n += 1).unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(guard.read(|n| *n), Ok(8000));
    }
}
