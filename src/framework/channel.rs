//! # Bounded Channel
//!
//! A fixed-capacity message channel with per-key FIFO delivery. Capacity is
//! accounted through a [`CapacityGate`]: a sender takes a slot *before* the
//! message is enqueued, the slot permit travels inside the queued envelope, and
//! it is dropped only *after* the receiver has dequeued the message. The only
//! transient drift is therefore an undercount of free slots, never an overcount.
//!
//! Receivers select by routing key ([`RecvKey::Key`]) or take the oldest
//! message overall ([`RecvKey::Any`]). Waiting receivers are woken through a
//! [`Notify`] that is armed before the queue is re-checked, so an arrival
//! between the check and the wait is never lost.
//!
//! After [`BoundedChannel::close`] every operation returns `Gone`.

use crate::framework::{CapacityGate, FrameworkError, GatePermit};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Slot count used when no byte budget is available.
pub const DEFAULT_SLOTS: usize = 8;

/// Derives a slot count from a byte budget: one slot is kept in reserve and
/// the result never drops below one.
pub fn derive_capacity(byte_budget: usize, message_size: usize) -> usize {
    if byte_budget == 0 || message_size == 0 {
        return DEFAULT_SLOTS;
    }
    (byte_budget / message_size).saturating_sub(1).max(1)
}

/// Which messages a receive may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvKey<K> {
    Key(K),
    /// Oldest message regardless of key.
    Any,
}

struct Envelope<T> {
    seq: u64,
    message: T,
    _slot: GatePermit,
}

struct Queues<K, T> {
    by_key: HashMap<K, VecDeque<Envelope<T>>>,
    next_seq: u64,
}

struct ChannelInner<K, T> {
    name: &'static str,
    capacity: usize,
    slots: CapacityGate,
    queues: Mutex<Queues<K, T>>,
    arrivals: Notify,
    closed: AtomicBool,
}

pub struct BoundedChannel<K, T> {
    inner: Arc<ChannelInner<K, T>>,
}

impl<K, T> Clone for BoundedChannel<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> BoundedChannel<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Send + 'static,
{
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        debug!(channel = name, capacity, "channel created");
        Self {
            inner: Arc::new(ChannelInner {
                name,
                capacity,
                slots: CapacityGate::new(format!("{name}-slots"), capacity),
                queues: Mutex::new(Queues {
                    by_key: HashMap::new(),
                    next_seq: 0,
                }),
                arrivals: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Sizes the channel from a byte budget and the in-memory size of one
    /// keyed message.
    pub fn with_byte_budget(name: &'static str, byte_budget: usize) -> Self {
        let size = std::mem::size_of::<(K, T)>();
        Self::new(name, derive_capacity(byte_budget, size))
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Free slots, `None` once the channel is gone.
    pub fn free_slots(&self) -> Option<usize> {
        self.inner.slots.peek()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Blocks until a slot is free, then enqueues.
    pub async fn send(&self, key: K, message: T) -> Result<(), FrameworkError> {
        self.ensure_open()?;
        let slot = self
            .inner
            .slots
            .acquire()
            .await
            .map_err(|_| self.gone())?;
        self.enqueue(key, message, slot)
    }

    /// Like [`send`](Self::send), but a cancelled slot wait returns
    /// `Interrupted` without enqueuing anything.
    pub async fn send_interruptible(
        &self,
        key: K,
        message: T,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        self.ensure_open()?;
        let slot = self
            .inner
            .slots
            .acquire_interruptible(cancel)
            .await
            .map_err(|e| match e {
                FrameworkError::Interrupted => FrameworkError::Interrupted,
                _ => self.gone(),
            })?;
        self.enqueue(key, message, slot)
    }

    /// Non-blocking send. `WouldBlock` when every slot is taken.
    pub fn try_send(&self, key: K, message: T) -> Result<(), FrameworkError> {
        self.ensure_open()?;
        let slot = self.inner.slots.try_acquire().map_err(|e| match e {
            FrameworkError::WouldBlock => FrameworkError::WouldBlock,
            _ => self.gone(),
        })?;
        self.enqueue(key, message, slot)
    }

    fn enqueue(&self, key: K, message: T, slot: GatePermit) -> Result<(), FrameworkError> {
        {
            let mut queues = self.lock();
            if self.is_closed() {
                return Err(self.gone());
            }
            let seq = queues.next_seq;
            queues.next_seq += 1;
            queues.by_key.entry(key).or_default().push_back(Envelope {
                seq,
                message,
                _slot: slot,
            });
        }
        self.inner.arrivals.notify_waiters();
        Ok(())
    }

    /// Takes the oldest matching message without waiting.
    pub fn try_recv(&self, key: &RecvKey<K>) -> Result<T, FrameworkError> {
        let envelope = {
            let mut queues = self.lock();
            if self.is_closed() {
                return Err(self.gone());
            }
            let key = match key {
                RecvKey::Key(k) => Some(k.clone()),
                RecvKey::Any => queues
                    .by_key
                    .iter()
                    .filter_map(|(k, q)| q.front().map(|e| (e.seq, k)))
                    .min_by_key(|(seq, _)| *seq)
                    .map(|(_, k)| k.clone()),
            };
            key.and_then(|k| pop_front(&mut queues.by_key, &k))
        };
        // the slot goes back only once the envelope has left the queue
        match envelope {
            Some(Envelope { message, .. }) => Ok(message),
            None => Err(FrameworkError::WouldBlock),
        }
    }

    /// Waits for a matching message. Returns `Interrupted` when `cancel` fires.
    pub async fn recv(
        &self,
        key: RecvKey<K>,
        cancel: &CancellationToken,
    ) -> Result<T, FrameworkError> {
        loop {
            let notified = self.inner.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_recv(&key) {
                Err(FrameworkError::WouldBlock) => {}
                other => return other,
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FrameworkError::Interrupted),
                _ = &mut notified => {}
            }
        }
    }

    pub async fn recv_timeout(
        &self,
        key: RecvKey<K>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<T, FrameworkError> {
        tokio::time::timeout(timeout, self.recv(key, cancel))
            .await
            .map_err(|_| FrameworkError::TimedOut)?
    }

    /// Removes the first queued message for `key` that satisfies `predicate`.
    pub fn withdraw(&self, key: &K, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let mut queues = self.lock();
        let queue = queues.by_key.get_mut(key)?;
        let position = queue.iter().position(|e| predicate(&e.message))?;
        let envelope = queue.remove(position)?;
        if queue.is_empty() {
            queues.by_key.remove(key);
        }
        drop(queues);
        trace!(channel = self.inner.name, "message withdrawn");
        Some(envelope.message)
    }

    /// Removes every message queued under `key` and hands them back, oldest
    /// first. Their slots are free once this returns.
    pub fn purge(&self, key: &K) -> Vec<T> {
        let removed = self.lock().by_key.remove(key);
        removed
            .map(|queue| queue.into_iter().map(|e| e.message).collect())
            .unwrap_or_default()
    }

    /// Drops the queues of every key matching `predicate`.
    pub fn purge_where(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let mut queues = self.lock();
        let doomed: Vec<K> = queues
            .by_key
            .keys()
            .filter(|k| predicate(k))
            .cloned()
            .collect();
        let removed: Vec<VecDeque<Envelope<T>>> = doomed
            .iter()
            .filter_map(|k| queues.by_key.remove(k))
            .collect();
        drop(queues);
        removed.iter().map(VecDeque::len).sum()
    }

    /// Messages currently queued.
    pub fn len(&self) -> usize {
        self.lock().by_key.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len_for(&self, key: &K) -> usize {
        self.lock().by_key.get(key).map_or(0, VecDeque::len)
    }

    /// Tears the channel down and wakes every waiter. Queued messages stay
    /// where they are but can no longer be received.
    pub fn close(&self) {
        {
            let _queues = self.lock();
            self.inner.closed.store(true, Ordering::Release);
        }
        self.inner.slots.close();
        self.inner.arrivals.notify_waiters();
        debug!(channel = self.inner.name, "channel closed");
    }

    fn ensure_open(&self) -> Result<(), FrameworkError> {
        if self.is_closed() {
            Err(self.gone())
        } else {
            Ok(())
        }
    }

    fn gone(&self) -> FrameworkError {
        FrameworkError::Gone(self.inner.name)
    }

    fn lock(&self) -> MutexGuard<'_, Queues<K, T>> {
        self.inner
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn pop_front<K: Eq + Hash, T>(
    by_key: &mut HashMap<K, VecDeque<Envelope<T>>>,
    key: &K,
) -> Option<Envelope<T>> {
    let queue = by_key.get_mut(key)?;
    let envelope = queue.pop_front();
    if queue.is_empty() {
        by_key.remove(key);
    }
    envelope
}
