//! Bounded mailbox for background tasks
//!
//! Each background task owns one mailbox and drains it from a single consumer
//! loop. Capacity is fixed at construction; what happens when it is full is the
//! mailbox's [`OverflowPolicy`]:
//!
//! - `Block`: the sender waits until the consumer frees a slot. Used for work
//!   that must not be lost (switch requests).
//! - `DropOldest`: the oldest queued item is evicted and counted. Used for
//!   progress lines, where the newest state matters most.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    Block,
    DropOldest,
}

/// Returned when sending to a closed mailbox
#[derive(Debug, PartialEq, Eq)]
pub struct MailboxClosed<T>(pub T);

impl<T> std::fmt::Display for MailboxClosed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mailbox closed")
    }
}

/// Why [`Mailbox::try_send`] handed the item back
#[derive(Debug, PartialEq, Eq)]
pub enum TrySendError<T> {
    /// `Block` mailbox at capacity; a later send may succeed
    Full(T),
    Closed(T),
}

impl<T> TrySendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(item) | TrySendError::Closed(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, TrySendError::Full(_))
    }
}

impl<T> std::fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrySendError::Full(_) => write!(f, "mailbox full"),
            TrySendError::Closed(_) => write!(f, "mailbox closed"),
        }
    }
}

struct Inner<T> {
    name: String,
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    policy: OverflowPolicy,
    not_empty: Notify,
    not_full: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

pub struct Mailbox<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Mailbox<T> {
    pub fn new(name: &str, capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                policy,
                not_empty: Notify::new(),
                not_full: Notify::new(),
                dropped: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.inner.policy
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items evicted by the drop-oldest policy since creation
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Enqueue without waiting.
    ///
    /// Under `Block` a full mailbox hands the item back; under `DropOldest` this
    /// only fails once the mailbox is closed.
    pub fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
        if self.is_closed() {
            return Err(TrySendError::Closed(item));
        }

        let mut queue = self.queue();
        if queue.len() >= self.inner.capacity {
            match self.inner.policy {
                OverflowPolicy::Block => return Err(TrySendError::Full(item)),
                OverflowPolicy::DropOldest => {
                    queue.pop_front();
                    let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if dropped.is_power_of_two() {
                        warn!(
                            "mailbox {} full, dropped {} oldest entries so far",
                            self.inner.name, dropped
                        );
                    }
                }
            }
        }
        queue.push_back(item);
        drop(queue);

        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue, waiting for room when the policy is `Block`
    pub async fn send(&self, item: T) -> Result<(), MailboxClosed<T>> {
        let mut item = item;
        loop {
            match self.try_send(item) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Closed(back)) => return Err(MailboxClosed(back)),
                Err(TrySendError::Full(back)) => {
                    item = back;
                    self.inner.not_full.notified().await;
                }
            }
        }
    }

    /// Next item, or `None` once the mailbox is closed and drained
    pub async fn recv(&self) -> Option<T> {
        loop {
            {
                let mut queue = self.queue();
                if let Some(item) = queue.pop_front() {
                    drop(queue);
                    self.inner.not_full.notify_one();
                    return Some(item);
                }
            }
            if self.is_closed() {
                return None;
            }
            self.inner.not_empty.notified().await;
        }
    }

    /// Refuse further sends; queued items can still be received
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.not_empty.notify_waiters();
        self.inner.not_full.notify_waiters();
        // a consumer that checked `closed` just before the store needs a stored permit
        self.inner.not_empty.notify_one();
    }
}
