//! FIFO event queue between producers and a relay's worker

use super::cancellation::CancellationToken;
use super::error::{RelayError, Result};
use crossbeam_channel::{
    bounded, never, select, unbounded, Receiver, Select, SendError, Sender, TrySendError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capacity policy of an [`EventQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueuePolicy {
    /// Fixed capacity; `push` blocks while full
    Bounded(usize),
    /// No capacity limit; `push` never blocks
    Unbounded,
}

impl QueuePolicy {
    pub fn capacity(&self) -> Option<usize> {
        match self {
            QueuePolicy::Bounded(capacity) => Some(*capacity),
            QueuePolicy::Unbounded => None,
        }
    }
}

impl fmt::Display for QueuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueuePolicy::Bounded(capacity) => write!(f, "Bounded({})", capacity),
            QueuePolicy::Unbounded => write!(f, "Unbounded"),
        }
    }
}

/// An item a cancelled [`EventQueue::push`] did not enqueue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abandoned<T>(pub T);

impl<T> Abandoned<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<Abandoned<T>> for RelayError {
    fn from(_: Abandoned<T>) -> Self {
        RelayError::Cancelled
    }
}

/// Multi-producer FIFO queue with cancellable blocking operations
///
/// Items come out in exactly the order they went in. Both halves are held by
/// the queue itself, so it never disconnects while it is alive; blocking
/// operations end either with an item or because cancellation was requested.
pub struct EventQueue<T> {
    policy: QueuePolicy,
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> EventQueue<T> {
    /// Create a queue
    ///
    /// Fails with a configuration error for a bounded capacity of zero.
    pub fn new(policy: QueuePolicy) -> Result<Self> {
        let (sender, receiver) = match policy {
            QueuePolicy::Bounded(0) => {
                return Err(RelayError::config(
                    "EventQueue",
                    "bounded capacity must be at least 1",
                ))
            }
            QueuePolicy::Bounded(capacity) => bounded(capacity),
            QueuePolicy::Unbounded => unbounded(),
        };
        Ok(Self {
            policy,
            sender,
            receiver,
        })
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Enqueue, blocking while a bounded queue is full
    ///
    /// If `cancel` (or the optional caller token) fires first, nothing is
    /// enqueued and the item is handed back in [`Abandoned`].
    pub fn push(
        &self,
        item: T,
        cancel: &CancellationToken,
        caller: Option<&CancellationToken>,
    ) -> std::result::Result<(), Abandoned<T>> {
        if cancel.is_cancelled() || caller.is_some_and(CancellationToken::is_cancelled) {
            return Err(Abandoned(item));
        }

        // Fast path: room available, no need to park.
        let item = match self.sender.try_send(item) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(item)) => item,
            // Unreachable while we hold the receiver.
            Err(TrySendError::Disconnected(item)) => return Err(Abandoned(item)),
        };

        let caller_signal = caller.map_or_else(never, |token| token.signal().clone());
        let mut sel = Select::new();
        let send_index = sel.send(&self.sender);
        let cancel_index = sel.recv(cancel.signal());
        let caller_index = sel.recv(&caller_signal);

        let oper = sel.select();
        match oper.index() {
            i if i == send_index => oper
                .send(&self.sender, item)
                .map_err(|SendError(item)| Abandoned(item)),
            i if i == cancel_index => {
                let _ = oper.recv(cancel.signal());
                Err(Abandoned(item))
            }
            i => {
                debug_assert_eq!(i, caller_index);
                let _ = oper.recv(&caller_signal);
                Err(Abandoned(item))
            }
        }
    }

    /// Whether `push` would have to block right now
    pub fn is_full(&self) -> bool {
        self.sender.is_full()
    }

    /// Enqueue without ever blocking
    ///
    /// For a bounded queue that is full the item is handed back.
    pub fn try_push(&self, item: T) -> std::result::Result<(), T> {
        self.sender.try_send(item).map_err(|e| e.into_inner())
    }

    /// Dequeue, blocking while empty
    ///
    /// Returns `Err(Cancelled)` once `cancel` fires, leaving any remaining
    /// items in the queue.
    pub fn pop(&self, cancel: &CancellationToken) -> Result<T> {
        if cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }
        select! {
            recv(self.receiver) -> item => item.map_err(|_| RelayError::Cancelled),
            recv(cancel.signal()) -> _ => Err(RelayError::Cancelled),
        }
    }

    /// Dequeue, blocking while empty, with no way to cancel
    ///
    /// `None` is unreachable while the queue owns its sender.
    pub fn pop_blocking(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    pub fn try_pop(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Remove and return everything currently queued
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

impl<T> fmt::Debug for EventQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("policy", &self.policy)
            .field("len", &self.len())
            .finish()
    }
}
