//! Cooperative cancellation for blocking queue operations

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable "stop requested" signal
///
/// Combines an atomic flag, for cheap polling, with a channel that is closed
/// on cancellation so any thread parked in a `select!` on
/// [`CancellationToken::signal`] wakes immediately. Cancellation is sticky.
///
/// # Example
///
/// ```
/// use log_relay::core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// assert!(!observer.is_cancelled());
///
/// token.cancel();
/// assert!(observer.is_cancelled());
/// assert!(observer.signal().recv().is_err());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    closer: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (closer, signal) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                closer: Mutex::new(Some(closer)),
                signal,
            }),
        }
    }

    /// Request cancellation and wake every waiter
    ///
    /// Returns `true` for the call that actually flipped the flag.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::AcqRel);
        // Dropping the only sender disconnects the channel.
        drop(self.inner.closer.lock().take());
        first
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Channel that becomes disconnected once cancelled
    ///
    /// Nothing is ever sent on it; use it as a `recv` arm in `select!`.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_sticky_and_reports_first() {
        let token = CancellationToken::new();
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_wakes_blocked_receiver() {
        let token = CancellationToken::new();
        let waiter = token.clone();

        let handle = std::thread::spawn(move || waiter.signal().recv().is_err());

        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(handle.join().unwrap());
    }
}
