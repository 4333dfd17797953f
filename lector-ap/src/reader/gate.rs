//! Re-armable gate
//!
//! `set()` releases every waiter; each [`GateWaiter`] then re-arms itself on
//! its next `wait()`. A `set()` that lands while a waiter is busy is not
//! lost: the waiter's next `wait()` returns immediately. `cancel()` makes
//! waiters return [`GateCancelled`], which the reader uses to shut its
//! workers down.

use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Armed,
    Set,
    Cancelled,
}

/// Returned by [`GateWaiter::wait`] after a `cancel()` or when the gate is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("gate cancelled")]
pub struct GateCancelled;

/// Signalling side, shared by everyone allowed to wake the workers
#[derive(Debug)]
pub struct Gate {
    tx: watch::Sender<Signal>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Signal::Armed);
        Self { tx }
    }

    /// Release all current waiters
    pub fn set(&self) {
        self.tx.send_replace(Signal::Set);
    }

    /// Fail all current waiters
    pub fn cancel(&self) {
        self.tx.send_replace(Signal::Cancelled);
    }

    /// New waiter; signals sent before this call are not observed
    pub fn waiter(&self) -> GateWaiter {
        GateWaiter {
            rx: self.tx.subscribe(),
        }
    }
}

/// Waiting side, owned by one worker
#[derive(Debug)]
pub struct GateWaiter {
    rx: watch::Receiver<Signal>,
}

impl GateWaiter {
    /// Suspend until the next `set()` or `cancel()`.
    ///
    /// # Errors
    /// [`GateCancelled`] when the gate was cancelled or dropped
    pub async fn wait(&mut self) -> Result<(), GateCancelled> {
        self.rx.changed().await.map_err(|_| GateCancelled)?;
        match *self.rx.borrow_and_update() {
            Signal::Cancelled => Err(GateCancelled),
            Signal::Armed | Signal::Set => Ok(()),
        }
    }
}
