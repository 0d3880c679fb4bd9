//! Process-wide cancellation signal
//!
//! A [`ShutdownHandle`] is held by whoever decides when to stop (the daemon's
//! signal handler, a test). Every [`ShutdownSignal`] cloned from the same
//! channel observes the trigger: the periodic loop between cycles, backoff
//! sleeps, and the resolver reload.

use tokio::sync::watch;

/// Create a connected handle/signal pair
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

/// Triggering side of the cancellation signal
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Request shutdown
    ///
    /// Calling this more than once is harmless.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Create another signal observing this handle
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observing side of the cancellation signal
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested
    ///
    /// Resolves immediately if it already was. If every handle is dropped
    /// without triggering, this never resolves.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
