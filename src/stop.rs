/// Broadcast-once stop notification shared by the signal listener and the worker.
///
/// The signal starts open and can be fired exactly once. Any number of
/// [`StopListener`]s observe the transition; a listener created or polled after
/// the signal fired resolves immediately. Dropping the [`StopSignal`] without
/// firing it also releases every listener, the same way closing a channel would.
use tokio::sync::watch;

/// Write half of the stop notification. Owned by a single writer.
#[derive(Debug)]
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

/// Read half of the stop notification. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StopListener {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Create an open (unfired) stop signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe a new reader.
    pub fn listener(&self) -> StopListener {
        StopListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal.
    ///
    /// Returns `true` only for the call that moved the signal from open to
    /// fired; every later call is a no-op returning `false`.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Whether the signal has been fired.
    #[allow(dead_code)]
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopListener {
    /// Wait until the signal fires or its writer goes away.
    pub async fn stopped(&mut self) {
        // Err means the writer was dropped, which releases us just the same.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    /// Non-blocking check of the signal state.
    #[allow(dead_code)]
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}
