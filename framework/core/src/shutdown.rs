use std::sync::atomic::{AtomicBool, Ordering};
use std::{borrow::BorrowMut, sync::Arc};

use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// Sends the stop signals to everything participating in a load run.
///
/// There is one handle per run. It is cheap to clone and every clone signals the same run.
/// Stopping happens in two phases: [ShutdownHandle::shutdown] stops the admission of new
/// scenario executions while in-flight work keeps running, and [ShutdownHandle::cancel] cuts
/// in-flight work loose at the end of the graceful stop window. Both signals are idempotent,
/// whichever of the duration timer, Ctrl-C or a forced stop gets there first wins.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    stop_sender: Sender<()>,
    cancel_sender: Sender<()>,
    stop_signalled: Arc<AtomicBool>,
    cancel_signalled: Arc<AtomicBool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            stop_sender: tokio::sync::broadcast::channel(1).0,
            cancel_sender: tokio::sync::broadcast::channel(1).0,
            stop_signalled: Arc::new(AtomicBool::new(false)),
            cancel_signalled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop admitting new scenario executions. Work already in flight keeps running until
    /// [ShutdownHandle::cancel].
    pub fn shutdown(&self) {
        if self.stop_signalled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.stop_sender.send(()) {
            // Will fail if nobody is listening for a shutdown signal, in which case the log message
            // can be ignored.
            log::warn!("Failed to send shutdown signal: {e:?}");
        }
    }

    /// Cancel work that is still in flight. Implies [ShutdownHandle::shutdown].
    pub fn cancel(&self) {
        self.shutdown();
        if self.cancel_signalled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.cancel_sender.send(()) {
            log::warn!("Failed to send cancel signal: {e:?}");
        }
    }

    /// A listener for the stop signal. Schedulers use this to stop admitting new executions.
    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.stop_sender.subscribe())
    }

    /// A listener for the cancel signal. Step executors race in-flight work against this so
    /// that executions get the full graceful stop window before being cut off.
    pub fn new_cancel_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.cancel_sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Point in time check for the stop signal. When this returns true, no further scenario
    /// iterations should be started.
    pub fn should_shutdown(&mut self) -> bool {
        match self.receiver.try_lock() {
            Ok(mut guard) => {
                match guard.try_recv() {
                    Ok(_) => true,
                    Err(tokio::sync::broadcast::error::TryRecvError::Closed) => true,
                    // If the receiver is empty or lagged then we should not shutdown.
                    Err(_) => false,
                }
            }
            Err(_) => false,
        }
    }

    /// Wait for the stop signal. It is safe to race this against another future so that the
    /// signal can be used to cancel work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        self.receiver
            .borrow_mut()
            .lock()
            .await
            .recv()
            .await
            .expect("Failed to receive shutdown signal");
    }
}

/// The error that in-flight work resolves to when it is cancelled by the stop signal.
///
/// Step executors race their network I/O against the cancel listener, so a step that is
/// still in flight at the end of the graceful stop window fails with this error rather than
/// hanging.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_does_not_fire_the_cancel_signal() {
        let handle = ShutdownHandle::new();
        let mut stop = handle.new_listener();
        let mut cancel = handle.new_cancel_listener();

        handle.shutdown();

        assert!(stop.should_shutdown());
        assert!(!cancel.should_shutdown());
    }

    #[test]
    fn cancel_implies_shutdown() {
        let handle = ShutdownHandle::new();
        let mut stop = handle.new_listener();
        let mut cancel = handle.new_cancel_listener();

        handle.cancel();

        assert!(stop.should_shutdown());
        assert!(cancel.should_shutdown());
    }

    #[test]
    fn signalling_is_idempotent() {
        let handle = ShutdownHandle::new();
        let mut stop = handle.new_listener();
        let mut cancel = handle.new_cancel_listener();

        handle.shutdown();
        handle.shutdown();
        handle.cancel();
        handle.cancel();

        assert!(stop.should_shutdown());
        assert!(cancel.should_shutdown());
    }
}
