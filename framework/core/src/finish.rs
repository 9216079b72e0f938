use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// Broadcasts the end of a run to anything that needs to stop with it.
///
/// The signal carries the total elapsed duration of the run and is only ever sent once, no matter
/// how many times [FinishHandle::finish] is called.
#[derive(Debug, Clone)]
pub struct FinishHandle {
    sender: Sender<Duration>,
    fired: Arc<AtomicBool>,
}

impl Default for FinishHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl FinishHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send the end signal. Returns `false` if it had already been sent.
    pub fn finish(&self, elapsed: Duration) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            log::warn!("End signal already sent, ignoring");
            return false;
        }

        if let Err(e) = self.sender.send(elapsed) {
            // Will fail if nobody is listening for the end signal, which is fine.
            log::debug!("Nobody listening for the end signal: {e:?}");
        }

        true
    }

    pub fn new_listener(&self) -> FinishListener {
        FinishListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct FinishListener {
    receiver: Arc<Mutex<Receiver<Duration>>>,
}

impl FinishListener {
    pub(crate) fn new(receiver: Receiver<Duration>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Point in time check for the end signal, returning the elapsed run time once it has arrived.
    pub fn try_finished(&mut self) -> Option<Duration> {
        match self.receiver.try_lock() {
            Ok(mut guard) => match guard.try_recv() {
                Ok(elapsed) => Some(elapsed),
                // The handle is gone so nothing else can be sent.
                Err(TryRecvError::Closed) => Some(Duration::ZERO),
                Err(_) => None,
            },
            Err(_) => None,
        }
    }

    /// Wait for the end signal.
    ///
    /// Returns `None` if every [FinishHandle] was dropped without sending it.
    pub async fn wait_for_finish(&mut self) -> Option<Duration> {
        let mut guard = self.receiver.lock().await;
        loop {
            match guard.recv().await {
                Ok(elapsed) => return Some(elapsed),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_is_sent_once() {
        let handle = FinishHandle::new();
        let mut listener = handle.new_listener();

        assert!(listener.try_finished().is_none());
        assert!(handle.finish(Duration::from_millis(250)));
        assert!(!handle.finish(Duration::from_millis(500)));
        assert!(!handle.clone().finish(Duration::from_millis(750)));

        assert_eq!(
            listener.wait_for_finish().await,
            Some(Duration::from_millis(250))
        );
        assert!(listener.try_finished().is_none());
    }

    #[tokio::test]
    async fn dropped_handle_closes_listeners() {
        let handle = FinishHandle::new();
        let mut listener = handle.new_listener();
        drop(handle);

        assert_eq!(listener.wait_for_finish().await, None);
    }
}
