//! Change listener driving the notifier.
//!
//! Subscribes to the change feed and hands every `{before, after}` pair to
//! the core notifier, one at a time. The notifier's own patch writes come
//! back through this loop and are suppressed by its guards.

use std::sync::Arc;
use std::time::Duration;

use slotbook_core::NotifierService;
use slotbook_domain::{Result, SlotbookError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ChangeFeed;

/// Worker consuming the change feed.
pub struct ChangeListener {
    notifier: Arc<NotifierService>,
    feed: Arc<ChangeFeed>,
    cancellation: CancellationToken,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl ChangeListener {
    /// Create a listener over `feed`.
    pub fn new(notifier: Arc<NotifierService>, feed: Arc<ChangeFeed>) -> Self {
        Self {
            notifier,
            feed,
            cancellation: CancellationToken::new(),
            handle: None,
            join_timeout: Duration::from_secs(5),
        }
    }

    /// Spawn the consuming task. Must run inside a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(SlotbookError::Internal("change listener already running".into()));
        }

        self.cancellation = CancellationToken::new();
        let cancel = self.cancellation.clone();
        let notifier = Arc::clone(&self.notifier);
        let mut rx = self.feed.subscribe();

        let handle = tokio::spawn(async move {
            info!("change listener started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("change listener cancelled");
                        break;
                    }
                    received = rx.recv() => match received {
                        Ok(change) => notifier.handle_change(&change).await,
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "change listener lagged; events dropped");
                        }
                        Err(RecvError::Closed) => {
                            debug!("change feed closed");
                            break;
                        }
                    }
                }
            }
            info!("change listener stopped");
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Cancel the task and wait for it to finish.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Err(SlotbookError::Internal("change listener not running".into()));
        };

        self.cancellation.cancel();
        tokio::time::timeout(self.join_timeout, handle)
            .await
            .map_err(|_| SlotbookError::Internal("change listener join timed out".into()))?
            .map_err(|err| SlotbookError::Internal(format!("change listener join failed: {err}")))
    }

    /// Returns true while the consuming task is active.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for ChangeListener {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!("ChangeListener dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
