//! Shutdown coordination for the server and its extensions.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::extensions::ExtensionMap;

/// One-way stop signal.
///
/// Cloning shares the signal. Once triggered it stays triggered, so tasks that
/// subscribe late still observe it.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger the signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has been triggered.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on trigger.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// An extension task started by the server.
pub struct RunningExtension {
    pub name: String,
    pub handle: JoinHandle<()>,
}

/// Ask every extension to stop, concurrently.
pub async fn stop_extensions(extensions: &ExtensionMap) {
    join_all(extensions.iter().map(|(name, extension)| async move {
        extension.stop().await;
        tracing::debug!(extension = %name, "Stop signalled");
    }))
    .await;
}

/// Wait up to `grace` for extension tasks to return.
///
/// Tasks still running afterwards are logged and left alone.
pub async fn join_extensions(running: Vec<RunningExtension>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    for RunningExtension { name, handle, .. } in running {
        match tokio::time::timeout_at(deadline, handle).await {
            Ok(Ok(())) => tracing::info!(extension = %name, "Extension finished"),
            Ok(Err(e)) => tracing::error!(extension = %name, error = %e, "Extension task failed"),
            Err(_) => tracing::warn!(extension = %name, "Extension still running after shutdown grace period"),
        }
    }
}
