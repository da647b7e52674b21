use tokio::sync::watch;

use crate::concurrency::signal::{SignalRx, SignalTx, create_signal};

/// Requests cancellation of a running replication.
#[derive(Debug, Clone)]
pub struct ShutdownTx(SignalTx);

impl ShutdownTx {
    pub fn wrap(tx: SignalTx) -> Self {
        Self(tx)
    }

    /// Notifies every subscribed receiver.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

pub type ShutdownRx = SignalRx;

pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = create_signal();
    (ShutdownTx::wrap(tx), rx)
}

/// Resolves once shutdown is requested.
///
/// Never resolves if every [`ShutdownTx`] was dropped without requesting
/// shutdown, a dropped sender is not a cancellation.
pub async fn wait_for_shutdown(shutdown_rx: &mut ShutdownRx) {
    if shutdown_rx.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}
