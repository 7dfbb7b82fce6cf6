//! Client liveness checks polled between trace steps.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Reports whether the stream's consumer is still attached.
///
/// Must be cheap. Never report disconnected while the client is attached;
/// noticing a disconnect late is fine.
pub trait CancellationWatcher: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Liveness of the channel feeding a response body. The receiver is dropped
/// once the transport gives up on the body.
pub struct ChannelLiveness<T> {
    tx: mpsc::Sender<T>,
}

impl<T> ChannelLiveness<T> {
    pub fn new(tx: mpsc::Sender<T>) -> Self {
        Self { tx }
    }
}

impl<T: Send> CancellationWatcher for ChannelLiveness<T> {
    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl CancellationWatcher for CancellationToken {
    fn is_connected(&self) -> bool {
        !self.is_cancelled()
    }
}

/// For callers that consume the whole stream in-process.
pub struct AlwaysConnected;

impl CancellationWatcher for AlwaysConnected {
    fn is_connected(&self) -> bool {
        true
    }
}
