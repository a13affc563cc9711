//! Non-owning handle to a device's connection.

use stagelink_core::protocol::ServerMessage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Depth of the per-connection outbound queue. A connection that cannot
/// drain this many frames is treated as gone for the affected sends.
pub const SEND_QUEUE_DEPTH: usize = 64;

/// Write handle for one device connection.
///
/// The registry stores this inside each `Device` record; the connection task
/// owns the receiving end and drains it into the socket. Delivery is
/// best-effort: a full or closed queue is a skipped send, never an error to
/// the caller. `close` fires the connection's cancellation token, which the
/// connection task observes to shut the socket down (the session-delete
/// boundary uses this to force-close a whole roster).
#[derive(Debug, Clone)]
pub struct DeviceLink {
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl DeviceLink {
    pub fn new(tx: mpsc::Sender<String>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Link plus the matching receiver, on a fresh cancellation token.
    /// Used by tests and by callers that manage their own token.
    pub fn pair() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_DEPTH);
        (Self::new(tx, CancellationToken::new()), rx)
    }

    /// Queue a pre-serialized frame. Returns `false` when the connection is
    /// closed or its queue is full; the frame is dropped either way.
    pub fn send_raw(&self, text: String) -> bool {
        match self.tx.try_send(text) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("skipped send to closed connection");
                false
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("outbound queue full, dropping frame");
                false
            }
        }
    }

    /// Serialize and queue a protocol message.
    pub fn send(&self, message: &ServerMessage) -> bool {
        match serde_json::to_string(message) {
            Ok(text) => self.send_raw(text),
            Err(e) => {
                warn!(error = %e, "failed to serialize outbound message");
                false
            }
        }
    }

    /// Ask the owning connection task to close the socket.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (link, mut rx) = DeviceLink::pair();
        assert!(link.send(&ServerMessage::Pong));
        let frame = rx.recv().await.expect("frame");
        assert_eq!(frame, r#"{"type":"PONG"}"#);
    }

    #[tokio::test]
    async fn send_to_dropped_receiver_returns_false() {
        let (link, rx) = DeviceLink::pair();
        drop(rx);
        assert!(!link.send(&ServerMessage::Pong));
        assert!(link.is_closed());
    }

    #[tokio::test]
    async fn full_queue_drops_frame() {
        let (tx, _rx) = mpsc::channel(1);
        let link = DeviceLink::new(tx, CancellationToken::new());
        assert!(link.send_raw("one".into()));
        assert!(!link.send_raw("two".into()));
    }

    #[tokio::test]
    async fn close_fires_cancellation() {
        let (link, _rx) = DeviceLink::pair();
        assert!(!link.cancel_token().is_cancelled());
        link.close();
        assert!(link.cancel_token().is_cancelled());
    }
}
