use tempo_protocol::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the hub, its gateway, and the blocking client.
///
/// None of these are process-fatal inside the hub: a failing connection
/// only ends its own session.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    #[error("unexpected message: expected {expected}, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },

    #[error("hub event loop is not running")]
    HubStopped,
}

pub type Result<T, E = HubError> = std::result::Result<T, E>;
