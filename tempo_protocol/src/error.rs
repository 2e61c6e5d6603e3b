use thiserror::Error;

/// Failure to encode or decode a `RelayMessage`.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message too large: {len} bytes (max {max})")]
    TooLarge { len: usize, max: usize },
}
