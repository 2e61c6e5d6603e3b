// JSON encoding of `RelayMessage` for WebSocket frames.
//
// The WebSocket layer already delimits messages, so unlike a raw TCP stream
// there is no length prefix here: one frame carries exactly one JSON object.
// `decode` accepts the payload of either a text or a binary frame.
//
// `MAX_MESSAGE_SIZE` caps inbound payloads. Commands are short strings, so
// anything near the cap is a misbehaving client and is treated as malformed.

use crate::error::ProtocolError;
use crate::message::RelayMessage;

/// Maximum accepted payload size (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Serialize a message into the text of one WebSocket frame.
pub fn encode(msg: &RelayMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

/// Parse one frame payload. Fails on oversized input, invalid JSON, or a
/// record without `type`. An unrecognized `type` yields `RelayMessage::Unknown`.
pub fn decode(payload: &[u8]) -> Result<RelayMessage, ProtocolError> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge {
            len: payload.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(serde_json::from_slice(payload)?)
}
