// tempo_protocol: wire protocol between browsers and the tempo hub.
//
// This crate defines the message type and JSON codec used by the hub
// (`tempo_hub`) and by any Rust client that talks to it. It has no
// networking code; the hub carries encoded messages in WebSocket frames.
//
// Module overview:
// - `types.rs`:    `ClientId`, the hub-assigned session identity.
// - `message.rs`:  `RelayMessage`, one variant per wire `type`.
// - `codec.rs`:    `encode`/`decode` between `RelayMessage` and a frame
//                  payload, with a payload size cap.
// - `error.rs`:    `ProtocolError`.
//
// Design decisions:
// - **Tagged union, flat JSON.** Browsers exchange one flat object whose
//   fields are meaningful only for some `type`s. The Rust side models it as
//   an internally tagged enum so callers never check field presence.
// - **Commands are opaque strings.** The hub never interprets them.

pub mod codec;
pub mod error;
pub mod message;
pub mod types;

pub use codec::{MAX_MESSAGE_SIZE, decode, encode};
pub use error::ProtocolError;
pub use message::RelayMessage;
pub use types::ClientId;
