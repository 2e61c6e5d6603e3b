// Write half of a session's connection, as seen by the hub.
//
// Each registered session hands the hub an `Outbound`, and from then on the
// hub thread writes every data frame the session receives. The gateway
// writes `init` on it before registering. The reader thread keeps the other
// half of the same TCP stream, and tungstenite writes pong and close replies
// from there (see the known limitations in DESIGN.md). `WsOutbound` wraps a second tungstenite
// `WebSocket` built over a cloned `TcpStream` with `from_raw_socket`, so
// writes and the reader's blocking `read()` never share a `WebSocket` value.
//
// `close` shuts the TCP stream down in both directions. That is what ends
// the reader thread when the hub drops a session after a failed delivery.

use std::net::{Shutdown, TcpStream};

use tempo_protocol::{RelayMessage, encode};
use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};

use crate::error::Result;

/// Destination for messages the hub delivers to one session.
pub trait Outbound: Send {
    /// Deliver one message. An error means the session is unreachable.
    fn deliver(&mut self, msg: &RelayMessage) -> Result<()>;

    /// Close the connection. Must be idempotent.
    fn close(&mut self);
}

/// Server-side WebSocket write half over a cloned TCP stream.
pub struct WsOutbound {
    socket: WebSocket<TcpStream>,
}

impl WsOutbound {
    /// Wrap a stream whose WebSocket handshake has already completed on
    /// another handle to the same socket.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self::with_role(stream, Role::Server)
    }

    pub(crate) fn with_role(stream: TcpStream, role: Role) -> Self {
        Self {
            socket: WebSocket::from_raw_socket(stream, role, None),
        }
    }
}

impl Outbound for WsOutbound {
    fn deliver(&mut self, msg: &RelayMessage) -> Result<()> {
        let text = encode(msg)?;
        self.socket.send(Message::text(text))?;
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.socket.get_ref().shutdown(Shutdown::Both);
    }
}
