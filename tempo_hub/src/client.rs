// Blocking WebSocket client for the hub.
//
// Architecture mirrors a browser tab:
// - `connect()` performs the TCP connect and WebSocket upgrade on the calling
//   thread and waits for the hub's `init`, then spawns a background reader
//   thread.
// - The reader thread decodes frames and pushes `RelayMessage`s into an
//   `mpsc` inbox.
// - The caller keeps a write half (`WsOutbound` in client role, so frames
//   are masked) for sending.
// - `poll()` drains the inbox without blocking; `recv_timeout()` waits for
//   the next message.
//
// Dropping the client shuts the socket down, which ends the reader thread
// and makes the hub unregister the session.
//
// The integration tests drive the hub with this client; it has no browser
// or UI dependencies.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tempo_protocol::{ClientId, RelayMessage, decode};
use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};

use crate::error::{HubError, Result};
use crate::gateway::handshake_error;
use crate::outbound::{Outbound, WsOutbound};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket client for hub communication.
pub struct HubClient {
    writer: WsOutbound,
    inbox: Receiver<RelayMessage>,
    _reader_thread: Option<JoinHandle<()>>,
    client_id: ClientId,
}

impl HubClient {
    /// Connect to `ws://{addr}{path}`, wait for `init`, and spawn the reader
    /// thread.
    pub fn connect(addr: SocketAddr, path: &str) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_read_timeout(Some(CONNECT_TIMEOUT))?;
        let write_half = stream.try_clone()?;

        let url = format!("ws://{addr}{path}");
        let (mut socket, _response) =
            tungstenite::client(url.as_str(), stream).map_err(handshake_error)?;

        let client_id = match read_next(&mut socket)? {
            Some(RelayMessage::Init { client_id }) => client_id,
            Some(other) => {
                return Err(HubError::UnexpectedMessage {
                    expected: "init",
                    got: other.kind(),
                });
            }
            None => return Err(tungstenite::Error::ConnectionClosed.into()),
        };

        // Clear the read timeout for the long-lived reader loop.
        socket.get_ref().set_read_timeout(None)?;

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || {
            while let Ok(Some(msg)) = read_next(&mut socket) {
                if tx.send(msg).is_err() {
                    break; // Client dropped the receiver
                }
            }
        });

        Ok(Self {
            writer: WsOutbound::with_role(write_half, Role::Client),
            inbox: rx,
            _reader_thread: Some(reader_thread),
            client_id,
        })
    }

    /// The ID the hub assigned in `init`.
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Claim the main role.
    pub fn become_main(&mut self) -> Result<()> {
        self.send(&RelayMessage::BecomeMain { client_id: None })
    }

    /// Send a command. The hub relays it only if this client is main.
    pub fn send_command(&mut self, command: &str) -> Result<()> {
        self.send(&RelayMessage::command(command))
    }

    pub fn send(&mut self, msg: &RelayMessage) -> Result<()> {
        self.writer.deliver(msg)
    }

    /// Wait up to `timeout` for the next message from the hub.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RelayMessage> {
        self.inbox.recv_timeout(timeout).ok()
    }

    /// Drain all queued hub messages (non-blocking).
    pub fn poll(&self) -> Vec<RelayMessage> {
        self.inbox.try_iter().collect()
    }

    /// Close the connection.
    pub fn disconnect(self) {
        drop(self);
    }
}

impl Drop for HubClient {
    fn drop(&mut self) {
        self.writer.close();
    }
}

/// Read frames until one carries a message. `Ok(None)` on a close frame.
fn read_next<S: Read + Write>(socket: &mut WebSocket<S>) -> Result<Option<RelayMessage>> {
    loop {
        match socket.read()? {
            Message::Text(text) => return Ok(Some(decode(text.as_bytes())?)),
            Message::Binary(data) => return Ok(Some(decode(&data)?)),
            Message::Close(_) => return Ok(None),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
}
