// Session read loop: one per connected client, on the connection's thread.
//
// The loop blocks on `WebSocket::read`, decodes each frame into a
// `RelayMessage`, stamps it with the session's ID, and turns it into a hub
// event:
//
// - `become_main` becomes `HubEvent::Elect`. The hub arbitrates; the session
//   never learns the outcome directly and keeps reading either way.
// - `command` gets its scheduled time (receive time + lookahead) and becomes
//   `HubEvent::Broadcast`. The hub drops it unless this session is main.
// - `init` and `main_status` are hub announcements; from a client they are
//   ignored, even from the main session.
// - Any other `type` decodes as `Unknown` and is skipped. The session stays
//   open.
//
// The loop ends on a read error, a close frame, or a frame that fails to
// decode (non-JSON, oversized, or missing `type`). Every exit path submits `Unregister` and shuts the socket down,
// which also fails any in-flight hub write to it.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use chrono::Utc;
use tempo_protocol::{ClientId, RelayMessage, decode};
use tracing::{debug, info};
use tungstenite::{Message, WebSocket};

use crate::error::Result;
use crate::server::{HubEvent, HubSender};

/// Run the read loop to completion, then unregister.
pub fn run<O>(
    mut socket: WebSocket<TcpStream>,
    id: ClientId,
    events: &HubSender<O>,
    lookahead: Duration,
) {
    match read_loop(&mut socket, &id, events, lookahead) {
        Ok(()) => debug!(client = %id, "client closed connection"),
        Err(e) => info!(client = %id, error = %e, "session ended"),
    }
    let _ = events.submit(HubEvent::Unregister { id });
    let _ = socket.get_ref().shutdown(Shutdown::Both);
}

fn read_loop<S: Read + Write, O>(
    socket: &mut WebSocket<S>,
    id: &ClientId,
    events: &HubSender<O>,
    lookahead: Duration,
) -> Result<()> {
    loop {
        let mut msg = match socket.read()? {
            Message::Text(text) => decode(text.as_bytes())?,
            Message::Binary(data) => decode(&data)?,
            Message::Close(_) => return Ok(()),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };
        msg.stamp(id);

        let kind = msg.kind();
        match to_event(msg, id, lookahead) {
            Some(event) => events.submit(event)?,
            None => debug!(client = %id, kind, "ignoring message from client"),
        }
    }
}

/// Map a stamped inbound message to the hub event it requests.
pub fn to_event<O>(msg: RelayMessage, id: &ClientId, lookahead: Duration) -> Option<HubEvent<O>> {
    match msg {
        RelayMessage::BecomeMain { .. } => Some(HubEvent::Elect { id: id.clone() }),
        RelayMessage::Command {
            command, client_id, ..
        } => Some(HubEvent::Broadcast {
            from: id.clone(),
            message: RelayMessage::Command {
                command,
                time: Some(scheduled_time(lookahead)),
                client_id,
            },
        }),
        RelayMessage::Init { .. } | RelayMessage::MainStatus { .. } => None,
        RelayMessage::Unknown => None,
    }
}

/// Current time plus `lookahead`, in nanoseconds since the Unix epoch.
pub fn scheduled_time(lookahead: Duration) -> i64 {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    now.saturating_add(i64::try_from(lookahead.as_nanos()).unwrap_or(i64::MAX))
}
