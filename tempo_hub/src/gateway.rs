// Connection gateway: turns an accepted TCP connection into a session.
//
// Runs on the connection's own thread (spawned by the listener in
// `server.rs`), so a slow or stalled handshake never holds up other accepts.
// Steps, in order:
//
// 1. Upgrade to WebSocket, accepting only the configured path. Any failure
//    here (timeout, bad request, wrong path) drops the connection; the hub
//    never hears of it.
// 2. Send `init` with the session's ID on a write half cloned from the same
//    TCP stream.
// 3. Hand the write half to the hub in a `Register` event. The hub tells the
//    newcomer about an existing main while handling that event, so the
//    status it sees is the hub's own, with no separate lock.
// 4. Run the session read loop on this thread until the connection ends.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tempo_protocol::{ClientId, RelayMessage};
use tracing::debug;
use tungstenite::WebSocket;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::handshake::{HandshakeError, HandshakeRole};
use tungstenite::http::StatusCode;

use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::outbound::{Outbound, WsOutbound};
use crate::server::{HubEvent, HubSender};
use crate::session;

/// Upper bound on how long a client may take to send its upgrade request.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Gateway {
    path: Arc<str>,
    lookahead: Duration,
    events: HubSender<WsOutbound>,
}

impl Gateway {
    pub fn new(config: &HubConfig, events: HubSender<WsOutbound>) -> Self {
        Self {
            path: config.path.as_str().into(),
            lookahead: config.lookahead,
            events,
        }
    }

    /// Upgrade, greet, and register one connection. Returns the read half
    /// for the session loop.
    pub fn accept(&self, stream: TcpStream, id: &ClientId) -> Result<WebSocket<TcpStream>> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
        let write_half = stream.try_clone()?;

        let path = self.path.clone();
        let socket = tungstenite::accept_hdr(stream, |request: &Request, response: Response| {
            check_path(&path, request, response)
        })
        .map_err(handshake_error)?;
        socket.get_ref().set_read_timeout(None)?;

        let mut outbound = WsOutbound::from_stream(write_half);
        outbound.deliver(&RelayMessage::init(id.clone()))?;
        self.events.submit(HubEvent::Register {
            id: id.clone(),
            outbound,
        })?;
        Ok(socket)
    }
}

/// Connection thread body: gateway steps, then the session read loop.
pub fn serve_connection(gateway: &Gateway, stream: TcpStream, peer: SocketAddr, id: ClientId) {
    match gateway.accept(stream, &id) {
        Ok(socket) => session::run(socket, id, &gateway.events, gateway.lookahead),
        Err(e) => debug!(%peer, client = %id, error = %e, "connection rejected"),
    }
}

fn check_path(path: &str, request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == path {
        return Ok(response);
    }
    let mut rejection = ErrorResponse::new(Some(format!(
        "no websocket endpoint at {}",
        request.uri().path()
    )));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}

pub(crate) fn handshake_error<R: HandshakeRole>(e: HandshakeError<R>) -> HubError {
    match e {
        HandshakeError::Failure(e) => HubError::WebSocket(e),
        HandshakeError::Interrupted(_) => HubError::Handshake("interrupted".into()),
    }
}
