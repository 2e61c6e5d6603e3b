// TCP listener and hub event loop.
//
// Architecture: thread-per-connection with one bounded `mpsc` channel into a
// single hub thread.
//
// - **Listener thread** (`TcpListener::accept()` loop): assigns each accepted
//   connection a `ClientId` and spawns a connection thread running
//   `gateway::serve_connection`.
// - **Connection threads** (one per client): perform the WebSocket upgrade,
//   send `init`, submit `HubEvent::Register`, then run the session read loop
//   (`session.rs`) until the connection ends. After `init` they write only
//   the control replies tungstenite sends from the read side (pong, close).
// - **Hub thread**: owns the `Hub`, receives events from the channel, and
//   applies them in arrival order. Once a session is registered it writes
//   every data frame that session receives. See the DESIGN.md known
//   limitations for the pong case.
//
// The channel is a `sync_channel`, so a connection thread submitting an event
// blocks while the hub is behind. That is backpressure, not an error.
//
// Status queries (`HubHandle::status`) travel through the same channel with a
// reply sender, so they observe the hub state between two events, never a
// half-applied one.
//
// Shutdown: `HubHandle::stop` clears `keep_running`. The listener polls it
// between non-blocking accepts and the hub thread between `recv_timeout`s.
// On exit the hub thread closes every registered session, which ends their
// connection threads.

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use std::time::Duration;

use tempo_protocol::{ClientId, RelayMessage};
use tracing::{debug, error, info};

use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::gateway::{self, Gateway};
use crate::hub::{Hub, HubStatus};
use crate::ids::IdGenerator;
use crate::outbound::{Outbound, WsOutbound};

const ACCEPT_POLL: Duration = Duration::from_millis(50);
const HUB_POLL: Duration = Duration::from_millis(100);

/// Events sent from connection threads (and handles) to the hub thread.
pub enum HubEvent<O> {
    Register { id: ClientId, outbound: O },
    Unregister { id: ClientId },
    Elect { id: ClientId },
    Broadcast { from: ClientId, message: RelayMessage },
    QueryStatus { reply: SyncSender<HubStatus> },
}

/// Sending side of the hub's event channel, cloned into every session.
pub struct HubSender<O> {
    tx: SyncSender<HubEvent<O>>,
}

impl<O> Clone for HubSender<O> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<O> HubSender<O> {
    pub fn new(tx: SyncSender<HubEvent<O>>) -> Self {
        Self { tx }
    }

    /// Submit an event, blocking while the channel is full.
    pub fn submit(&self, event: HubEvent<O>) -> Result<()> {
        self.tx.send(event).map_err(|_| HubError::HubStopped)
    }

    /// Ask the hub thread for a consistent snapshot of its state.
    pub fn status(&self) -> Result<HubStatus> {
        let (reply, response) = mpsc::sync_channel(1);
        self.submit(HubEvent::QueryStatus { reply })?;
        response.recv().map_err(|_| HubError::HubStopped)
    }
}

/// Handle returned by `start_hub` to query and control the running server.
pub struct HubHandle {
    keep_running: Arc<AtomicBool>,
    events: HubSender<WsOutbound>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl HubHandle {
    /// Current session count and main session, read through the hub thread.
    pub fn status(&self) -> Result<HubStatus> {
        self.events.status()
    }

    /// Block until the listener and hub threads exit.
    pub fn wait(mut self) {
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }

    /// Signal the server to stop and wait for it to shut down.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.wait();
    }
}

/// Start the hub on background threads. Returns a handle and the actual
/// bound address (useful when port 0 is used to let the OS pick).
pub fn start_hub(config: HubConfig) -> Result<(HubHandle, SocketAddr)> {
    let listener = TcpListener::bind(config.listen)?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = mpsc::sync_channel(config.event_capacity.max(1));
    let events = HubSender::new(tx);

    let hub_thread = {
        let keep_running = keep_running.clone();
        thread::Builder::new()
            .name("tempo-hub".into())
            .spawn(move || run_hub(&rx, &keep_running))?
    };

    let listener_thread = {
        let keep_running = keep_running.clone();
        let gateway = Gateway::new(&config, events.clone());
        thread::Builder::new()
            .name("tempo-listener".into())
            .spawn(move || run_listener(&listener, &gateway, &keep_running))?
    };

    info!(%addr, path = %config.path, "hub listening");

    Ok((
        HubHandle {
            keep_running,
            events,
            threads: vec![listener_thread, hub_thread],
        },
        addr,
    ))
}

/// Hub event loop. Runs until `keep_running` is cleared or every sender is
/// gone.
pub fn run_hub<O: Outbound>(rx: &Receiver<HubEvent<O>>, keep_running: &AtomicBool) {
    let mut hub = Hub::new();
    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(HUB_POLL) {
            Ok(event) => handle_event(&mut hub, event),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(sessions = hub.session_count(), "hub loop exiting");
    hub.close_all();
}

/// Apply a single event to the hub.
pub fn handle_event<O: Outbound>(hub: &mut Hub<O>, event: HubEvent<O>) {
    match event {
        HubEvent::Register { id, outbound } => hub.register(id, outbound),
        HubEvent::Unregister { id } => hub.unregister(&id),
        HubEvent::Elect { id } => {
            let _ = hub.elect(&id);
        }
        HubEvent::Broadcast { from, message } => {
            let _ = hub.relay(&from, message);
        }
        HubEvent::QueryStatus { reply } => {
            let _ = reply.send(hub.status());
        }
    }
}

/// Accept loop. Each connection gets its ID here, on one thread, so the
/// generator needs no locking.
fn run_listener(listener: &TcpListener, gateway: &Gateway, keep_running: &AtomicBool) {
    let mut ids = IdGenerator::new();
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let id = ids.next_id();
                let gateway = gateway.clone();
                let spawned = thread::Builder::new()
                    .name(format!("tempo-session-{id}"))
                    .spawn(move || gateway::serve_connection(&gateway, stream, peer, id));
                if let Err(e) = spawned {
                    error!(%peer, error = %e, "failed to spawn session thread");
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                error!(error = %e, "accept failed, listener stopping");
                break;
            }
        }
    }
}
