// tempo_hub: real-time synchronization hub.
//
// Clients connect over WebSocket. One of them claims the "main" role; its
// commands are relayed to every connected client with a scheduled execution
// time (receive time + lookahead, 100 ms by default) so that all clients act
// at the same wall-clock instant regardless of their network latency. The
// hub never interprets commands.
//
// Module overview:
// - `hub.rs`:      Hub state: session registry, main-session election,
//                  fan-out with removal of unreachable recipients. The core
//                  data structure that `server.rs` drives.
// - `server.rs`:   TCP listener, hub event channel, and the single hub
//                  thread that owns `Hub`. `start_hub` entry point.
// - `gateway.rs`:  Per-connection setup: WebSocket upgrade at a fixed path,
//                  `init`, registration with the hub.
// - `session.rs`:  Per-connection read loop turning client messages into hub
//                  events.
// - `outbound.rs`: `Outbound`, the hub's write half of a connection.
// - `ids.rs`:      Collision-free timestamp-derived session IDs.
// - `config.rs`:   `HubConfig` and the binary's clap arguments.
// - `client.rs`:   Blocking WebSocket client, used by the integration tests.
// - `error.rs`:    `HubError`.
//
// Dependencies: `tempo_protocol` (message type and codec), `tungstenite`
// (blocking WebSocket), `tracing` (logging), `chrono` (timestamps).
//
// The hub runs as a standalone binary (`main.rs`) or embedded via
// `start_hub`.

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod ids;
pub mod outbound;
pub mod server;
pub mod session;

pub use config::HubConfig;
pub use error::HubError;
pub use server::{HubHandle, start_hub};
