// Hub configuration: the runtime `HubConfig` and the clap `Args` that fill it
// from command-line flags, falling back to `TEMPO_*` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

/// How far in the future relayed commands are scheduled.
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_millis(100);

/// Runtime configuration for `start_hub`.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Address the WebSocket listener binds to.
    pub listen: SocketAddr,
    /// The only request path accepted for the WebSocket upgrade.
    pub path: String,
    /// Delay added to the receive time of a main-session command.
    pub lookahead: Duration,
    /// Capacity of the hub's event channel.
    pub event_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            path: "/ws".into(),
            lookahead: DEFAULT_LOOKAHEAD,
            event_capacity: 64,
        }
    }
}

/// tempo-hub: keeps connected clients playing in lockstep
#[derive(Parser, Debug, Clone)]
#[command(name = "tempo-hub", version, about)]
pub struct Args {
    /// Listen address for WebSocket connections
    #[arg(long, env = "TEMPO_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Request path of the WebSocket endpoint
    #[arg(long, env = "TEMPO_WS_PATH", default_value = "/ws")]
    pub path: String,

    /// Scheduling lookahead for relayed commands, in milliseconds
    #[arg(long, env = "TEMPO_LOOKAHEAD_MS", default_value_t = 100)]
    pub lookahead_ms: u64,

    /// Capacity of the hub event channel
    #[arg(long, env = "TEMPO_EVENT_CAPACITY", default_value_t = 64)]
    pub event_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TEMPO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.path.starts_with('/') {
            return Err(format!("path must start with '/': {}", self.path));
        }
        if self.event_capacity == 0 {
            return Err("event capacity must be at least 1".into());
        }
        Ok(())
    }

    pub fn into_config(self) -> HubConfig {
        HubConfig {
            listen: self.listen,
            path: self.path,
            lookahead: Duration::from_millis(self.lookahead_ms),
            event_capacity: self.event_capacity,
        }
    }
}
