// CLI entry point for the tempo synchronization hub.
//
// Starts a standalone hub that browsers connect to over WebSocket. See
// `server.rs` for the threading architecture and `hub.rs` for the state it
// guards.
//
// Usage:
//   tempo-hub [OPTIONS]
//     --listen <ADDR>          Listen address (default: 0.0.0.0:8080)
//     --path <PATH>            WebSocket path (default: /ws)
//     --lookahead-ms <MS>      Command scheduling lookahead (default: 100)
//     --event-capacity <N>     Hub event channel capacity (default: 64)
//     --log-level <LEVEL>      Log level (default: info)
//
// Every option can also be set through the environment (`TEMPO_LISTEN`, ...).

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tempo_hub::config::Args;
use tempo_hub::start_hub;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tempo_hub={},info", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let config = args.into_config();
    info!(
        lookahead_ms = config.lookahead.as_millis() as u64,
        event_capacity = config.event_capacity,
        "starting tempo hub"
    );

    let (handle, addr) = start_hub(config)?;
    info!("Hub ready on ws://{addr}");

    // The hub runs for the life of the process; stop it with a signal.
    handle.wait();
    Ok(())
}
