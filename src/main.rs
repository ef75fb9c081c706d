//! echo-reactor: a readiness-based TCP echo server
//!
//! Every byte a client sends comes back to that client unchanged.
//!
//! Features:
//! - Single-threaded, edge-triggered event loop (epoll on Linux, kqueue on macOS)
//! - Partial-write queueing with per-connection backpressure
//! - Graceful stop on SIGINT/SIGTERM
//! - Configuration via CLI arguments or TOML file

use echo_reactor::config::Config;
use echo_reactor::runtime::{self, Shutdown};
use echo_reactor::signals;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        port = config.port,
        backlog = config.backlog,
        buffer_size = config.buffer_size,
        max_events = config.max_events,
        max_pending = config.max_pending,
        "Starting echo-reactor server"
    );

    let shutdown = Shutdown::new();
    let signal_handle = signals::install(shutdown.clone())?;

    let result = runtime::run(&config, shutdown);
    signal_handle.close();

    if let Err(e) = result {
        error!(error = %e, "Server exited with error");
        return Err(e.into());
    }
    Ok(())
}
