//! Readiness-based runtime for the echo service.
//!
//! One thread, one multiplexer, many non-blocking sockets:
//! - `SocketHandle`: move-only owner of a socket descriptor
//! - `Multiplexer`: edge-triggered readiness notification (epoll/kqueue via mio)
//! - `ConnectionTable`: every live client, keyed by descriptor
//! - `EventLoop`: the accept/read/echo/teardown state machine
//!
//! Scaling out means running several independent `EventLoop`s, each with its
//! own multiplexer and table; nothing here is shared between threads except
//! the `Shutdown` token.

mod connection;
mod event_loop;
mod poller;
mod shutdown;
mod socket;

pub use connection::{ConnState, Connection, ConnectionTable, PeerDisplay};
pub use event_loop::{EventLoop, LoopState};
pub use poller::{Interest, Multiplexer, Readiness};
pub use shutdown::Shutdown;
pub use socket::{RecvOutcome, SendOutcome, SocketHandle, INVALID_FD};

use crate::config::Config;
use crate::error::Result;

/// Start listening and serve until `shutdown` is requested.
pub fn run(config: &Config, shutdown: Shutdown) -> Result<()> {
    let mut event_loop = EventLoop::new(config, shutdown)?;
    event_loop.start()?;
    event_loop.run()
}
