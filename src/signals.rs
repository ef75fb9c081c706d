//! Process signal wiring.
//!
//! SIGINT and SIGTERM request a graceful stop through the `Shutdown` token.
//! SIGPIPE is ignored so a write to a reset peer fails with `EPIPE` instead of
//! killing the process.

use crate::runtime::Shutdown;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use std::io;
use std::thread;
use tracing::info;

/// Install the handlers. The returned handle stops the signal thread when closed.
pub fn install(shutdown: Shutdown) -> io::Result<Handle> {
    ignore_sigpipe()?;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                info!(signal, "Received stop signal");
                shutdown.request_stop();
            }
        })?;

    Ok(handle)
}

fn ignore_sigpipe() -> io::Result<()> {
    // SAFETY: installing SIG_IGN has no handler code to run and touches no Rust state.
    let previous = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };
    if previous == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
