//! Error types for the reactor core.
//!
//! Two failure classes matter to the event loop:
//! - `Resource`: creating, binding, listening on, or registering a descriptor failed.
//!   Fatal during startup, scoped to a single connection afterwards.
//! - `Io`: a send or receive failed for a reason other than "would block".
//!   Tears down the affected connection only.
//!
//! "Would block" is never an error here. Socket operations report it through
//! their outcome enums so callers can stop draining and go back to waiting.

use std::io;
use thiserror::Error;

/// Errors raised by the socket handle, multiplexer and event loop.
#[derive(Error, Debug)]
pub enum Error {
    /// OS-level failure to create, configure, bind, listen on or register a descriptor.
    #[error("{op} failed: {source}")]
    Resource {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// Failure while transferring bytes on an established connection.
    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// The handle or multiplexer no longer owns a descriptor.
    #[error("{what} is closed")]
    Closed { what: &'static str },

    /// Text that does not parse as an IPv4 address.
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),
}

impl Error {
    pub(crate) fn resource(op: &'static str, source: io::Error) -> Self {
        Error::Resource { op, source }
    }

    pub(crate) fn io(op: &'static str, source: io::Error) -> Self {
        Error::Io { op, source }
    }
}

/// Result type alias for reactor operations.
pub type Result<T> = std::result::Result<T, Error>;
