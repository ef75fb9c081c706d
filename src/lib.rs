//! echo-reactor: a TCP echo service on a single-threaded reactor.
//!
//! Every byte a client sends is written back to that client, in order.
//! The interesting part is the runtime underneath: edge-triggered readiness,
//! descriptor ownership, and teardown that keeps going when a step fails.

pub mod config;
pub mod error;
pub mod runtime;
pub mod signals;

pub use error::{Error, Result};
