//! Readiness multiplexer over raw descriptors.
//!
//! Wraps one `mio::Poll` (epoll on Linux, kqueue on macOS). Registrations are
//! keyed by descriptor: the descriptor value doubles as the `mio::Token`, so
//! `wait` hands back `(fd, readiness)` pairs the caller can look up directly.
//!
//! Notification is edge-triggered. After a descriptor is reported ready it is
//! not reported again until its readiness changes or its interest is re-armed
//! with `modify`, so callers must drain reads until they would block.
//!
//! Error and hangup conditions are always reported and need no interest bit.

use crate::error::{Error, Result};
use mio::unix::SourceFd;
use mio::{Events, Poll, Token, Waker};
use std::collections::HashSet;
use std::io;
use std::ops::BitOr;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Token reserved for the stop waker; never a valid descriptor.
const WAKER_TOKEN: Token = Token(usize::MAX);

/// Conditions a registration asks to be notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(u8);

impl Interest {
    pub const READABLE: Interest = Interest(0b01);
    pub const WRITABLE: Interest = Interest(0b10);

    pub fn is_readable(self) -> bool {
        self.0 & Self::READABLE.0 != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & Self::WRITABLE.0 != 0
    }

    fn to_mio(self) -> mio::Interest {
        match (self.is_readable(), self.is_writable()) {
            (true, true) => mio::Interest::READABLE | mio::Interest::WRITABLE,
            (false, true) => mio::Interest::WRITABLE,
            _ => mio::Interest::READABLE,
        }
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

/// Conditions reported for one descriptor by a single `wait`.
///
/// Several kinds may be set at once; check each independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness(u8);

impl Readiness {
    pub const READABLE: Readiness = Readiness(0b0001);
    pub const WRITABLE: Readiness = Readiness(0b0010);
    pub const ERROR: Readiness = Readiness(0b0100);
    pub const HANGUP: Readiness = Readiness(0b1000);

    pub fn empty() -> Self {
        Readiness(0)
    }

    pub fn contains(self, other: Readiness) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn is_readable(self) -> bool {
        self.contains(Self::READABLE)
    }

    pub fn is_writable(self) -> bool {
        self.contains(Self::WRITABLE)
    }

    pub fn is_error(self) -> bool {
        self.contains(Self::ERROR)
    }

    pub fn is_hangup(self) -> bool {
        self.contains(Self::HANGUP)
    }

    fn from_event(event: &mio::event::Event) -> Self {
        let mut readiness = Readiness::empty();
        if event.is_readable() {
            readiness = readiness | Self::READABLE;
        }
        if event.is_writable() {
            readiness = readiness | Self::WRITABLE;
        }
        if event.is_error() {
            readiness = readiness | Self::ERROR;
        }
        // Both directions closed is a full hangup; a half-close shows up as
        // readable with a zero-length read instead.
        if event.is_read_closed() && event.is_write_closed() {
            readiness = readiness | Self::HANGUP;
        }
        readiness
    }
}

impl BitOr for Readiness {
    type Output = Readiness;

    fn bitor(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 | rhs.0)
    }
}

/// Owner of one kernel event-notification instance.
pub struct Multiplexer {
    poll: Option<Poll>,
    events: Events,
    registered: HashSet<RawFd>,
}

impl Multiplexer {
    /// Create the notification instance. `max_events` bounds the pairs returned per `wait`.
    pub fn new(max_events: usize) -> Result<Self> {
        let poll = Poll::new().map_err(|e| Error::resource("poll create", e))?;
        Ok(Self {
            poll: Some(poll),
            events: Events::with_capacity(max_events.max(1)),
            registered: HashSet::new(),
        })
    }

    /// Register `fd` with the given interest.
    pub fn add(&mut self, fd: RawFd, interest: Interest) -> Result<()> {
        let poll = self.poll.as_ref().ok_or(Error::Closed { what: "multiplexer" })?;
        check_fd(fd, "poll add")?;
        if self.registered.contains(&fd) {
            return Err(Error::resource(
                "poll add",
                io::Error::new(io::ErrorKind::AlreadyExists, "descriptor already registered"),
            ));
        }

        poll.registry()
            .register(&mut SourceFd(&fd), fd_token(fd), interest.to_mio())
            .map_err(|e| Error::resource("poll add", e))?;
        self.registered.insert(fd);
        trace!(fd, ?interest, "Registered descriptor");
        Ok(())
    }

    /// Replace the interest of an already registered `fd`. Also re-arms it.
    pub fn modify(&mut self, fd: RawFd, interest: Interest) -> Result<()> {
        let poll = self.poll.as_ref().ok_or(Error::Closed { what: "multiplexer" })?;
        check_fd(fd, "poll modify")?;
        if !self.registered.contains(&fd) {
            return Err(not_registered("poll modify"));
        }

        poll.registry()
            .reregister(&mut SourceFd(&fd), fd_token(fd), interest.to_mio())
            .map_err(|e| Error::resource("poll modify", e))
    }

    /// Drop the registration for `fd`.
    ///
    /// Removing a descriptor that is not registered returns an error the
    /// caller may log and ignore.
    pub fn remove(&mut self, fd: RawFd) -> Result<()> {
        let poll = self.poll.as_ref().ok_or(Error::Closed { what: "multiplexer" })?;
        check_fd(fd, "poll remove")?;
        if !self.registered.remove(&fd) {
            return Err(not_registered("poll remove"));
        }

        poll.registry()
            .deregister(&mut SourceFd(&fd))
            .map_err(|e| Error::resource("poll remove", e))?;
        trace!(fd, "Deregistered descriptor");
        Ok(())
    }

    /// Block until a registered descriptor is ready or `timeout` elapses
    /// (`None` waits indefinitely).
    ///
    /// A wait interrupted by a signal, or woken by the stop waker, returns an
    /// empty list. Order across descriptors is unspecified.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<Vec<(RawFd, Readiness)>> {
        let poll = self.poll.as_mut().ok_or(Error::Closed { what: "multiplexer" })?;

        match poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(Error::resource("poll wait", e)),
        }

        let ready = self
            .events
            .iter()
            .filter(|event| event.token() != WAKER_TOKEN)
            .map(|event| (event.token().0 as RawFd, Readiness::from_event(event)))
            .collect();
        Ok(ready)
    }

    /// Create a waker that interrupts a blocked `wait` from any thread.
    pub fn waker(&self) -> Result<Arc<Waker>> {
        let poll = self.poll.as_ref().ok_or(Error::Closed { what: "multiplexer" })?;
        let waker =
            Waker::new(poll.registry(), WAKER_TOKEN).map_err(|e| Error::resource("waker", e))?;
        Ok(Arc::new(waker))
    }

    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.registered.contains(&fd)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    pub fn is_closed(&self) -> bool {
        self.poll.is_none()
    }

    /// Release the notification instance. Idempotent.
    pub fn close(&mut self) {
        self.poll = None;
        self.registered.clear();
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("closed", &self.is_closed())
            .field("registered", &self.registered.len())
            .finish()
    }
}

fn fd_token(fd: RawFd) -> Token {
    Token(fd as usize)
}

fn check_fd(fd: RawFd, op: &'static str) -> Result<()> {
    if fd < 0 {
        return Err(Error::resource(
            op,
            io::Error::new(io::ErrorKind::InvalidInput, "invalid descriptor"),
        ));
    }
    Ok(())
}

fn not_registered(op: &'static str) -> Error {
    Error::resource(
        op,
        io::Error::new(io::ErrorKind::NotFound, "descriptor not registered"),
    )
}
