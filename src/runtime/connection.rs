//! Connection table for client sockets.
//!
//! Each entry owns its `SocketHandle`, the cached peer identity, and any echo
//! bytes the kernel has not accepted yet. Removing an entry drops the handle
//! and so closes the descriptor.

use crate::runtime::poller::Interest;
use crate::runtime::socket::SocketHandle;
use bytes::BytesMut;
use std::collections::hash_map::{self, HashMap};
use std::fmt;
use std::net::SocketAddrV4;
use std::os::unix::io::RawFd;

/// Current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Nothing queued; only read interest is armed.
    Reading,
    /// Echo bytes are queued and write interest is armed.
    Writing,
    /// The peer shut down its side; flush what is queued, then tear down.
    Closing,
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection {
    socket: SocketHandle,
    peer: Option<SocketAddrV4>,
    /// Echo bytes waiting for send buffer space, in arrival order.
    pub outbound: BytesMut,
    pub state: ConnState,
    /// Interest currently registered with the multiplexer.
    pub interest: Interest,
    /// Reading stopped with unread data possibly left in the receive buffer.
    paused: bool,
}

impl Connection {
    /// Wrap an accepted socket. The peer identity is queried once here.
    pub fn new(socket: SocketHandle) -> Self {
        let peer = socket.peer();
        Self {
            socket,
            peer,
            outbound: BytesMut::new(),
            state: ConnState::Reading,
            interest: Interest::READABLE,
            paused: false,
        }
    }

    pub fn socket(&self) -> &SocketHandle {
        &self.socket
    }

    pub fn fd(&self) -> RawFd {
        self.socket.fd()
    }

    pub fn peer(&self) -> Option<SocketAddrV4> {
        self.peer
    }

    /// Displayable peer identity, `unknown` if it could not be queried.
    pub fn peer_display(&self) -> PeerDisplay {
        PeerDisplay(self.peer)
    }

    pub fn has_pending(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Queue bytes behind anything already waiting.
    pub fn queue(&mut self, data: &[u8]) {
        self.outbound.extend_from_slice(data);
        if self.state == ConnState::Reading {
            self.state = ConnState::Writing;
        }
    }

    /// Interest the registration should carry for the current state.
    pub fn desired_interest(&self) -> Interest {
        if self.has_pending() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        }
    }

    /// Record that the peer closed its sending side.
    pub fn peer_closed(&mut self) {
        self.state = ConnState::Closing;
    }

    /// Record that the queue drained.
    pub fn flushed(&mut self) {
        if self.state == ConnState::Writing {
            self.state = ConnState::Reading;
        }
    }

    /// Record that reading stopped because the echo queue is full.
    pub fn pause_reads(&mut self) {
        self.paused = true;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Clear the paused mark, returning whether reads were paused.
    pub fn resume_reads(&mut self) -> bool {
        std::mem::replace(&mut self.paused, false)
    }

    pub fn close(&mut self) {
        self.socket.close();
    }
}

/// Formats an optional peer address as `ip:port` or `unknown`.
#[derive(Debug, Clone, Copy)]
pub struct PeerDisplay(Option<SocketAddrV4>);

impl fmt::Display for PeerDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(addr) => write!(f, "{addr}"),
            None => f.write_str("unknown"),
        }
    }
}

/// Active client connections keyed by descriptor.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: HashMap<RawFd, Connection>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection under its own descriptor.
    ///
    /// Returns the connection back if that descriptor is already present.
    pub fn insert(&mut self, conn: Connection) -> Result<RawFd, Connection> {
        let fd = conn.fd();
        match self.connections.entry(fd) {
            hash_map::Entry::Occupied(_) => Err(conn),
            hash_map::Entry::Vacant(slot) => {
                slot.insert(conn);
                Ok(fd)
            }
        }
    }

    pub fn get(&self, fd: RawFd) -> Option<&Connection> {
        self.connections.get(&fd)
    }

    pub fn get_mut(&mut self, fd: RawFd) -> Option<&mut Connection> {
        self.connections.get_mut(&fd)
    }

    /// Remove a connection, handing ownership of its socket to the caller.
    pub fn remove(&mut self, fd: RawFd) -> Option<Connection> {
        self.connections.remove(&fd)
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        self.connections.contains_key(&fd)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RawFd, &Connection)> {
        self.connections.iter().map(|(fd, conn)| (*fd, conn))
    }

    /// Close every socket and empty the table. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let count = self.connections.len();
        for (_, mut conn) in self.connections.drain() {
            conn.close();
        }
        count
    }
}
