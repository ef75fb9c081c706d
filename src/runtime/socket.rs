//! Owning handle for one IPv4 stream socket.
//!
//! `SocketHandle` holds at most one OS descriptor and releases it on `close`
//! or drop, whichever comes first. The type is not `Clone`: moving a handle
//! moves the descriptor, and `take` moves it out of a `&mut` place while
//! leaving an invalid handle behind.
//!
//! Non-blocking operations never report "would block" as an error. `accept`
//! returns `None`, while `send` and `receive` return their `WouldBlock` outcome.

use crate::error::{Error, Result};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::unix::io::{AsRawFd, RawFd};

/// Descriptor value reported by an invalid handle.
pub const INVALID_FD: RawFd = -1;

/// Result of a single `receive` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// `n` bytes were read into the front of the buffer.
    Data(usize),
    /// The peer performed an orderly shutdown.
    Closed,
    /// Nothing to read right now (non-blocking mode only).
    WouldBlock,
}

/// Result of a single `send` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The OS accepted `n` bytes, possibly fewer than offered.
    Sent(usize),
    /// The send buffer is full (non-blocking mode only).
    WouldBlock,
}

/// Move-only owner of a TCP socket descriptor.
#[derive(Debug, Default)]
pub struct SocketHandle {
    socket: Option<Socket>,
    non_blocking: bool,
}

impl SocketHandle {
    /// An invalid handle owning no descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an IPv4 stream socket with `SO_REUSEADDR` enabled.
    ///
    /// On failure the handle stays invalid.
    pub fn create(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Err(Error::resource(
                "socket",
                io::Error::new(io::ErrorKind::AlreadyExists, "handle already owns a socket"),
            ));
        }

        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| Error::resource("socket", e))?;
        // Dropping `socket` on the error path closes the new descriptor.
        socket
            .set_reuse_address(true)
            .map_err(|e| Error::resource("setsockopt(SO_REUSEADDR)", e))?;

        self.socket = Some(socket);
        self.non_blocking = false;
        Ok(())
    }

    /// Bind to the IPv4 wildcard address on `port`. Port 0 picks an ephemeral port.
    pub fn bind(&self, port: u16) -> Result<()> {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        self.inner()?
            .bind(&SockAddr::from(addr))
            .map_err(|e| Error::resource("bind", e))
    }

    /// Mark the socket passive with a pending-connection queue of `backlog`.
    pub fn listen(&self, backlog: i32) -> Result<()> {
        self.inner()?
            .listen(backlog)
            .map_err(|e| Error::resource("listen", e))
    }

    /// Accept one pending connection.
    ///
    /// Returns `Ok(None)` when the socket is non-blocking and no connection is
    /// queued. The accepted handle starts in blocking mode.
    pub fn accept(&self) -> Result<Option<SocketHandle>> {
        let socket = self.inner()?;
        loop {
            match socket.accept() {
                Ok((peer, _addr)) => {
                    return Ok(Some(SocketHandle {
                        socket: Some(peer),
                        non_blocking: false,
                    }))
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if self.non_blocking && e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(None)
                }
                Err(e) => return Err(Error::resource("accept", e)),
            }
        }
    }

    /// Connect to `ip:port`, where `ip` is dotted-quad IPv4 text.
    pub fn connect(&self, ip: &str, port: u16) -> Result<()> {
        let ip: Ipv4Addr = ip
            .parse()
            .map_err(|_| Error::InvalidAddress(ip.to_string()))?;
        let addr = SocketAddr::V4(SocketAddrV4::new(ip, port));
        self.inner()?
            .connect(&SockAddr::from(addr))
            .map_err(|e| Error::resource("connect", e))
    }

    /// Write as much of `data` as the OS accepts in one call.
    pub fn send(&self, data: &[u8]) -> Result<SendOutcome> {
        let socket = self.inner()?;
        loop {
            match send_no_sigpipe(socket, data) {
                Ok(n) => return Ok(SendOutcome::Sent(n)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if self.non_blocking && e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(SendOutcome::WouldBlock)
                }
                Err(e) => return Err(Error::io("send", e)),
            }
        }
    }

    /// Read up to `buf.len()` bytes.
    ///
    /// An empty `buf` yields `Data(0)` without touching the socket.
    pub fn receive(&self, buf: &mut [u8]) -> Result<RecvOutcome> {
        let mut socket = self.inner()?;
        if buf.is_empty() {
            return Ok(RecvOutcome::Data(0));
        }
        loop {
            match socket.read(buf) {
                Ok(0) => return Ok(RecvOutcome::Closed),
                Ok(n) => return Ok(RecvOutcome::Data(n)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if self.non_blocking && e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(RecvOutcome::WouldBlock)
                }
                Err(e) => return Err(Error::io("recv", e)),
            }
        }
    }

    /// Toggle `O_NONBLOCK` on the descriptor.
    pub fn set_non_blocking(&mut self, non_blocking: bool) -> Result<()> {
        self.inner()?
            .set_nonblocking(non_blocking)
            .map_err(|e| Error::resource("fcntl(O_NONBLOCK)", e))?;
        self.non_blocking = non_blocking;
        Ok(())
    }

    /// Release the descriptor. Calling this on an invalid handle is a no-op.
    pub fn close(&mut self) {
        // Dropping the socket closes the descriptor.
        self.socket = None;
        self.non_blocking = false;
    }

    /// Move the descriptor out, leaving this handle invalid.
    pub fn take(&mut self) -> SocketHandle {
        std::mem::take(self)
    }

    pub fn is_valid(&self) -> bool {
        self.socket.is_some()
    }

    pub fn is_non_blocking(&self) -> bool {
        self.non_blocking
    }

    /// The owned descriptor, or `INVALID_FD`.
    pub fn fd(&self) -> RawFd {
        self.socket.as_ref().map_or(INVALID_FD, AsRawFd::as_raw_fd)
    }

    /// Peer IPv4 address, if connected and queryable.
    pub fn peer_address(&self) -> Option<Ipv4Addr> {
        self.peer().map(|addr| *addr.ip())
    }

    /// Peer port, if connected and queryable.
    pub fn peer_port(&self) -> Option<u16> {
        self.peer().map(|addr| addr.port())
    }

    /// Full peer identity, if connected and queryable.
    pub fn peer(&self) -> Option<SocketAddrV4> {
        let addr = self.socket.as_ref()?.peer_addr().ok()?;
        addr.as_socket_ipv4()
    }

    /// Locally bound port, if any.
    pub fn local_port(&self) -> Option<u16> {
        let addr = self.socket.as_ref()?.local_addr().ok()?;
        addr.as_socket_ipv4().map(|a| a.port())
    }

    fn inner(&self) -> Result<&Socket> {
        self.socket.as_ref().ok_or(Error::Closed { what: "socket" })
    }
}

impl AsRawFd for SocketHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.fd()
    }
}

/// Writing to a reset peer must surface as `EPIPE`, not terminate the process.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn send_no_sigpipe(socket: &Socket, data: &[u8]) -> io::Result<usize> {
    socket.send_with_flags(data, libc::MSG_NOSIGNAL)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn send_no_sigpipe(socket: &Socket, data: &[u8]) -> io::Result<usize> {
    socket.send(data)
}
