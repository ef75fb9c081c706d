//! Single-threaded reactor driving the echo service.
//!
//! Readiness-based model: the multiplexer tells us which descriptors are
//! ready, then we perform non-blocking accept/read/write calls until they
//! would block. Registrations are edge-triggered, so every readable event is
//! drained completely before the loop waits again.
//!
//! ## Lifecycle
//!
//! `Created` -> `Listening` (`start`) -> `Running` (`run`) -> `Stopped`.
//! A stop request from the `Shutdown` token is observed at the next wait
//! boundary; the waker guarantees that boundary comes within one cycle.
//!
//! ## Echo and backpressure
//!
//! Received bytes are sent straight back. Whatever the kernel does not accept
//! is queued on the connection and write interest is armed; a writable event
//! flushes the queue. New data always goes behind queued data. Once a queue
//! reaches `max_pending` bytes, reading from that peer pauses until the queue
//! drains.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::runtime::connection::{ConnState, Connection, ConnectionTable};
use crate::runtime::poller::{Interest, Multiplexer, Readiness};
use crate::runtime::shutdown::Shutdown;
use crate::runtime::socket::{RecvOutcome, SendOutcome, SocketHandle};
use bytes::Buf;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// Lifecycle of an `EventLoop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Created,
    Listening,
    Running,
    Stopped,
}

/// How draining a readable connection ended.
#[derive(Debug)]
enum Drain {
    /// Read until the socket would block.
    Exhausted,
    /// Stopped reading because the echo queue is full.
    Paused,
    /// Peer closed; teardown may wait for queued bytes.
    PeerClosed,
    Failed(Error),
}

/// How flushing the echo queue ended.
#[derive(Debug)]
enum Flush {
    /// Queue is empty.
    Done,
    /// Kernel buffer is full; more remains queued.
    Blocked,
    Failed(Error),
}

/// Reactor owning the listener, the multiplexer and every client connection.
#[derive(Debug)]
pub struct EventLoop {
    listener: SocketHandle,
    mux: Multiplexer,
    connections: ConnectionTable,
    shutdown: Shutdown,
    state: LoopState,
    port: u16,
    backlog: i32,
    max_pending: usize,
    read_buf: Vec<u8>,
}

impl EventLoop {
    /// Create the multiplexer and attach its waker to `shutdown`.
    pub fn new(config: &Config, shutdown: Shutdown) -> Result<Self> {
        let mux = Multiplexer::new(config.max_events)?;
        shutdown.attach(mux.waker()?);

        Ok(Self {
            listener: SocketHandle::new(),
            mux,
            connections: ConnectionTable::new(),
            shutdown,
            state: LoopState::Created,
            port: config.port,
            backlog: config.backlog,
            max_pending: config.max_pending.max(1),
            read_buf: vec![0u8; config.buffer_size.max(1)],
        })
    }

    /// Create, bind and register the listening socket.
    ///
    /// On failure every resource is released and the loop is `Stopped`.
    pub fn start(&mut self) -> Result<()> {
        if self.state != LoopState::Created {
            return Err(Error::resource(
                "start",
                io::Error::new(io::ErrorKind::Other, "event loop already started"),
            ));
        }

        if let Err(e) = self.open_listener() {
            error!(port = self.port, error = %e, "Failed to start server");
            self.shutdown();
            return Err(e);
        }

        self.state = LoopState::Listening;
        info!(
            port = self.local_port().unwrap_or(self.port),
            backlog = self.backlog,
            "Server started"
        );
        Ok(())
    }

    fn open_listener(&mut self) -> Result<()> {
        self.listener.create()?;
        self.listener.set_non_blocking(true)?;
        self.listener.bind(self.port)?;
        self.listener.listen(self.backlog)?;
        self.mux.add(self.listener.fd(), Interest::READABLE)
    }

    /// Serve until a stop is requested, then tear everything down.
    pub fn run(&mut self) -> Result<()> {
        if self.state != LoopState::Listening {
            return Err(Error::resource(
                "run",
                io::Error::new(io::ErrorKind::Other, "event loop is not listening"),
            ));
        }

        self.state = LoopState::Running;
        info!("Server running");

        let mut result = Ok(());
        while !self.shutdown.is_stop_requested() {
            if let Err(e) = self.poll_once(None) {
                error!(error = %e, "Event loop failed");
                result = Err(e);
                break;
            }
        }

        self.shutdown();
        result
    }

    /// Wait once and dispatch every reported event. Returns the event count.
    pub fn poll_once(&mut self, timeout: Option<Duration>) -> Result<usize> {
        let events = self.mux.wait(timeout)?;
        let count = events.len();
        for (fd, readiness) in events {
            self.dispatch(fd, readiness);
        }
        Ok(count)
    }

    fn dispatch(&mut self, fd: RawFd, readiness: Readiness) {
        if fd == self.listener.fd() {
            self.accept_connections();
            return;
        }

        if readiness.is_readable() {
            self.handle_readable(fd);
        }
        if readiness.is_writable() {
            self.handle_writable(fd);
        }
        if readiness.is_error() {
            self.handle_error(fd);
        }
        if readiness.is_hangup() {
            self.close_connection(fd, "hangup");
        }
    }

    fn accept_connections(&mut self) {
        loop {
            let mut socket = match self.listener.accept() {
                Ok(Some(socket)) => socket,
                Ok(None) => break,
                Err(Error::Resource { ref source, .. }) if is_transient_accept_error(source) => {
                    debug!(error = %source, "Skipping failed connection candidate");
                    continue;
                }
                Err(e) => {
                    // Out of descriptors or memory; retrying now would spin.
                    error!(error = %e, "Accept failed");
                    break;
                }
            };

            let fd = socket.fd();
            if let Err(e) = socket.set_non_blocking(true) {
                error!(fd, error = %e, "Failed to set accepted socket non-blocking");
                socket.close();
                continue;
            }
            if let Err(e) = self.mux.add(fd, Interest::READABLE) {
                error!(fd, error = %e, "Failed to register accepted socket");
                socket.close();
                continue;
            }

            let conn = Connection::new(socket);
            let peer = conn.peer_display();
            if let Err(mut dup) = self.connections.insert(conn) {
                // The kernel never hands out a descriptor that is still open.
                error!(fd, "Descriptor already in connection table");
                dup.close();
                continue;
            }
            info!(fd, peer = %peer, "New connection accepted");
        }
    }

    fn handle_readable(&mut self, fd: RawFd) {
        let Some(conn) = self.connections.get_mut(fd) else {
            return;
        };
        if conn.state == ConnState::Closing {
            return;
        }

        match drain_readable(conn, &mut self.read_buf, self.max_pending) {
            Drain::Exhausted => {}
            Drain::Paused => {
                conn.pause_reads();
                debug!(fd, queued = conn.outbound.len(), "Echo queue full, pausing reads");
            }
            Drain::PeerClosed => {
                if conn.has_pending() {
                    debug!(fd, queued = conn.outbound.len(), "Peer closed, flushing queued echo");
                    conn.peer_closed();
                } else {
                    self.close_connection(fd, "peer closed");
                    return;
                }
            }
            Drain::Failed(e) => {
                error!(fd, error = %e, "Connection I/O failed");
                self.close_connection(fd, "io error");
                return;
            }
        }

        self.sync_interest(fd);
    }

    fn handle_writable(&mut self, fd: RawFd) {
        let Some(conn) = self.connections.get_mut(fd) else {
            return;
        };
        if !conn.has_pending() {
            return;
        }

        match flush_outbound(conn) {
            Flush::Blocked => return,
            Flush::Failed(e) => {
                error!(fd, error = %e, "Failed to send echo");
                self.close_connection(fd, "io error");
                return;
            }
            Flush::Done => {}
        }

        if conn.state == ConnState::Closing {
            self.close_connection(fd, "peer closed");
            return;
        }
        conn.flushed();
        let resume = conn.resume_reads();
        trace!(fd, resume, "Echo queue flushed");

        if !self.sync_interest(fd) {
            return;
        }
        // Edge-triggered: data that arrived while paused will not be reported again.
        if resume {
            self.handle_readable(fd);
        }
    }

    fn handle_error(&mut self, fd: RawFd) {
        if self.connections.contains(fd) {
            error!(fd, "Connection error");
            self.close_connection(fd, "socket error");
        }
    }

    /// Bring the registered interest in line with the connection's queue.
    ///
    /// Returns false if the connection was torn down.
    fn sync_interest(&mut self, fd: RawFd) -> bool {
        let Some(conn) = self.connections.get_mut(fd) else {
            return false;
        };
        let desired = conn.desired_interest();
        if desired == conn.interest {
            return true;
        }

        match self.mux.modify(fd, desired) {
            Ok(()) => {
                conn.interest = desired;
                true
            }
            Err(e) => {
                error!(fd, error = %e, "Failed to update interest");
                self.close_connection(fd, "registration error");
                false
            }
        }
    }

    /// Unregister and drop a connection. A no-op for unknown descriptors.
    fn close_connection(&mut self, fd: RawFd, reason: &'static str) {
        if !self.connections.contains(fd) {
            return;
        }
        if let Err(e) = self.mux.remove(fd) {
            debug!(fd, error = %e, "Deregister failed");
        }
        if let Some(mut conn) = self.connections.remove(fd) {
            info!(fd, peer = %conn.peer_display(), reason, "Client disconnected");
            conn.close();
        }
    }

    /// Request a stop through the shared token.
    pub fn stop(&self) {
        self.shutdown.request_stop();
    }

    /// Close every client, the listener and the multiplexer. Idempotent.
    ///
    /// Each step runs even if an earlier one reported a problem.
    pub fn shutdown(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }

        let closed = self.connections.close_all();
        if self.listener.is_valid() {
            if let Err(e) = self.mux.remove(self.listener.fd()) {
                debug!(error = %e, "Listener deregister failed");
            }
        }
        self.listener.close();
        self.mux.close();

        let was_serving = self.state != LoopState::Created;
        self.state = LoopState::Stopped;
        if was_serving {
            info!(closed_connections = closed, "Server stopped");
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Port the listener is bound to, once listening.
    pub fn local_port(&self) -> Option<u16> {
        self.listener.local_port()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// True if `fd` is a live client connection.
    pub fn contains(&self, fd: RawFd) -> bool {
        self.connections.contains(fd)
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    pub fn multiplexer(&self) -> &Multiplexer {
        &self.mux
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Read and echo until the socket would block, the peer closes, the queue
/// fills up, or something fails.
fn drain_readable(conn: &mut Connection, buf: &mut [u8], max_pending: usize) -> Drain {
    loop {
        if conn.outbound.len() >= max_pending {
            return Drain::Paused;
        }

        match conn.socket().receive(buf) {
            Ok(RecvOutcome::Data(n)) => {
                trace!(fd = conn.fd(), bytes = n, "Received");
                if let Err(e) = echo(conn, &buf[..n]) {
                    return Drain::Failed(e);
                }
            }
            Ok(RecvOutcome::WouldBlock) => return Drain::Exhausted,
            Ok(RecvOutcome::Closed) => return Drain::PeerClosed,
            Err(e) => return Drain::Failed(e),
        }
    }
}

/// Accept failures that concern only the candidate being accepted.
///
/// Anything else (`EMFILE`, `ENFILE`, `ENOBUFS`, `ENOMEM`, a broken listener)
/// ends the accept round.
fn is_transient_accept_error(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::ConnectionAborted {
        return true;
    }
    matches!(
        err.raw_os_error(),
        Some(
            libc::ECONNABORTED
                | libc::EPROTO
                | libc::ENETDOWN
                | libc::ENETUNREACH
                | libc::EHOSTDOWN
                | libc::EHOSTUNREACH
                | libc::ENOPROTOOPT
                | libc::EOPNOTSUPP
                | libc::EPERM
        )
    )
}

/// Send `data` back, queueing whatever the kernel does not take.
fn echo(conn: &mut Connection, data: &[u8]) -> Result<()> {
    if conn.has_pending() {
        conn.queue(data);
        return Ok(());
    }

    match conn.socket().send(data)? {
        SendOutcome::Sent(n) if n == data.len() => {}
        SendOutcome::Sent(n) => {
            trace!(fd = conn.fd(), sent = n, queued = data.len() - n, "Partial echo");
            conn.queue(&data[n..]);
        }
        SendOutcome::WouldBlock => conn.queue(data),
    }
    Ok(())
}

/// Push queued echo bytes until the queue empties or the kernel pushes back.
fn flush_outbound(conn: &mut Connection) -> Flush {
    while conn.has_pending() {
        match conn.socket().send(&conn.outbound) {
            Ok(SendOutcome::Sent(0)) => {
                return Flush::Failed(Error::io(
                    "send",
                    io::Error::new(io::ErrorKind::WriteZero, "send returned 0"),
                ))
            }
            Ok(SendOutcome::Sent(n)) => conn.outbound.advance(n),
            Ok(SendOutcome::WouldBlock) => return Flush::Blocked,
            Err(e) => return Flush::Failed(e),
        }
    }
    Flush::Done
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{Shutdown as NetShutdown, TcpStream};
    use std::time::Instant;

    const TICK: Option<Duration> = Some(Duration::from_millis(20));

    fn test_config() -> Config {
        Config {
            port: 0,
            backlog: 16,
            buffer_size: 64,
            max_events: 64,
            max_pending: 1024 * 1024,
            log_level: "debug".to_string(),
        }
    }

    fn started(config: &Config) -> EventLoop {
        let mut ev = EventLoop::new(config, Shutdown::new()).unwrap();
        ev.start().unwrap();
        assert_eq!(ev.state(), LoopState::Listening);
        ev
    }

    fn connect(ev: &EventLoop) -> TcpStream {
        let stream = TcpStream::connect(("127.0.0.1", ev.local_port().unwrap())).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        stream
    }

    /// Turn the loop until `done` holds, panicking after a few seconds.
    fn pump_until(ev: &mut EventLoop, mut done: impl FnMut(&EventLoop) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done(&*ev) {
            assert!(Instant::now() < deadline, "condition not reached in time");
            ev.poll_once(TICK).unwrap();
        }
    }

    /// Read exactly `len` bytes from `stream`, turning the loop in between.
    fn read_echo(ev: &mut EventLoop, stream: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        let deadline = Instant::now() + Duration::from_secs(5);
        while out.len() < len {
            assert!(Instant::now() < deadline, "echo not received in time");
            ev.poll_once(TICK).unwrap();
            match stream.read(&mut buf) {
                Ok(0) => panic!("server closed the connection"),
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => panic!("read failed: {e}"),
            }
        }
        out
    }

    #[test]
    fn test_run_requires_listening() {
        let mut ev = EventLoop::new(&test_config(), Shutdown::new()).unwrap();
        assert_eq!(ev.state(), LoopState::Created);
        assert!(ev.run().is_err());
    }

    #[test]
    fn test_start_failure_stops_loop() {
        let first = started(&test_config());
        let mut config = test_config();
        config.port = first.local_port().unwrap();

        // SO_REUSEADDR does not allow two listeners on the same port.
        let mut second = EventLoop::new(&config, Shutdown::new()).unwrap();
        assert!(second.start().is_err());
        assert_eq!(second.state(), LoopState::Stopped);
        assert!(second.multiplexer().is_closed());
    }

    #[test]
    fn test_ping_echo_and_disconnect() {
        let mut ev = started(&test_config());
        let mut client = connect(&ev);

        pump_until(&mut ev, |ev| ev.connection_count() == 1);
        let (fd, conn) = ev.connections().iter().next().unwrap();
        assert_eq!(conn.peer().map(|p| p.port()), Some(client.local_addr().unwrap().port()));
        assert!(ev.multiplexer().is_registered(fd));

        client.write_all(b"ping").unwrap();
        assert_eq!(read_echo(&mut ev, &mut client, 4), b"ping");

        drop(client);
        pump_until(&mut ev, |ev| !ev.contains(fd));
        assert!(!ev.multiplexer().is_registered(fd));
        // Only the listener remains registered.
        assert_eq!(ev.multiplexer().registered_count(), 1);
    }

    #[test]
    fn test_accept_burst() {
        let mut ev = started(&test_config());
        let clients: Vec<TcpStream> = (0..8).map(|_| connect(&ev)).collect();

        pump_until(&mut ev, |ev| ev.connection_count() == clients.len());
        assert_eq!(ev.multiplexer().registered_count(), clients.len() + 1);
        for (fd, _) in ev.connections().iter() {
            assert!(ev.multiplexer().is_registered(fd));
        }
    }

    #[test]
    fn test_back_to_back_writes_echoed_after_one_wakeup() {
        // Buffer smaller than the payload forces several reads per event.
        let mut config = test_config();
        config.buffer_size = 3;
        let mut ev = started(&config);
        let mut client = connect(&ev);
        pump_until(&mut ev, |ev| ev.connection_count() == 1);

        client.write_all(b"first-").unwrap();
        client.write_all(b"second").unwrap();
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(ev.poll_once(Some(Duration::from_secs(1))).unwrap(), 1);

        client
            .set_read_timeout(Some(Duration::from_secs(1)))
            .unwrap();
        let mut echoed = [0u8; 12];
        client.read_exact(&mut echoed).unwrap();
        assert_eq!(&echoed, b"first-second");
    }

    #[test]
    fn test_no_cross_delivery() {
        let mut ev = started(&test_config());
        let mut a = connect(&ev);
        let mut b = connect(&ev);
        pump_until(&mut ev, |ev| ev.connection_count() == 2);

        a.write_all(b"hello").unwrap();
        b.write_all(b"world").unwrap();

        assert_eq!(read_echo(&mut ev, &mut a, 5), b"hello");
        assert_eq!(read_echo(&mut ev, &mut b, 5), b"world");
    }

    #[test]
    fn test_large_payload_survives_backpressure() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let mut config = test_config();
        config.buffer_size = 4096;
        config.max_pending = 16 * 1024;
        let mut ev = started(&config);

        let client = TcpStream::connect(("127.0.0.1", ev.local_port().unwrap())).unwrap();
        pump_until(&mut ev, |ev| ev.connection_count() == 1);

        let payload: Vec<u8> = (0..1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        let len = payload.len();

        let mut writer = client.try_clone().unwrap();
        let sender = std::thread::spawn(move || writer.write_all(&payload).map(|()| payload));

        let done = Arc::new(AtomicBool::new(false));
        let reader_done = Arc::clone(&done);
        let mut reader = client;
        let receiver = std::thread::spawn(move || {
            // Let the server's queue fill before the client starts reading.
            std::thread::sleep(Duration::from_millis(200));
            let mut echoed = vec![0u8; len];
            let result = reader.read_exact(&mut echoed).map(|()| echoed);
            reader_done.store(true, Ordering::SeqCst);
            result
        });

        pump_until(&mut ev, |_| done.load(Ordering::SeqCst));
        let payload = sender.join().unwrap().unwrap();
        let echoed = receiver.join().unwrap().unwrap();
        assert!(echoed == payload, "echoed bytes differ from sent bytes");
    }

    #[test]
    fn test_paused_reads_resume_after_flush() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let mut config = test_config();
        config.buffer_size = 4096;
        config.max_pending = 8 * 1024;
        let mut ev = started(&config);

        let client = TcpStream::connect(("127.0.0.1", ev.local_port().unwrap())).unwrap();
        pump_until(&mut ev, |ev| ev.connection_count() == 1);
        let (fd, _) = ev.connections().iter().next().unwrap();

        let payload: Vec<u8> = (0..16 * 1024 * 1024u32).map(|i| (i % 253) as u8).collect();
        let len = payload.len();
        let mut writer = client.try_clone().unwrap();
        let sender = std::thread::spawn(move || writer.write_all(&payload).map(|()| payload));

        // Nobody reads yet, so the echo queue fills and reading pauses.
        pump_until(&mut ev, |ev| ev.connections().get(fd).map_or(false, |c| c.is_paused()));

        let done = Arc::new(AtomicBool::new(false));
        let reader_done = Arc::clone(&done);
        let mut reader = client;
        let receiver = std::thread::spawn(move || {
            let mut echoed = vec![0u8; len];
            let result = reader.read_exact(&mut echoed).map(|()| echoed);
            reader_done.store(true, Ordering::SeqCst);
            result
        });

        pump_until(&mut ev, |_| done.load(Ordering::SeqCst));
        let payload = sender.join().unwrap().unwrap();
        let echoed = receiver.join().unwrap().unwrap();
        assert!(echoed == payload, "echoed bytes differ from sent bytes");

        let conn = ev.connections().get(fd).unwrap();
        assert!(!conn.is_paused());
        assert!(!conn.has_pending());
    }

    #[test]
    fn test_abrupt_close_removes_connection() {
        let mut ev = started(&test_config());
        let mut client = connect(&ev);
        pump_until(&mut ev, |ev| ev.connection_count() == 1);
        let (fd, _) = ev.connections().iter().next().unwrap();

        client.write_all(b"ping").unwrap();
        assert_eq!(read_echo(&mut ev, &mut client, 4), b"ping");

        // Zero linger turns close into a reset.
        socket2::SockRef::from(&client)
            .set_linger(Some(Duration::ZERO))
            .unwrap();
        drop(client);

        pump_until(&mut ev, |ev| !ev.contains(fd));
        assert!(!ev.multiplexer().is_registered(fd));
        assert_eq!(ev.multiplexer().registered_count(), 1);
    }

    #[test]
    fn test_accept_error_classification() {
        let transient = [libc::ECONNABORTED, libc::EPROTO, libc::ENETDOWN, libc::EHOSTUNREACH];
        for code in transient {
            assert!(is_transient_accept_error(&io::Error::from_raw_os_error(code)));
        }

        let exhausted = [libc::EMFILE, libc::ENFILE, libc::ENOBUFS, libc::ENOMEM, libc::EBADF];
        for code in exhausted {
            assert!(!is_transient_accept_error(&io::Error::from_raw_os_error(code)));
        }
    }

    #[test]
    fn test_half_close_echoes_then_closes() {
        let mut ev = started(&test_config());
        let mut client = connect(&ev);
        pump_until(&mut ev, |ev| ev.connection_count() == 1);
        let (fd, _) = ev.connections().iter().next().unwrap();

        client.write_all(b"bye").unwrap();
        client.shutdown(NetShutdown::Write).unwrap();

        assert_eq!(read_echo(&mut ev, &mut client, 3), b"bye");
        pump_until(&mut ev, |ev| !ev.contains(fd));
    }

    #[test]
    fn test_stop_closes_clients() {
        let shutdown = Shutdown::new();
        let mut ev = EventLoop::new(&test_config(), shutdown.clone()).unwrap();
        ev.start().unwrap();
        let port = ev.local_port().unwrap();

        let server = std::thread::spawn(move || {
            ev.run().unwrap();
            ev
        });

        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        client.write_all(b"x").unwrap();
        let mut buf = [0u8; 1];
        client.read_exact(&mut buf).unwrap();

        let requested = Instant::now();
        shutdown.request_stop();
        let ev = server.join().unwrap();
        assert!(requested.elapsed() < Duration::from_secs(5));
        assert_eq!(ev.state(), LoopState::Stopped);
        assert_eq!(ev.connection_count(), 0);
        assert!(ev.multiplexer().is_closed());

        // The server side of the connection is gone.
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let n = client.read(&mut buf).unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut ev = started(&test_config());
        ev.shutdown();
        ev.shutdown();
        assert_eq!(ev.state(), LoopState::Stopped);
        assert!(ev.local_port().is_none());
    }
}
