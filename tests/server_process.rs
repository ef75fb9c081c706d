//! End-to-end checks against the built server binary.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

struct Server {
    child: Child,
    port: u16,
}

impl Server {
    fn spawn() -> Self {
        let port = portpicker::pick_unused_port().expect("no free port");
        let server = Self::spawn_on(port);
        server.wait_ready();
        server
    }

    /// Start the binary on `port` without waiting for it to listen.
    fn spawn_on(port: u16) -> Self {
        let child = Command::new(env!("CARGO_BIN_EXE_echo-reactor"))
            .args(["--port", &port.to_string(), "--log-level", "warn"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn server");
        Server { child, port }
    }

    fn wait_ready(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while TcpStream::connect(("127.0.0.1", self.port)).is_err() {
            assert!(Instant::now() < deadline, "server did not start listening");
            thread::sleep(Duration::from_millis(20));
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(("127.0.0.1", self.port)).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    fn signal(&self, signal: libc::c_int) {
        let rc = unsafe { libc::kill(self.child.id() as libc::pid_t, signal) };
        assert_eq!(rc, 0, "kill failed");
    }

    /// Wait for exit with a deadline; returns the exit code.
    fn wait_exit(&mut self, limit: Duration) -> Option<i32> {
        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status.code();
            }
            if Instant::now() >= deadline {
                let _ = self.child.kill();
                panic!("server did not exit in time");
            }
            thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn test_ping_then_sigterm_exits_cleanly() {
    let mut server = Server::spawn();

    let mut client = server.connect();
    client.write_all(b"ping").unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"ping");
    drop(client);

    server.signal(libc::SIGTERM);
    assert_eq!(server.wait_exit(Duration::from_secs(5)), Some(0));
}

#[test]
fn test_sigint_closes_open_clients() {
    let mut server = Server::spawn();

    let mut client = server.connect();
    client.write_all(b"hold").unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).unwrap();

    server.signal(libc::SIGINT);
    assert_eq!(server.wait_exit(Duration::from_secs(5)), Some(0));

    let n = client.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0);
}

#[test]
fn test_concurrent_clients_isolated() {
    let server = Server::spawn();

    let mut a = server.connect();
    let mut b = server.connect();
    a.write_all(b"hello").unwrap();
    b.write_all(b"world").unwrap();

    let mut buf_a = [0u8; 5];
    let mut buf_b = [0u8; 5];
    a.read_exact(&mut buf_a).unwrap();
    b.read_exact(&mut buf_b).unwrap();
    assert_eq!(&buf_a, b"hello");
    assert_eq!(&buf_b, b"world");
}

#[test]
fn test_port_in_use_exits_with_failure() {
    let port = portpicker::pick_unused_port().expect("no free port");
    let _occupant = TcpListener::bind(("0.0.0.0", port)).unwrap();

    let mut server = Server::spawn_on(port);
    let code = server.wait_exit(Duration::from_secs(5));
    assert!(matches!(code, Some(c) if c != 0), "unexpected exit: {code:?}");
}
