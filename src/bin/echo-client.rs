//! Interactive client for the echo server.
//!
//! Connects, sends a greeting, then echoes stdin lines through the server
//! until `quit` or end of input.

use clap::Parser;
use echo_reactor::runtime::{RecvOutcome, SendOutcome, SocketHandle};
use std::io::{self, BufRead, Write};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const RECV_BUFFER_SIZE: usize = 4096;

#[derive(Parser, Debug)]
#[command(name = "echo-client")]
#[command(version = "0.1.0")]
#[command(about = "Interactive client for echo-reactor", long_about = None)]
struct ClientArgs {
    /// Server IPv4 address
    #[arg(default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(default_value_t = 8080)]
    port: u16,
}

struct EchoClient {
    socket: SocketHandle,
}

impl EchoClient {
    fn connect(host: &str, port: u16) -> echo_reactor::Result<Self> {
        let mut socket = SocketHandle::new();
        socket.create()?;
        socket.connect(host, port)?;
        info!(host, port, "Connected to server");
        Ok(Self { socket })
    }

    fn send_message(&self, message: &[u8]) -> echo_reactor::Result<()> {
        let mut offset = 0;
        while offset < message.len() {
            match self.socket.send(&message[offset..])? {
                SendOutcome::Sent(n) => offset += n,
                // The client socket is blocking; this only appears with send timeouts.
                SendOutcome::WouldBlock => continue,
            }
        }
        info!(bytes = message.len(), "Sent");
        Ok(())
    }

    /// Read until `expected` bytes came back. Returns false if the server closed.
    fn receive_response(&self, expected: usize) -> echo_reactor::Result<bool> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut received = Vec::with_capacity(expected);
        while received.len() < expected {
            match self.socket.receive(&mut buf)? {
                RecvOutcome::Data(n) => received.extend_from_slice(&buf[..n]),
                RecvOutcome::Closed => {
                    error!("Connection closed by server");
                    return Ok(false);
                }
                RecvOutcome::WouldBlock => continue,
            }
        }
        let text = String::from_utf8_lossy(&received);
        info!(bytes = received.len(), "Received: {}", text.trim_end());
        Ok(true)
    }

    fn exchange(&self, message: &[u8]) -> echo_reactor::Result<bool> {
        self.send_message(message)?;
        self.receive_response(message.len())
    }

    fn interactive(&self) -> echo_reactor::Result<()> {
        println!("\n=== Echo Client Interactive Mode ===");
        println!("Type 'quit' to exit, or enter message to send");

        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print!("Enter message: ");
            let _ = io::stdout().flush();

            let Some(Ok(line)) = lines.next() else {
                break;
            };
            if line == "quit" {
                break;
            }
            if !self.exchange(format!("{line}\n").as_bytes())? {
                break;
            }
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(host = %args.host, port = args.port, "Echo client starting");

    let mut client = match EchoClient::connect(&args.host, args.port) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to connect to server");
            return Err(e.into());
        }
    };

    if client.exchange(b"Hello World!")? {
        client.interactive()?;
    }

    client.socket.close();
    info!("Client shutdown complete");
    Ok(())
}
