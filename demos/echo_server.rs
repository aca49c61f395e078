//! WebSocket echo server, one thread per connection.
//!
//! Run with: RUST_LOG=debug cargo run --example echo_server
//! Then connect a client to ws://localhost:25955/echo/ with subprotocol "echo".

use std::error::Error;
use std::net::{TcpListener, TcpStream};
use std::thread;

use tracing::{info, warn};
use wsrv::{Config, Connection, Echo, Timeouts};

const ADDR: &str = "0.0.0.0:25955";

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::new("/echo/")
        .with_subprotocol("echo")
        .with_timeouts(Timeouts::default());

    let listener = TcpListener::bind(ADDR)?;
    info!(addr = ADDR, "echo server listening");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };
        let config = config.clone();
        thread::spawn(move || {
            let peer = stream.peer_addr().ok();
            if let Err(err) = handle_connection(stream, &config) {
                warn!(?peer, error = %err, "connection ended with error");
            }
        });
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, config: &Config) -> wsrv::Result<()> {
    let timeouts = config.timeouts.clone().unwrap_or_default();
    stream.set_read_timeout(Some(timeouts.handshake))?;
    stream.set_write_timeout(Some(timeouts.write))?;

    let mut conn = Connection::accept(stream, config)?;
    conn.get_ref().set_read_timeout(Some(timeouts.read))?;
    info!(protocol = conn.session().protocol(), "session opened");

    conn.serve(&mut Echo)
}
