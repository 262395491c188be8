//! Minimal echo server. Accepts one peer and echoes messages back until
//! the peer disconnects.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:7878 --data hello --wait

use std::net::TcpListener;
use std::time::Duration;

use bufconn::{Conn, Session};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:7878")?;
    eprintln!("Listening on {}", listener.local_addr()?);

    let (stream, addr) = listener.accept()?;
    eprintln!("Peer connected: {addr}");

    let echo = |session: &mut Session| match session.read_msg(Duration::ZERO) {
        Ok(msg) => {
            eprintln!("Received {} bytes", msg.len());
            if let Err(e) = session.write_msg(&msg) {
                eprintln!("Echo failed: {e}");
            }
        }
        Err(e) => eprintln!("Read failed: {e}"),
    };

    let conn = Conn::new(stream, echo, b'\n')?;
    conn.join()?;
    eprintln!("Peer disconnected");
    Ok(())
}
