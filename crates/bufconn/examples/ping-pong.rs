//! Two connections in one process trading `ping` and `pong` messages.
//!
//! Run with:
//!   cargo run --example ping-pong

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bufconn::{Conn, Session};

const ROUNDS: usize = 5;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let client = TcpStream::connect(listener.local_addr()?)?;
    let (server, _) = listener.accept()?;

    let pong = |session: &mut Session| {
        if let Ok(msg) = session.read_msg_string(Duration::ZERO) {
            println!("server got {msg}");
            let _ = session.write_msg(b"pong");
        }
    };
    let server = Conn::new(server, pong, b'\n')?;

    let rounds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&rounds);
    let ping = move |session: &mut Session| {
        let Ok(msg) = session.read_msg_string(Duration::ZERO) else {
            return;
        };
        println!("client got {msg}");
        if counter.fetch_add(1, Ordering::SeqCst) + 1 >= ROUNDS {
            session.stop();
        } else {
            let _ = session.write_msg(b"ping");
        }
    };
    let client = Conn::new(client, ping, b'\n')?;

    client.queue_operation(|session: &mut Session| {
        let _ = session.write_msg(b"ping");
    })?;

    client.join()?;
    server.join()?;
    println!("{} rounds", rounds.load(Ordering::SeqCst));
    Ok(())
}
