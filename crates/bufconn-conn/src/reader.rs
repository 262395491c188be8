use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{debug, trace};

use crate::conn::Shared;

/// Spawn the byte reader thread.
///
/// The thread forwards every received byte, in order, into `pending`, and
/// requests a stop on EOF or any read error.
///
/// It checks for a stop request before each read, but a read already in
/// progress cannot be interrupted: it returns when the stream delivers
/// data, errors, or is shut down. The scheduler shuts the stream down on
/// exit, which releases the reader on TCP and Unix sockets.
pub(crate) fn spawn<R>(
    stream: R,
    pending: Sender<u8>,
    shared: Arc<Shared>,
    chunk_size: usize,
) -> std::io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("bufconn-reader".to_string())
        .spawn(move || run(stream, &pending, &shared, chunk_size))
}

fn run<R: Read>(mut stream: R, pending: &Sender<u8>, shared: &Shared, chunk_size: usize) {
    let mut chunk = vec![0u8; chunk_size.max(1)];

    loop {
        if !shared.lifecycle.is_active() {
            debug!("byte reader exiting: stop requested");
            return;
        }

        let read = match stream.read(&mut chunk) {
            Ok(0) => {
                debug!("byte reader exiting: peer closed");
                shared.lifecycle.request_stop();
                return;
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(error = %err, "byte reader exiting: read failed");
                shared.lifecycle.request_stop();
                return;
            }
        };

        trace!(bytes = read, "received");
        for &byte in &chunk[..read] {
            if pending.send(byte).is_err() {
                debug!("byte reader exiting: scheduler gone");
                return;
            }
        }
    }
}
