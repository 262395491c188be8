use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bufconn_conn::{Conn, Session};
use bufconn_transport::{Endpoint, NetStream};

use crate::cmd::EchoArgs;
use crate::exit::{conn_error, transport_error, CliError, CliResult, SUCCESS};
use crate::net::Listener;
use crate::output::{print_message, OutputFormat};
use crate::parse::parse_delimiter;

const ACCEPT_POLL: Duration = Duration::from_millis(50);

pub fn run(args: EchoArgs, format: OutputFormat) -> CliResult<i32> {
    let delimiter = parse_delimiter(&args.delimiter)?;
    let listener = Listener::bind(&args.addr, args.unix)?;
    listener.set_nonblocking(true)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let echoed = Arc::new(AtomicUsize::new(0));
    let mut conns: Vec<Conn> = Vec::new();

    while running.load(Ordering::SeqCst) {
        conns.retain(|conn| !conn.is_stopped());

        let Some(stream) = listener.accept()? else {
            std::thread::sleep(ACCEPT_POLL);
            continue;
        };

        let conn = wrap(stream, delimiter, format, args.count, &echoed, &running)?;
        tracing::info!(peer = %conn.peer_endpoint(), "accepted connection");
        conns.push(conn);
    }

    for conn in &conns {
        conn.stop();
    }
    for conn in &conns {
        if let Err(err) = conn.join() {
            tracing::warn!(peer = %conn.peer_endpoint(), error = %err, "connection ended abnormally");
        }
    }

    Ok(SUCCESS)
}

fn wrap(
    stream: NetStream,
    delimiter: u8,
    format: OutputFormat,
    count: Option<usize>,
    echoed: &Arc<AtomicUsize>,
    running: &Arc<AtomicBool>,
) -> CliResult<Conn> {
    let peer = stream
        .peer_endpoint()
        .map_err(|err| transport_error("accept failed", err))?;
    let echoed = Arc::clone(echoed);
    let running = Arc::clone(running);

    let handler = move |session: &mut Session| {
        if !echo_one(session, &peer, format) {
            return;
        }
        let total = echoed.fetch_add(1, Ordering::SeqCst) + 1;
        if count.is_some_and(|limit| total >= limit) {
            running.store(false, Ordering::SeqCst);
        }
    };

    Conn::new(stream, handler, delimiter).map_err(|err| conn_error("wrap failed", err))
}

/// Read the message that triggered the handler and write it back.
fn echo_one(session: &mut Session, peer: &Endpoint, format: OutputFormat) -> bool {
    let msg = match session.read_msg(Duration::ZERO) {
        Ok(msg) => msg,
        Err(err) => {
            tracing::debug!(peer = %peer, error = %err, "message vanished before read");
            return false;
        }
    };

    print_message(&msg, peer, format);
    tracing::debug!(peer = %peer, size = msg.len(), "echoing message");

    match session.write_msg(&msg) {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(peer = %peer, error = %err, "echo write failed");
            false
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn wrapped_stream_echoes_and_counts() {
        let (ours, theirs) = UnixStream::pair().expect("pair");
        let echoed = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicBool::new(true));

        let conn = wrap(
            ours.into(),
            b'\n',
            OutputFormat::Pretty,
            Some(2),
            &echoed,
            &running,
        )
        .expect("wrap");

        let mut writer = theirs.try_clone().expect("clone");
        writer.write_all(b"one\ntwo\n").expect("write");

        let mut reader = BufReader::new(theirs);
        let mut line = String::new();
        reader.read_line(&mut line).expect("first echo");
        assert_eq!(line, "one\n");
        line.clear();
        reader.read_line(&mut line).expect("second echo");
        assert_eq!(line, "two\n");

        conn.stop();
        conn.join().expect("join");
        assert_eq!(echoed.load(Ordering::SeqCst), 2);
        assert!(!running.load(Ordering::SeqCst));
    }
}
