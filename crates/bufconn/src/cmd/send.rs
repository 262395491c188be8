use std::fs;
use std::time::Duration;

use bufconn_conn::{Conn, ConnError, DiscardMessage, Session};
use bytes::Bytes;
use crossbeam_channel::bounded;

use crate::cmd::SendArgs;
use crate::exit::{conn_error, io_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::net::connect;
use crate::output::{print_message, OutputFormat};
use crate::parse::{parse_delimiter, parse_duration};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let delimiter = parse_delimiter(&args.delimiter)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let stream = connect(&args.addr, args.unix)?;
    let conn =
        Conn::new(stream, DiscardMessage, delimiter).map_err(|err| conn_error("wrap failed", err))?;

    let wait = args.wait.then_some(wait_timeout);
    let (done_tx, done_rx) = bounded(1);
    conn.queue_operation(move |session: &mut Session| {
        let _ = done_tx.send(exchange(session, &payload, wait));
    })
    .map_err(|err| conn_error("send failed", err))?;

    let outcome = done_rx.recv().map_err(|_| {
        CliError::new(INTERNAL, "connection stopped before the message was sent")
    });

    conn.stop();
    if let Err(err) = conn.join() {
        tracing::warn!(error = %err, "connection ended abnormally");
    }

    match outcome?.map_err(|err| conn_error("send failed", err))? {
        Some(reply) => print_message(&reply, conn.peer_endpoint(), format),
        None => tracing::info!(peer = %conn.peer_endpoint(), "message sent"),
    }

    Ok(SUCCESS)
}

/// Write one message and, if `wait` is set, read one reply within it.
fn exchange(
    session: &mut Session,
    payload: &[u8],
    wait: Option<Duration>,
) -> Result<Option<Bytes>, ConnError> {
    let written = session.write_msg(payload)?;
    tracing::debug!(bytes = written, "message written");

    match wait {
        Some(timeout) => session.read_msg(timeout).map(Some),
        None => Ok(None),
    }
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn exchange_writes_then_reads_reply() {
        let (ours, theirs) = UnixStream::pair().expect("pair");
        let conn = Conn::new(ours, DiscardMessage, b';').expect("wrap");

        let peer = std::thread::spawn(move || {
            let mut reader = BufReader::new(theirs.try_clone().expect("clone"));
            let mut request = Vec::new();
            reader.read_until(b';', &mut request).expect("request");
            let mut writer = theirs;
            writer.write_all(b"pong;").expect("reply");
            request
        });

        let (tx, rx) = bounded(1);
        conn.queue_operation(move |session: &mut Session| {
            let _ = tx.send(exchange(session, b"ping", Some(Duration::from_secs(5))));
        })
        .expect("queue");

        let reply = rx.recv().expect("outcome").expect("exchange");
        assert_eq!(reply.as_deref(), Some(&b"pong"[..]));
        assert_eq!(peer.join().expect("peer"), b"ping;");
        conn.stop();
    }

    #[test]
    fn exchange_times_out_without_reply() {
        let (ours, _theirs) = UnixStream::pair().expect("pair");
        let conn = Conn::new(ours, DiscardMessage, b'\n').expect("wrap");

        let (tx, rx) = bounded(1);
        conn.queue_operation(move |session: &mut Session| {
            let _ = tx.send(exchange(session, b"ping", Some(Duration::from_millis(50))));
        })
        .expect("queue");

        let outcome = rx.recv().expect("outcome");
        assert!(matches!(outcome, Err(ConnError::Timeout(_))));
    }

    #[test]
    fn payload_defaults_to_empty() {
        let args = SendArgs {
            addr: "127.0.0.1:1".to_string(),
            unix: false,
            data: None,
            file: None,
            delimiter: "\\n".to_string(),
            wait: false,
            wait_timeout: "5s".to_string(),
        };
        assert!(resolve_payload(&args).expect("payload").is_empty());
    }
}
