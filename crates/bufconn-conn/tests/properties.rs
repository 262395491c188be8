//! End-to-end behaviour of a wrapped connection against a real peer.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bufconn_conn::{Conn, ConnError, DiscardMessage, LifecycleState, Session};
use crossbeam_channel::{bounded, Receiver};

const WAIT: Duration = Duration::from_secs(5);

fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();
    (client, server)
}

fn ignore_messages(_: &mut Session) {}

fn run<T, F>(conn: &Conn, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce(&mut Session) -> T + Send + 'static,
{
    let (tx, rx) = bounded(1);
    conn.queue_operation(move |session| {
        let _ = tx.send(f(session));
    })
    .unwrap();
    rx.recv_timeout(WAIT).unwrap()
}

/// Queue an operation that blocks until the returned sender fires.
fn hold(conn: &Conn) -> crossbeam_channel::Sender<()> {
    let (started_tx, started_rx) = bounded(1);
    let (gate_tx, gate_rx): (_, Receiver<()>) = bounded(1);
    conn.queue_operation(move |_| {
        let _ = started_tx.send(());
        let _ = gate_rx.recv_timeout(WAIT);
    })
    .unwrap();
    started_rx.recv_timeout(WAIT).unwrap();
    gate_tx
}

#[test]
fn ping_pong() {
    let (a_stream, b_stream) = tcp_pair();

    let b = Conn::new(
        b_stream,
        |session: &mut Session| {
            if let Ok(msg) = session.read_msg(WAIT) {
                if msg.as_ref() == b"ping" {
                    let _ = session.write_msg("pong");
                }
            }
        },
        b';',
    )
    .unwrap();
    let a = Conn::new(a_stream, DiscardMessage, b';').unwrap();

    let reply = run(&a, |session| {
        session.write(b"ping;").unwrap();
        session.read_msg_string(WAIT)
    });

    assert_eq!(reply.unwrap(), "pong");
    a.stop();
    b.stop();
}

#[test]
fn write_msg_round_trips_through_handler() {
    let (a_stream, b_stream) = tcp_pair();
    let (tx, rx) = bounded(64);

    let _b = Conn::new(
        b_stream,
        move |session: &mut Session| {
            if let Ok(msg) = session.read_msg(WAIT) {
                let _ = tx.send(msg);
            }
        },
        b'\n',
    )
    .unwrap();
    let a = Conn::new(a_stream, DiscardMessage, b'\n').unwrap();

    let sent: Vec<String> = (0..40).map(|i| format!("message {i} {}", "x".repeat(i))).collect();
    let outgoing = sent.clone();
    run(&a, move |session| {
        for msg in &outgoing {
            session.write_msg(msg).unwrap();
        }
    });

    let received: Vec<String> = (0..sent.len())
        .map(|_| String::from_utf8(rx.recv_timeout(WAIT).unwrap().to_vec()).unwrap())
        .collect();
    assert_eq!(received, sent);
}

#[test]
fn read_msg_returns_prefix_before_single_delimiter() {
    for k in [0usize, 1, 7, 300] {
        let (client, mut server) = tcp_pair();
        let conn = Conn::new(client, ignore_messages, b';').unwrap();

        let prefix: Vec<u8> = (0..k).map(|i| b'a' + (i % 26) as u8).collect();
        let mut wire = prefix.clone();
        wire.extend_from_slice(b";tail");
        server.write_all(&wire).unwrap();

        let (msg, tail) = run(&conn, |session| {
            let msg = session.read_msg(WAIT).unwrap();
            let tail = session.read(4, WAIT).unwrap();
            (msg, tail)
        });

        assert_eq!(msg.as_ref(), prefix.as_slice(), "k = {k}");
        assert_eq!(tail.as_ref(), b"tail", "k = {k}");
        assert_eq!(run(&conn, |session| session.buffered()), 0);
    }
}

#[test]
fn sequential_reads_consume_every_byte_once() {
    let (client, mut server) = tcp_pair();
    let conn = Conn::new(client, ignore_messages, b'|').unwrap();

    let wire: Vec<u8> = b"alpha|bravo|charlie|delta-echo|".repeat(8);
    server.write_all(&wire).unwrap();

    let total = wire.len();
    let seen = run(&conn, move |session| {
        let mut seen = Vec::new();
        let mut step = 0usize;
        while seen.len() < total {
            if step % 2 == 0 {
                let n = (step % 5 + 1).min(total - seen.len());
                seen.extend_from_slice(&session.read(n, WAIT).unwrap());
            } else {
                let msg = session.read_msg(WAIT).unwrap();
                seen.extend_from_slice(&msg);
                seen.push(b'|');
            }
            step += 1;
        }
        seen
    });

    assert_eq!(seen, wire);
}

#[test]
fn callbacks_never_overlap() {
    let (client, mut server) = tcp_pair();
    let clock = Arc::new(AtomicU64::new(0));
    let intervals = Arc::new(Mutex::new(Vec::new()));

    let record = {
        let clock = Arc::clone(&clock);
        let intervals = Arc::clone(&intervals);
        move || {
            let start = clock.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_micros(200));
            let end = clock.fetch_add(1, Ordering::SeqCst);
            intervals.lock().unwrap().push((start, end));
        }
    };

    let handler_record = record.clone();
    let conn = Arc::new(
        Conn::new(
            client,
            move |session: &mut Session| {
                handler_record();
                let _ = session.read_msg(WAIT);
            },
            b';',
        )
        .unwrap(),
    );

    let submitters: Vec<_> = (0..2)
        .map(|_| {
            let conn = Arc::clone(&conn);
            let record = record.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let record = record.clone();
                    conn.queue_operation(move |_| record()).unwrap();
                }
            })
        })
        .collect();
    for _ in 0..20 {
        server.write_all(b"m;").unwrap();
    }
    for submitter in submitters {
        submitter.join().unwrap();
    }

    // Drain: a final operation runs after every earlier one.
    run(&conn, |_| ());
    let mut intervals = intervals.lock().unwrap().clone();
    intervals.sort();

    assert!(intervals.len() >= 100);
    for pair in intervals.windows(2) {
        let (_, prev_end) = pair[0];
        let (next_start, _) = pair[1];
        assert!(
            prev_end < next_start,
            "callbacks overlapped: {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn nothing_runs_after_stop() {
    let (client, _server) = tcp_pair();
    let conn = Conn::new(client, DiscardMessage, b';').unwrap();
    let ran_late = Arc::new(AtomicBool::new(false));

    let gate = hold(&conn);
    for _ in 0..5 {
        let ran_late = Arc::clone(&ran_late);
        conn.queue_operation(move |_| ran_late.store(true, Ordering::SeqCst))
            .unwrap();
    }

    conn.stop();
    gate.send(()).unwrap();
    conn.join().unwrap();
    conn.stop();

    assert_eq!(conn.state(), LifecycleState::Stopped);
    assert!(!ran_late.load(Ordering::SeqCst));
    assert!(matches!(
        conn.queue_operation(|_| {}),
        Err(ConnError::Stopped)
    ));
}

#[test]
fn replaced_handler_applies_from_next_boundary() {
    let (client, mut server) = tcp_pair();
    let (log_tx, log_rx) = bounded(8);
    let (started_tx, started_rx) = bounded(1);
    let (gate_tx, gate_rx) = bounded::<()>(1);

    let first_log = log_tx.clone();
    let conn = Conn::new(
        client,
        move |session: &mut Session| {
            let msg = session.read_msg_string(WAIT).unwrap();
            let _ = started_tx.send(());
            let _ = gate_rx.recv_timeout(WAIT);
            let _ = first_log.send(format!("first:{msg}"));
        },
        b';',
    )
    .unwrap();

    server.write_all(b"one;").unwrap();
    started_rx.recv_timeout(WAIT).unwrap();

    let second_log = log_tx.clone();
    conn.set_message_handler(move |session: &mut Session| {
        let msg = session.read_msg_string(WAIT).unwrap();
        let _ = second_log.send(format!("second:{msg}"));
    });
    server.write_all(b"two;").unwrap();
    gate_tx.send(()).unwrap();

    let log: Vec<String> = (0..2).map(|_| log_rx.recv_timeout(WAIT).unwrap()).collect();
    assert_eq!(log, vec!["first:one", "second:two"]);
}

#[test]
fn peer_close_while_idle_stops() {
    let (client, server) = tcp_pair();
    let conn = Conn::new(client, DiscardMessage, b';').unwrap();

    drop(server);
    conn.join().unwrap();

    assert!(conn.is_stopped());
    assert_eq!(conn.state(), LifecycleState::Stopped);
}

#[test]
fn stopping_releases_blocked_peer_reads() {
    let (client, mut server) = tcp_pair();
    let conn = Conn::new(client, DiscardMessage, b';').unwrap();

    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        server.read_to_end(&mut buf).map(|_| buf)
    });

    run(&conn, |session| session.write_msg("bye").unwrap());
    conn.stop();
    conn.join().unwrap();

    assert_eq!(reader.join().unwrap().unwrap(), b"bye;");
}

fn logging_handler(
    log: crossbeam_channel::Sender<String>,
) -> impl Fn(&mut Session) + Send + Sync + 'static {
    move |session: &mut Session| {
        if let Ok(msg) = session.read_msg_string(WAIT) {
            let _ = log.send(msg);
        }
    }
}

/// Queue `f` so that it starts only after `bytes` are already waiting in the
/// pending queue, forcing its reads to drain them.
fn run_after_bytes_queued<T, F>(conn: &Conn, peer: &mut TcpStream, bytes: &[u8], f: F) -> T
where
    T: Send + 'static,
    F: FnOnce(&mut Session) -> T + Send + 'static,
{
    let (started_tx, started_rx) = bounded(1);
    let (gate_tx, gate_rx) = bounded::<()>(1);
    let (out_tx, out_rx) = bounded(1);
    conn.queue_operation(move |session| {
        let _ = started_tx.send(());
        let _ = gate_rx.recv_timeout(WAIT);
        let _ = out_tx.send(f(session));
    })
    .unwrap();

    started_rx.recv_timeout(WAIT).unwrap();
    peer.write_all(bytes).unwrap();
    thread::sleep(Duration::from_millis(150));
    gate_tx.send(()).unwrap();
    out_rx.recv_timeout(WAIT).unwrap()
}

#[test]
fn boundaries_drained_by_an_operation_reach_the_handler() {
    let (client, mut server) = tcp_pair();
    let (log_tx, log_rx) = bounded(8);
    let conn = Conn::new(client, logging_handler(log_tx), b';').unwrap();

    let first = run_after_bytes_queued(&conn, &mut server, b"xa;b;", |session| {
        session.read(1, WAIT).unwrap()
    });
    assert_eq!(first.as_ref(), b"x");

    // Announcements run before the next queued item.
    run(&conn, |_| ());
    let log: Vec<String> = log_rx.try_iter().collect();
    assert_eq!(log, vec!["a", "b"]);
}

#[test]
fn boundaries_consumed_by_an_operation_are_not_announced() {
    let (client, mut server) = tcp_pair();
    let (log_tx, log_rx) = bounded(8);
    let conn = Conn::new(client, logging_handler(log_tx), b';').unwrap();

    let msgs = run_after_bytes_queued(&conn, &mut server, b"a;b;", |session| {
        let a = session.read_msg_string(WAIT).unwrap();
        let b = session.read_msg_string(WAIT).unwrap();
        (a, b)
    });
    assert_eq!(msgs, ("a".to_string(), "b".to_string()));

    run(&conn, |_| ());
    assert!(log_rx.try_recv().is_err());
    assert_eq!(run(&conn, |session| session.buffered()), 0);
}

#[test]
fn large_message_is_received_in_linear_time() {
    const SIZE: usize = 256 * 1024;

    let (client, server) = tcp_pair();
    let (len_tx, len_rx) = bounded(1);
    let conn = Conn::new(
        client,
        move |session: &mut Session| {
            if let Ok(msg) = session.read_msg(WAIT) {
                let _ = len_tx.send(msg.len());
            }
        },
        b';',
    )
    .unwrap();

    let started = Instant::now();
    let writer = thread::spawn(move || {
        let mut server = server;
        let mut payload = vec![b'x'; SIZE];
        payload.push(b';');
        server.write_all(&payload).unwrap();
        server
    });

    let len = len_rx.recv_timeout(Duration::from_secs(20)).unwrap();
    let elapsed = started.elapsed();
    assert_eq!(len, SIZE);
    assert!(elapsed < Duration::from_secs(15), "took {elapsed:?}");

    let _server = writer.join().unwrap();
    conn.stop();
}
