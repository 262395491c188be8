use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver};
use tracing::{debug, trace};

use crate::handler::Operation;
use crate::session::Session;

/// What woke the scheduler.
enum Event {
    Stop,
    Byte(u8),
    Operation(Operation),
    ReaderGone,
    HandlesDropped,
}

/// The single execution context for a connection.
///
/// Every iteration services exactly one of: a stop request, a pending
/// byte, or a queued operation. Handlers and operations run inline, so the
/// next item waits until they return.
///
/// A delimiter byte taken from the queue here fires the handler directly.
/// A delimiter a callback pulled in through a read is announced after that
/// callback returns, if its message is still buffered.
pub(crate) struct Scheduler {
    session: Session,
    pending: Receiver<u8>,
    ops: Receiver<Operation>,
    stop: Receiver<()>,
}

impl Scheduler {
    pub(crate) fn new(
        session: Session,
        pending: Receiver<u8>,
        ops: Receiver<Operation>,
        stop: Receiver<()>,
    ) -> Self {
        Self {
            session,
            pending,
            ops,
            stop,
        }
    }

    pub(crate) fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("bufconn-scheduler".to_string())
            .spawn(move || self.run())
    }

    /// Run until stopped. Dropping `self` closes the stream.
    pub(crate) fn run(mut self) {
        loop {
            // A pending stop wins over any other ready work.
            if self.stop.try_recv().is_ok() || !self.is_active() {
                return;
            }

            let event = select! {
                recv(self.stop) -> _ => Event::Stop,
                recv(self.pending) -> byte => match byte {
                    Ok(byte) => Event::Byte(byte),
                    Err(_) => Event::ReaderGone,
                },
                recv(self.ops) -> op => match op {
                    Ok(op) => Event::Operation(op),
                    Err(_) => Event::HandlesDropped,
                },
            };

            match event {
                Event::Stop => return,
                // A stop requested while we were selecting still wins.
                Event::Byte(_) | Event::Operation(_) if !self.is_active() => return,
                Event::Byte(byte) => {
                    self.on_byte(byte);
                    self.announce_drained();
                }
                Event::Operation(op) => {
                    trace!("running operation");
                    op(&mut self.session);
                    self.announce_drained();
                }
                Event::ReaderGone => {
                    // The reader only leaves after requesting a stop.
                    self.session.shared().lifecycle.request_stop();
                    return;
                }
                Event::HandlesDropped => {
                    debug!("all connection handles dropped");
                    self.session.shared().lifecycle.request_stop();
                    return;
                }
            }
        }
    }

    fn is_active(&self) -> bool {
        self.session.shared().lifecycle.is_active()
    }

    fn on_byte(&mut self, byte: u8) {
        let buffer = self.session.buffer_mut();
        buffer.push(byte);
        if byte != buffer.delimiter() {
            return;
        }

        self.run_handler();
    }

    /// Run the handler for boundaries a callback read past without
    /// consuming, so back-to-back messages are not left unannounced.
    fn announce_drained(&mut self) {
        loop {
            let owed = self.session.take_unannounced();
            if owed == 0 {
                return;
            }
            for _ in 0..owed {
                if !self.is_active() {
                    return;
                }
                if !self.session.buffer_mut().has_message() {
                    break;
                }
                self.run_handler();
            }
        }
    }

    fn run_handler(&mut self) {
        // Snapshot: a replacement installed from here on applies next time.
        let handler = self.session.shared().handler.current();
        trace!("message boundary, running handler");
        handler.on_message(&mut self.session);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if thread::panicking() {
            debug!("scheduler unwinding from a panicking callback");
        }
        if let Err(err) = self.session.stream().shutdown() {
            debug!(error = %err, "failed to shut down stream");
        }
        self.session.shared().lifecycle.mark_stopped();
        debug!("scheduler stopped");
    }
}
