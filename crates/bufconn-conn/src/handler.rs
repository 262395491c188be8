use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::session::Session;

/// Callback invoked once per message boundary.
///
/// The handler runs on the scheduler thread with exclusive access to the
/// connection; nothing else is processed until it returns. It is invoked
/// when the delimiter arrives but does not receive the message: read it
/// with [`Session::read_msg`].
///
/// Implemented for every `Fn(&mut Session) + Send + Sync + 'static`
/// closure. Closures need their argument annotated
/// (`|session: &mut Session| ...`).
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message(&self, session: &mut Session);
}

impl<F> MessageHandler for F
where
    F: Fn(&mut Session) + Send + Sync + 'static,
{
    fn on_message(&self, session: &mut Session) {
        self(session)
    }
}

/// The default handler: reads one message, with no timeout, and drops it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardMessage;

impl MessageHandler for DiscardMessage {
    fn on_message(&self, session: &mut Session) {
        let _ = session.read_msg(Duration::ZERO);
    }
}

/// A unit of work run once, exclusively, against the connection.
pub type Operation = Box<dyn FnOnce(&mut Session) + Send + 'static>;

/// The currently registered message handler.
///
/// The scheduler takes a snapshot before each invocation, so a replacement
/// installed while a handler runs applies from the next boundary on.
pub(crate) struct HandlerSlot {
    current: Mutex<Arc<dyn MessageHandler>>,
}

impl HandlerSlot {
    pub(crate) fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            current: Mutex::new(handler),
        }
    }

    pub(crate) fn current(&self) -> Arc<dyn MessageHandler> {
        Arc::clone(&self.current.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn replace(&self, handler: Arc<dyn MessageHandler>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = handler;
    }
}

impl std::fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSlot").finish_non_exhaustive()
    }
}
