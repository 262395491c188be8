use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

const ACTIVE: u8 = 0;
const STOPPING: u8 = 1;
const STOPPED: u8 = 2;

/// Where a connection is in its shutdown sequence.
///
/// `Active -> Stopping` on a stop request or a read error,
/// `Stopping -> Stopped` once the scheduler has closed the stream.
/// There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Stopping,
    Stopped,
}

/// Shared lifecycle flag plus the stop signal consumed by the scheduler.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
    stop_tx: Sender<()>,
}

impl Lifecycle {
    /// Create an active lifecycle and the receiving end of its stop signal.
    pub(crate) fn new() -> (Self, Receiver<()>) {
        let (stop_tx, stop_rx) = bounded(1);
        let lifecycle = Self {
            state: AtomicU8::new(ACTIVE),
            stop_tx,
        };
        (lifecycle, stop_rx)
    }

    pub(crate) fn state(&self) -> LifecycleState {
        match self.state.load(Ordering::Acquire) {
            ACTIVE => LifecycleState::Active,
            STOPPING => LifecycleState::Stopping,
            _ => LifecycleState::Stopped,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) == ACTIVE
    }

    /// Move to `Stopping` and signal the scheduler.
    ///
    /// Returns `false` if a stop was already requested; the signal is only
    /// ever posted once.
    pub(crate) fn request_stop(&self) -> bool {
        if self
            .state
            .compare_exchange(ACTIVE, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        debug!("stop requested");
        // Capacity 1 and a single sender call: this never blocks. If the
        // scheduler is already gone there is nobody left to notify.
        let _ = self.stop_tx.try_send(());
        true
    }

    pub(crate) fn mark_stopped(&self) {
        self.state.store(STOPPED, Ordering::Release);
    }
}
