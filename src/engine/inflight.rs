//! In-flight fetch bookkeeping
//!
//! Every fetch registers a slot for its path holding a generation number and
//! the sender half of its cancellation channel. Registering a new fetch for the
//! same path fires the previous sender. Only the attempt whose generation is
//! still in the slot may apply its result and clear the slot.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::debug;

struct Slot {
    generation: u64,
    cancel: oneshot::Sender<()>,
}

/// Ticket handed to a fetch when it registers
pub(crate) struct Attempt {
    pub generation: u64,
    /// Resolves when the attempt is superseded or the loader is reset
    pub cancelled: oneshot::Receiver<()>,
}

#[derive(Default)]
pub(crate) struct InFlight {
    slots: Mutex<HashMap<String, Slot>>,
    generation: AtomicU64,
}

impl InFlight {
    /// Register a new attempt for `path`, cancelling the one it replaces
    pub fn begin(&self, path: &str) -> Attempt {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (cancel, cancelled) = oneshot::channel();
        let previous = self
            .slots
            .lock()
            .insert(path.to_string(), Slot { generation, cancel });

        if let Some(previous) = previous {
            debug!(
                path,
                superseded = previous.generation,
                generation,
                "Cancelling in-flight fetch"
            );
            // The receiver is gone when the old attempt already settled
            let _ = previous.cancel.send(());
        }
        Attempt {
            generation,
            cancelled,
        }
    }

    /// Clear the slot if `generation` still owns it.
    ///
    /// Returns false for an attempt that was superseded or reset away; its
    /// result must not be applied.
    pub fn finish(&self, path: &str, generation: u64) -> bool {
        let mut slots = self.slots.lock();
        match slots.get(path) {
            Some(slot) if slot.generation == generation => {
                slots.remove(path);
                true
            }
            _ => false,
        }
    }

    pub fn is_in_flight(&self, path: &str) -> bool {
        self.slots.lock().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Drop every slot; pending attempts observe cancellation
    pub fn cancel_all(&self) {
        let drained: Vec<Slot> = self.slots.lock().drain().map(|(_, slot)| slot).collect();
        for slot in drained {
            let _ = slot.cancel.send(());
        }
    }
}
