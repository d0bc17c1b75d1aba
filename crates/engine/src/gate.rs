//! Counted completion for a run's post-processing.
//!
//! A successful run has several reporting steps (result delivery,
//! metric emission) and its event must go out only once all of them are
//! done. The gate holds the event with a step counter; the last
//! `step_done` emits it, exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};

use bw_domain::RunEvent;
use parking_lot::Mutex;

use crate::sinks::SinkSet;

pub struct CompletionGate {
    pending: AtomicUsize,
    event: Mutex<Option<RunEvent>>,
    sinks: SinkSet,
}

impl CompletionGate {
    /// Gate `event` behind `steps` completions. Zero steps emits
    /// immediately.
    pub fn new(event: RunEvent, steps: usize, sinks: SinkSet) -> Self {
        let gate = Self {
            pending: AtomicUsize::new(steps),
            event: Mutex::new(Some(event)),
            sinks,
        };
        if steps == 0 {
            gate.emit();
        }
        gate
    }

    /// Mark one step finished. Call exactly once per declared step; the
    /// final call emits the event.
    pub fn step_done(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.emit();
        }
    }

    fn emit(&self) {
        if let Some(event) = self.event.lock().take() {
            self.sinks.event(event);
        }
    }
}
