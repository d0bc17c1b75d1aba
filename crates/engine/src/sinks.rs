//! Output streams for results, events, and schedule errors.
//!
//! Three independent unbounded channels: emitters never block on a slow
//! consumer, and the embedder drains each stream at its own pace. A
//! dropped receiver turns the matching emissions into no-ops.

use bw_domain::{RunEvent, RunResult, ScheduleError};
use tokio::sync::mpsc;

/// Sending half, cloned into every run task.
#[derive(Clone)]
pub struct SinkSet {
    results: mpsc::UnboundedSender<RunResult>,
    events: mpsc::UnboundedSender<RunEvent>,
    errors: mpsc::UnboundedSender<ScheduleError>,
}

/// Receiving half, handed to the embedder.
pub struct OutputStreams {
    pub results: mpsc::UnboundedReceiver<RunResult>,
    pub events: mpsc::UnboundedReceiver<RunEvent>,
    pub errors: mpsc::UnboundedReceiver<ScheduleError>,
}

pub fn channel() -> (SinkSet, OutputStreams) {
    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();
    (
        SinkSet {
            results: results_tx,
            events: events_tx,
            errors: errors_tx,
        },
        OutputStreams {
            results: results_rx,
            events: events_rx,
            errors: errors_rx,
        },
    )
}

impl SinkSet {
    pub fn result(&self, result: RunResult) {
        let _ = self.results.send(result);
    }

    pub fn event(&self, event: RunEvent) {
        let _ = self.events.send(event);
    }

    pub fn error(&self, error: ScheduleError) {
        let _ = self.errors.send(error);
    }
}
