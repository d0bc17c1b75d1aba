//! Telemetry sink boundary.
//!
//! The engine emits one counter per successful run and does not care
//! how it reaches the wire. Implementations must return immediately.

use bw_domain::Metric;
use tokio::sync::mpsc;

/// Fire-and-forget metric emission.
pub trait MetricSink: Send + Sync {
    fn emit(&self, metric: Metric);
}

/// Channel-backed sink; the embedder forwards drained metrics to its
/// statsd pipe or wherever they go.
pub struct ChannelMetrics {
    tx: mpsc::UnboundedSender<Metric>,
}

impl ChannelMetrics {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Metric>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MetricSink for ChannelMetrics {
    fn emit(&self, metric: Metric) {
        let _ = self.tx.send(metric);
    }
}
