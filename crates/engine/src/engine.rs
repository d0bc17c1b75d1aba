//! Public façade: start/stop/run-tasks plus the pure future-runs query.

use std::sync::Arc;

use bw_domain::{EngineConfig, TaskDefinition};
use bw_runner::ModuleRunner;
use chrono::{DateTime, Utc};

use crate::calendar::Calendar;
use crate::dispatcher::Dispatcher;
use crate::sinks::{self, OutputStreams};
use crate::telemetry::MetricSink;

pub struct Engine {
    calendar: Arc<Calendar>,
    config: EngineConfig,
}

impl Engine {
    /// Wire an engine to a module runner and a metric sink. The returned
    /// streams are the only way output leaves the engine; dropping them
    /// turns the corresponding emissions into no-ops.
    pub fn new(
        runner: Arc<dyn ModuleRunner>,
        metrics: Arc<dyn MetricSink>,
        config: EngineConfig,
    ) -> (Self, OutputStreams) {
        let (sink_set, streams) = sinks::channel();
        let dispatcher = Arc::new(Dispatcher::new(
            runner,
            metrics,
            sink_set.clone(),
            config.clone(),
        ));
        let calendar = Arc::new(Calendar::new(dispatcher, sink_set));
        (Self { calendar, config }, streams)
    }

    /// Replace the active task set. Returns the new generation; results,
    /// events and errors stream out asynchronously thereafter. Must be
    /// called from within a tokio runtime.
    pub fn start(&self, tasks: Vec<TaskDefinition>) -> u64 {
        self.calendar.activate(tasks)
    }

    /// Cancel the active task set, killing in-flight runs. Idempotent.
    pub fn stop(&self) {
        self.calendar.deactivate();
    }

    /// Trigger an immediate run for active tasks by id, subject to the
    /// single-flight rule.
    pub fn run_tasks(&self, ids: &[u64]) {
        self.calendar.dispatch_once(ids);
    }

    /// The next `count` fire instants for one task definition, at or
    /// after `from`. A pure query: it never touches live scheduler state,
    /// and a definition that does not parse returns the parse error
    /// directly instead of reaching the error stream. `count` is clamped
    /// by `max_future_runs`.
    pub fn future_runs(
        &self,
        task: &TaskDefinition,
        from: DateTime<Utc>,
        count: usize,
    ) -> bw_domain::Result<Vec<DateTime<Utc>>> {
        let spec = bw_schedule::parse(&task.schedule)?;
        let count = count.min(self.config.max_future_runs);
        Ok(bw_schedule::future_runs(&spec, from, count))
    }
}
