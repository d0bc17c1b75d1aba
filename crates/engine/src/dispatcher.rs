//! Execution dispatcher.
//!
//! Takes one fire for one task, invokes the module runner, and turns
//! the outcome into the reporting contract: a `RunResult` always
//! (unless canceled), plus a `RunEvent` and one telemetry counter on
//! success. Failure details are deterministic, greppable strings.

use std::sync::Arc;

use bw_domain::{EngineConfig, Metric, RunEvent, RunResult, TaskDefinition};
use bw_runner::{ModuleRunner, RunOutcome};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::gate::CompletionGate;
use crate::sinks::SinkSet;
use crate::telemetry::MetricSink;

pub struct Dispatcher {
    runner: Arc<dyn ModuleRunner>,
    metrics: Arc<dyn MetricSink>,
    sinks: SinkSet,
    config: EngineConfig,
}

impl Dispatcher {
    pub fn new(
        runner: Arc<dyn ModuleRunner>,
        metrics: Arc<dyn MetricSink>,
        sinks: SinkSet,
        config: EngineConfig,
    ) -> Self {
        Self {
            runner,
            metrics,
            sinks,
            config,
        }
    }

    /// Whether the runner's registry knows `module`. Checked at
    /// scheduling time so a bad module never becomes a scheduled task.
    pub fn module_exists(&self, module: &str) -> bool {
        self.runner.exists(module)
    }

    /// Run `task` once and report. A cancellation that lands mid-run
    /// suppresses every output kind; canceled runs are invisible.
    pub async fn run(&self, task: &TaskDefinition, cancel: CancellationToken) {
        let run_id = Uuid::new_v4();
        debug!(
            run_id = %run_id,
            task = %task.name,
            module = %task.module,
            "dispatching run"
        );

        let outcome = self
            .runner
            .run(&task.module, &task.params, cancel.clone())
            .await;

        if cancel.is_cancelled() {
            // The generation died while the module was executing.
            debug!(run_id = %run_id, task = %task.name, "run canceled, output suppressed");
            return;
        }

        match outcome {
            RunOutcome::Canceled => {}
            RunOutcome::LaunchFailed { invocation, error } => {
                let details = format!(
                    "Could not start module {} via {} ({})",
                    task.module, invocation, error
                );
                warn!(run_id = %run_id, task = %task.name, "module launch failed");
                self.send_failure(task, details);
            }
            RunOutcome::Exited {
                status,
                stdout,
                stderr,
                invocation,
            } => {
                if status.success() {
                    self.send_success(task, &stdout);
                } else {
                    let exit = match status.code() {
                        Some(code) => format!("exit status {code}"),
                        None => "signal".to_string(),
                    };
                    let details = format!(
                        "module {} via {} exited with error ({}) Stdout: \"{}\" Stderr: \"{}\"",
                        task.module, invocation, exit, stdout, stderr
                    );
                    self.send_failure(task, details);
                }
            }
        }
    }

    fn send_failure(&self, task: &TaskDefinition, details: String) {
        if !self.config.send_failed_results {
            debug!(task = %task.name, "dropping failing result: send_failed_results is off");
            return;
        }
        let result =
            RunResult::failure(task.id, &task.name, details).stamped(&self.config.identity);
        self.sinks.result(result);
    }

    fn send_success(&self, task: &TaskDefinition, stdout: &str) {
        let report = parse_report(task, stdout);
        let passed = report.get("testsPass").and_then(Value::as_u64).unwrap_or(0);

        // The event waits behind the other two reporting steps.
        let gate = CompletionGate::new(build_event(task), 2, self.sinks.clone());

        let result = RunResult::success(task.id, &task.name, Value::Object(report))
            .stamped(&self.config.identity);
        self.sinks.result(result);
        gate.step_done();

        self.metrics.emit(Metric::tests_pass(&task.name, passed));
        gate.step_done();
    }
}

/// Module report: the JSON object from stdout with `id`/`taskName`
/// merged in. Non-JSON output is wrapped instead of discarded.
fn parse_report(task: &TaskDefinition, stdout: &str) -> serde_json::Map<String, Value> {
    let mut report = match serde_json::from_str::<Value>(stdout) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = serde_json::Map::new();
            map.insert("output".into(), json!(stdout));
            map
        }
    };
    report.insert("id".into(), json!(task.id));
    report.insert("taskName".into(), json!(task.name));
    report
}

/// Fixed run summary: the task name and its parameters, echoed both in
/// the output line and as named fields.
fn build_event(task: &TaskDefinition) -> RunEvent {
    let mut summary = format!("task={}", task.name);
    for param in &task.params {
        summary.push(' ');
        summary.push_str(&param.key);
        summary.push('=');
        summary.push_str(&param.value);
    }

    let mut event = RunEvent::new(
        &task.name,
        &task.module,
        format!("task completed ({summary})"),
    )
    .with_field("task", &task.name);
    for param in &task.params {
        event = event.with_field(&param.key, &param.value);
    }
    event
}
