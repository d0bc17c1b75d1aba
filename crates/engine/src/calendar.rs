//! Task calendar: the scheduler core.
//!
//! Owns the active generation: a validated set of scheduled tasks, one
//! timer task per interval plus an immediate run per task, and a
//! cancellation token that kills all of it when the set is replaced or
//! stopped.
//!
//! **Single-flight**: each task carries a `running` flag; a fire that
//! lands while the previous run is still in flight is dropped silently.
//! Different tasks overlap freely.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bw_domain::{Error, ScheduleError, TaskDefinition};
use bw_schedule::{interval_runs, IntervalRuns, ScheduleSpec};
use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::sinks::SinkSet;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One validated task inside the active generation.
struct ScheduledTask {
    def: TaskDefinition,
    spec: ScheduleSpec,
    generation: u64,
    /// Single-flight flag; set while a run is in flight.
    running: AtomicBool,
}

struct Active {
    generation: u64,
    cancel: CancellationToken,
    tasks: HashMap<u64, Arc<ScheduledTask>>,
}

pub struct Calendar {
    dispatcher: Arc<Dispatcher>,
    sinks: SinkSet,
    active: Mutex<Active>,
}

impl Calendar {
    pub fn new(dispatcher: Arc<Dispatcher>, sinks: SinkSet) -> Self {
        Self {
            dispatcher,
            sinks,
            active: Mutex::new(Active {
                generation: 0,
                cancel: CancellationToken::new(),
                tasks: HashMap::new(),
            }),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Operations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Replace the active task set. The previous generation is canceled
    /// atomically: its timers stop and its in-flight runs are killed.
    /// Tasks that fail validation produce one `ScheduleError` each and
    /// do not block their siblings. Returns the new generation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn activate(&self, defs: Vec<TaskDefinition>) -> u64 {
        let now = Utc::now();

        let mut accepted: Vec<(TaskDefinition, ScheduleSpec)> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();
        for def in defs {
            if !def.enabled {
                debug!(task = %def.name, "skipping disabled task");
                continue;
            }
            match self.validate(&def, &seen) {
                Ok(spec) => {
                    seen.insert(def.id);
                    accepted.push((def, spec));
                }
                Err(error) => {
                    warn!(task = %def.name, %error, "task rejected");
                    self.sinks
                        .error(ScheduleError::new(&def.name, error.to_string()));
                }
            }
        }

        let (generation, cancel, tasks) = {
            let mut active = self.active.lock();
            active.cancel.cancel();
            active.generation += 1;
            active.cancel = CancellationToken::new();
            let generation = active.generation;

            let mut armed = Vec::with_capacity(accepted.len());
            active.tasks = accepted
                .into_iter()
                .map(|(def, spec)| {
                    let id = def.id;
                    let task = Arc::new(ScheduledTask {
                        def,
                        spec,
                        generation,
                        running: AtomicBool::new(false),
                    });
                    armed.push(task.clone());
                    (id, task)
                })
                .collect();
            (generation, active.cancel.clone(), armed)
        };

        info!(generation, tasks = tasks.len(), "task set activated");

        for task in tasks {
            // Run-now precedes the interval timers; the registration
            // instant itself belongs to it.
            fire(&self.dispatcher, &task, &cancel);
            for interval in &task.spec.intervals {
                let mut stream = interval_runs(interval, now);
                stream.seek_after(now);
                spawn_interval_timer(
                    self.dispatcher.clone(),
                    task.clone(),
                    stream,
                    cancel.clone(),
                );
            }
        }
        generation
    }

    /// Cancel the current generation entirely. Idempotent; after this
    /// returns, the canceled generation produces no further output
    /// beyond at most one already-queued callback.
    pub fn deactivate(&self) {
        let mut active = self.active.lock();
        active.cancel.cancel();
        active.tasks.clear();
        debug!(generation = active.generation, "generation deactivated");
    }

    /// Immediate out-of-band run for active tasks by id, subject to the
    /// same single-flight rule as a timer fire. Unknown ids are logged
    /// and skipped.
    pub fn dispatch_once(&self, ids: &[u64]) {
        let active = self.active.lock();
        for id in ids {
            match active.tasks.get(id) {
                Some(task) => {
                    debug!(id, task = %task.def.name, "out-of-band run requested");
                    fire(&self.dispatcher, task, &active.cancel);
                }
                None => debug!(id, "ignoring run request for unknown task id"),
            }
        }
    }

    fn validate(&self, def: &TaskDefinition, seen: &HashSet<u64>) -> bw_domain::Result<ScheduleSpec> {
        if seen.contains(&def.id) {
            return Err(Error::DuplicateTaskId { id: def.id }.for_task(&def.name));
        }
        let spec = bw_schedule::parse(&def.schedule).map_err(|e| e.for_task(&def.name))?;
        if !self.dispatcher.module_exists(&def.module) {
            return Err(Error::ModuleNotFound {
                module: def.module.clone(),
            }
            .for_task(&def.name));
        }
        Ok(spec)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fires and timers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hand one fire to the dispatcher unless the task is already running.
/// The run gets a child token so the generation can kill it.
fn fire(dispatcher: &Arc<Dispatcher>, task: &Arc<ScheduledTask>, generation_cancel: &CancellationToken) {
    if generation_cancel.is_cancelled() {
        return;
    }
    if task
        .running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!(
            task = %task.def.name,
            generation = task.generation,
            "dropping fire: previous run still in flight"
        );
        return;
    }

    let dispatcher = dispatcher.clone();
    let task = task.clone();
    let run_cancel = generation_cancel.child_token();
    tokio::spawn(async move {
        dispatcher.run(&task.def, run_cancel).await;
        task.running.store(false, Ordering::Release);
    });
}

/// One timer task per interval: sleep to the next projected instant,
/// fire, repeat until the stream or the generation ends.
fn spawn_interval_timer(
    dispatcher: Arc<Dispatcher>,
    task: Arc<ScheduledTask>,
    mut stream: IntervalRuns,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        while let Some(at) = stream.pop() {
            let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            fire(&dispatcher, &task, &cancel);
        }
        debug!(task = %task.def.name, generation = task.generation, "interval exhausted");
    });
}
