//! Shared error type used across all benchwarden crates.
//!
//! The schedule/module message texts are load-bearing: the embedder's
//! tests match them verbatim, so they must not be reworded.

/// Shared error type used across all benchwarden crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not parse duration from schedule {schedule}: did not match expected pattern")]
    ScheduleDuration { schedule: String },

    #[error("Could not parse start time from schedule {schedule}: did not match expected pattern")]
    ScheduleStart { schedule: String },

    #[error("Module {module} does not exist")]
    ModuleNotFound { module: String },

    #[error("Duplicate task id {id}")]
    DuplicateTaskId { id: u64 },

    #[error("Could not schedule task {task}: {source}")]
    Task {
        task: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a validation error with the task it belongs to, producing the
    /// `Could not schedule task <name>: <cause>` shape.
    pub fn for_task(self, task: impl Into<String>) -> Error {
        Error::Task {
            task: task.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_message_is_verbatim() {
        let err = Error::ScheduleDuration {
            schedule: "PT1K1M".into(),
        };
        assert_eq!(
            err.to_string(),
            "Could not parse duration from schedule PT1K1M: did not match expected pattern"
        );
    }

    #[test]
    fn task_wrap_prefixes_the_cause() {
        let err = Error::ScheduleDuration {
            schedule: "not-a-real-schedule".into(),
        }
        .for_task("bad-task-1");
        assert_eq!(
            err.to_string(),
            "Could not schedule task bad-task-1: Could not parse duration from schedule \
             not-a-real-schedule: did not match expected pattern"
        );
    }

    #[test]
    fn module_message_is_verbatim() {
        let err = Error::ModuleNotFound {
            module: "not-a-real-module".into(),
        }
        .for_task("bad-module-1");
        assert_eq!(
            err.to_string(),
            "Could not schedule task bad-module-1: Module not-a-real-module does not exist"
        );
    }
}
