//! Check-module registry and process execution.
//!
//! The engine sees module execution as a capability behind
//! [`ModuleRunner`]; [`ProcessRunner`] is the shipped implementation,
//! running one external process per fire and killing it on
//! cancellation.

pub mod invocation;
pub mod process;

use async_trait::async_trait;
use bw_domain::TaskParam;
use tokio_util::sync::CancellationToken;

pub use invocation::Invocation;
pub use process::ProcessRunner;

/// Outcome of one module run, classified for the dispatcher.
#[derive(Debug)]
pub enum RunOutcome {
    /// The child started and was reaped, with whatever exit status.
    Exited {
        status: std::process::ExitStatus,
        stdout: String,
        stderr: String,
        invocation: Invocation,
    },
    /// The child never started.
    LaunchFailed {
        invocation: Invocation,
        error: std::io::Error,
    },
    /// Cancellation won the race; the child was killed.
    Canceled,
}

/// Pluggable check-module launcher.
#[async_trait]
pub trait ModuleRunner: Send + Sync {
    /// Whether `module` is present in the registry.
    fn exists(&self, module: &str) -> bool;

    /// Registered module names, sorted.
    fn modules(&self) -> Vec<String>;

    /// Run `module` once with the given parameters. Must resolve
    /// promptly once `cancel` fires, with the child gone.
    async fn run(
        &self,
        module: &str,
        params: &[TaskParam],
        cancel: CancellationToken,
    ) -> RunOutcome;
}
