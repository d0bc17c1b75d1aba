//! Resolved command line for one module run.

use std::fmt;
use std::path::PathBuf;

/// Everything needed to start a module process, and the context echoed
/// into failure details. The `Display` rendering is part of the
/// reporting contract: consumers grep for it, so the shape must stay
/// stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Entry file, absolute.
    pub path: PathBuf,
    /// Task parameter values, in declared order.
    pub args: Vec<String>,
    /// `key=value` pairs added to the child environment.
    pub env: Vec<String>,
    /// Working directory (the module directory).
    pub dir: PathBuf,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Path={} Args=[{}] Env=[{}] Dir={}}}",
            self.path.display(),
            self.args.join(" "),
            self.env.join(" "),
            self.dir.display(),
        )
    }
}
