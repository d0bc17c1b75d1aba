//! Module registry and process launcher.
//!
//! One subdirectory of the configured modules directory per module; an
//! optional `module.toml` picks the entry file and adds environment
//! variables. Scanning happens once at construction, the registry is
//! immutable afterwards.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bw_domain::{RunnerConfig, TaskParam};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Invocation, ModuleRunner, RunOutcome};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ProcessRunner {
    modules: BTreeMap<String, ModuleEntry>,
    modules_dir: PathBuf,
    max_output_bytes: usize,
}

struct ModuleEntry {
    dir: PathBuf,
    command: PathBuf,
    env: Vec<String>,
}

/// Optional per-module descriptor (`module.toml`).
#[derive(Debug, Default, Deserialize)]
struct ModuleDescriptor {
    /// Entry file name inside the module directory.
    command: Option<String>,
    /// Extra environment variables for every run.
    #[serde(default)]
    env: BTreeMap<String, String>,
}

impl ProcessRunner {
    /// Scan `modules_dir` for module subdirectories. A missing or
    /// unreadable directory leaves the registry empty rather than
    /// failing construction.
    pub fn scan(config: &RunnerConfig) -> Self {
        let mut modules = BTreeMap::new();
        let entries = match std::fs::read_dir(&config.modules_dir) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(
                    dir = %config.modules_dir.display(),
                    %error,
                    "modules directory not readable"
                );
                return Self {
                    modules,
                    modules_dir: config.modules_dir.clone(),
                    max_output_bytes: config.max_output_bytes,
                };
            }
        };

        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let descriptor = load_descriptor(&dir);
            let command = dir.join(descriptor.command.as_deref().unwrap_or(&config.default_entry));
            let env = descriptor
                .env
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            debug!(module = %name, command = %command.display(), "registered module");
            modules.insert(name, ModuleEntry { dir, command, env });
        }

        info!(
            dir = %config.modules_dir.display(),
            modules = modules.len(),
            "scanned check modules"
        );
        Self {
            modules,
            modules_dir: config.modules_dir.clone(),
            max_output_bytes: config.max_output_bytes,
        }
    }
}

fn load_descriptor(dir: &Path) -> ModuleDescriptor {
    let path = dir.join("module.toml");
    if !path.exists() {
        return ModuleDescriptor::default();
    }
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring unreadable module descriptor");
            return ModuleDescriptor::default();
        }
    };
    match toml::from_str(&raw) {
        Ok(descriptor) => descriptor,
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring malformed module descriptor");
            ModuleDescriptor::default()
        }
    }
}

impl ModuleEntry {
    fn invocation(&self, params: &[TaskParam]) -> Invocation {
        let mut env: Vec<String> = params
            .iter()
            .map(|p| format!("{}={}", p.key, p.value))
            .collect();
        env.extend(self.env.iter().cloned());
        Invocation {
            path: self.command.clone(),
            args: params.iter().map(|p| p.value.clone()).collect(),
            env,
            dir: self.dir.clone(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl ModuleRunner for ProcessRunner {
    fn exists(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    fn modules(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    async fn run(
        &self,
        module: &str,
        params: &[TaskParam],
        cancel: CancellationToken,
    ) -> RunOutcome {
        let Some(entry) = self.modules.get(module) else {
            // Validation happens at scheduling time, so hitting this
            // means the caller bypassed it.
            return RunOutcome::LaunchFailed {
                invocation: Invocation {
                    path: PathBuf::from(module),
                    args: params.iter().map(|p| p.value.clone()).collect(),
                    env: Vec::new(),
                    dir: self.modules_dir.clone(),
                },
                error: io::Error::new(io::ErrorKind::NotFound, "module not in registry"),
            };
        };

        let invocation = entry.invocation(params);

        let mut cmd = Command::new(&invocation.path);
        cmd.args(&invocation.args);
        cmd.current_dir(&invocation.dir);
        for pair in &invocation.env {
            if let Some((key, value)) = pair.split_once('=') {
                cmd.env(key, value);
            }
        }
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(error) => {
                return RunOutcome::LaunchFailed { invocation, error };
            }
        };

        let stdout_task = tokio::spawn(read_capped(child.stdout.take(), self.max_output_bytes));
        let stderr_task = tokio::spawn(read_capped(child.stderr.take(), self.max_output_bytes));

        tokio::select! {
            result = child.wait() => {
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                match result {
                    Ok(status) => RunOutcome::Exited { status, stdout, stderr, invocation },
                    Err(error) => RunOutcome::LaunchFailed { invocation, error },
                }
            }
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                stdout_task.abort();
                stderr_task.abort();
                debug!(module = %module, "module run canceled");
                RunOutcome::Canceled
            }
        }
    }
}

/// Drain a child stream line by line, keeping at most `cap` bytes.
/// Draining continues past the cap so the child never blocks on a full
/// pipe.
async fn read_capped<R>(stream: Option<R>, cap: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return String::new();
    };
    let mut out = String::new();
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if out.len() < cap {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn runner_at(root: &Path) -> ProcessRunner {
        ProcessRunner::scan(&RunnerConfig {
            modules_dir: root.to_path_buf(),
            ..RunnerConfig::default()
        })
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    fn write_module(root: &Path, name: &str, body: &str) {
        write_script(&root.join(name), "run.sh", body);
    }

    #[test]
    fn scan_registers_subdirectories_only() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("alpha")).unwrap();
        fs::create_dir(tmp.path().join("beta")).unwrap();
        fs::write(tmp.path().join("stray-file"), "ignored").unwrap();

        let runner = runner_at(tmp.path());
        assert_eq!(runner.modules(), vec!["alpha", "beta"]);
        assert!(runner.exists("alpha"));
        assert!(!runner.exists("stray-file"));
        assert!(!runner.exists("gamma"));
    }

    #[test]
    fn missing_modules_dir_yields_empty_registry() {
        let tmp = TempDir::new().unwrap();
        let runner = runner_at(&tmp.path().join("does-not-exist"));
        assert!(runner.modules().is_empty());
    }

    #[test]
    fn malformed_descriptor_keeps_the_module_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("broken");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("module.toml"), "command = [not toml").unwrap();

        let runner = runner_at(tmp.path());
        assert!(runner.exists("broken"));
        assert_eq!(
            runner.modules["broken"].command,
            dir.join("run.sh"),
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_streams_and_exit_status() {
        let tmp = TempDir::new().unwrap();
        write_module(
            tmp.path(),
            "failing",
            "#!/bin/sh\necho out-line\necho err-line >&2\nexit 3\n",
        );
        let runner = runner_at(tmp.path());

        match runner.run("failing", &[], CancellationToken::new()).await {
            RunOutcome::Exited {
                status,
                stdout,
                stderr,
                invocation,
            } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stdout, "out-line\n");
                assert_eq!(stderr, "err-line\n");
                assert!(invocation.path.ends_with("failing/run.sh"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn params_become_args_and_env() {
        let tmp = TempDir::new().unwrap();
        write_module(tmp.path(), "echoer", "#!/bin/sh\necho \"arg=$1 env=$LEVEL\"\n");
        let runner = runner_at(tmp.path());

        let params = vec![TaskParam::new("LEVEL", "2")];
        match runner.run("echoer", &params, CancellationToken::new()).await {
            RunOutcome::Exited { stdout, invocation, .. } => {
                assert_eq!(stdout, "arg=2 env=2\n");
                assert_eq!(invocation.args, vec!["2"]);
                assert_eq!(invocation.env, vec!["LEVEL=2"]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn descriptor_picks_entry_and_env() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("custom");
        write_script(&dir, "check.sh", "#!/bin/sh\necho \"mode=$MODE\"\n");
        fs::write(
            dir.join("module.toml"),
            "command = \"check.sh\"\n\n[env]\nMODE = \"fast\"\n",
        )
        .unwrap();
        let runner = runner_at(tmp.path());

        match runner.run("custom", &[], CancellationToken::new()).await {
            RunOutcome::Exited { stdout, invocation, .. } => {
                assert_eq!(stdout, "mode=fast\n");
                assert!(invocation.path.ends_with("custom/check.sh"));
                assert_eq!(invocation.env, vec!["MODE=fast"]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_entry_is_a_launch_failure() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("hollow")).unwrap();
        let runner = runner_at(tmp.path());

        match runner.run("hollow", &[], CancellationToken::new()).await {
            RunOutcome::LaunchFailed { invocation, error } => {
                assert!(invocation.path.ends_with("hollow/run.sh"));
                assert_eq!(error.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_module_is_a_launch_failure() {
        let tmp = TempDir::new().unwrap();
        let runner = runner_at(tmp.path());

        match runner.run("ghost", &[], CancellationToken::new()).await {
            RunOutcome::LaunchFailed { error, .. } => {
                assert_eq!(error.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancel_kills_a_sleeping_child() {
        let tmp = TempDir::new().unwrap();
        write_module(tmp.path(), "sleepy", "#!/bin/sh\nsleep 5\n");
        let runner = runner_at(tmp.path());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = runner.run("sleepy", &[], cancel).await;
        assert!(matches!(outcome, RunOutcome::Canceled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_capture_is_capped() {
        let tmp = TempDir::new().unwrap();
        write_module(
            tmp.path(),
            "chatty",
            "#!/bin/sh\ni=0\nwhile [ $i -lt 1000 ]; do echo 0123456789; i=$((i+1)); done\n",
        );
        let runner = ProcessRunner::scan(&RunnerConfig {
            modules_dir: tmp.path().to_path_buf(),
            max_output_bytes: 64,
            ..RunnerConfig::default()
        });

        match runner.run("chatty", &[], CancellationToken::new()).await {
            RunOutcome::Exited { stdout, .. } => {
                // The cap may overshoot by one line, never by more.
                assert!(stdout.len() <= 64 + 11, "len {}", stdout.len());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
