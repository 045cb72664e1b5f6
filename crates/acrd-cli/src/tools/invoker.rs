//! Running external device tools.
//!
//! The invoker is the only place that spawns processes. It checks the
//! executable before spawning, captures both streams, bounds the child with a
//! deadline and classifies every failure as a [`ToolFailure`].

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use acrd_core::error::ToolFailure;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default upper bound for a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl Invocation {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Spawns tools and waits for them, one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInvoker {
    timeout: Option<Duration>,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self::new(Some(DEFAULT_TOOL_TIMEOUT))
    }
}

impl ProcessInvoker {
    /// Create an invoker. `None` disables the deadline.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Run `executable` and require a zero exit status.
    pub async fn run<S: AsRef<OsStr>>(
        &self,
        executable: &Path,
        args: &[S],
    ) -> Result<Invocation, ToolFailure> {
        let invocation = self.output(executable, args).await?;
        if invocation.success() {
            Ok(invocation)
        } else {
            Err(ToolFailure::NonZeroExit {
                tool: tool_name(executable),
                exit_code: invocation.exit_code,
                stderr: invocation.stderr,
            })
        }
    }

    /// Run `executable` and return its output whatever the exit status.
    ///
    /// Only a missing executable, a spawn error or the deadline fail.
    pub async fn output<S: AsRef<OsStr>>(
        &self,
        executable: &Path,
        args: &[S],
    ) -> Result<Invocation, ToolFailure> {
        ensure_executable(executable)?;

        let tool = tool_name(executable);
        debug!("Running {} {}", executable.display(), display_args(args));

        let child = Command::new(executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolFailure::not_found(executable, e.to_string()))?;

        // Dropping the future on timeout drops the child, which kills it.
        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    warn!("{} did not finish within {:?}, killed", tool, limit);
                    return Err(ToolFailure::Timeout { tool, after: limit });
                }
            },
            None => child.wait_with_output().await,
        };

        let output = waited.map_err(|e| ToolFailure::NonZeroExit {
            tool: tool.clone(),
            exit_code: None,
            stderr: format!("failed to collect output: {}", e),
        })?;

        let invocation = Invocation {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        debug!(
            "{} exited with {:?} ({} bytes stdout, {} bytes stderr)",
            tool,
            invocation.exit_code,
            invocation.stdout.len(),
            invocation.stderr.len()
        );
        Ok(invocation)
    }
}

/// Fail with `NotFound` unless `path` is a file we could execute.
pub fn ensure_executable(path: &Path) -> Result<(), ToolFailure> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| ToolFailure::not_found(path, e.to_string()))?;

    if !metadata.is_file() {
        return Err(ToolFailure::not_found(path, "not a regular file"));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(ToolFailure::not_found(path, "file is not executable"));
        }
    }

    Ok(())
}

/// Short name of a tool for messages, e.g. `adb` for `/opt/pt/adb`.
pub fn tool_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn display_args<S: AsRef<OsStr>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| arg.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
