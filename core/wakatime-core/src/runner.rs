//! Runs wakatime-cli off the caller's thread.
//!
//! ## Behavior
//!
//! - The payload (if any) is written followed by `\n`, then stdin is closed.
//!   wakatime-cli closes the pipe itself after the newline, so errors while
//!   closing are expected and ignored.
//! - Debug mode waits for exit and logs stdout, stderr and the exit code.
//!   Otherwise the child is handed to a reaper thread and the worker moves on.
//! - Failures are logged, never retried. A Windows permission error (usually
//!   endpoint security blocking the binary) is reported to the user once.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::command::CliInvocation;
use crate::error::{Result, TrackerError};
use crate::notify::Notifier;
use crate::worker::WorkerPool;

const SECURITY_BLOCK_TITLE: &str = "Error";

/// Where the flush scheduler hands finished command lines.
pub trait Launcher: Send + Sync {
    /// Starts `invocation` without blocking the caller.
    fn launch(&self, invocation: CliInvocation);
}

/// What a debug-mode run observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    pub workers: usize,
    pub debug: bool,
    /// Enables the Windows security-block detection.
    pub windows: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            debug: false,
            windows: cfg!(windows),
        }
    }
}

pub struct ProcessRunner {
    pool: WorkerPool,
    shared: Arc<RunnerShared>,
}

struct RunnerShared {
    debug: bool,
    windows: bool,
    notifier: Arc<dyn Notifier>,
    security_warned: AtomicBool,
}

impl ProcessRunner {
    pub fn new(config: RunnerConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let pool = WorkerPool::new("wakatime-send", config.workers)?;
        Ok(Self {
            pool,
            shared: Arc::new(RunnerShared {
                debug: config.debug,
                windows: config.windows,
                notifier,
                security_warned: AtomicBool::new(false),
            }),
        })
    }

    /// Waits up to `timeout` for in-flight sends. True if all finished.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.pool.shutdown(timeout)
    }
}

impl Launcher for ProcessRunner {
    fn launch(&self, invocation: CliInvocation) {
        let shared = Arc::clone(&self.shared);
        if let Err(err) = self.pool.execute(move || shared.run(&invocation)) {
            tracing::warn!(error = %err, "Dropping heartbeats; sender is shut down");
        }
    }
}

impl RunnerShared {
    fn run(&self, invocation: &CliInvocation) {
        let err = match execute(invocation, self.debug) {
            Ok(_) => return,
            Err(err) => err,
        };
        tracing::warn!(error = %err, "Failed to send heartbeats to wakatime-cli");

        let blocked = err
            .io_source()
            .map(|source| is_security_block(source, self.windows))
            .unwrap_or(false);
        if blocked && !self.security_warned.swap(true, Ordering::SeqCst) {
            let program = invocation.program().unwrap_or("wakatime-cli");
            self.notifier.warn_user(
                SECURITY_BLOCK_TITLE,
                &format!(
                    "Microsoft Defender is blocking WakaTime. Please allow {} to run so WakaTime can upload code stats to your dashboard.",
                    program
                ),
            );
        }
    }
}

/// Spawns the CLI and feeds it the payload. Blocks only in debug mode.
pub fn execute(invocation: &CliInvocation, debug: bool) -> Result<Option<ExitReport>> {
    let program = invocation.program().ok_or(TrackerError::EmptyCommand)?;
    tracing::debug!(argv = ?invocation.redacted_argv(), "Executing CLI");

    let mut command = Command::new(program);
    command.args(invocation.args());
    command.stdin(if invocation.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    if debug {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let mut child = command.spawn().map_err(|source| TrackerError::Spawn {
        program: PathBuf::from(program),
        source,
    })?;

    if let (Some(payload), Some(stdin)) = (invocation.stdin.as_deref(), child.stdin.take()) {
        tracing::debug!(payload = %payload, "Writing extra heartbeats");
        if let Err(err) = write_payload(stdin, payload) {
            tracing::warn!(error = %err, "Extra heartbeats may not have reached wakatime-cli");
        }
    }

    if !debug {
        reap(child);
        return Ok(None);
    }

    let output = child.wait_with_output().map_err(|source| TrackerError::Wait {
        program: PathBuf::from(program),
        source,
    })?;
    let report = ExitReport {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    for line in report.stdout.lines().chain(report.stderr.lines()) {
        tracing::debug!("{}", line);
    }
    tracing::debug!(code = ?report.code, "Command finished");
    Ok(Some(report))
}

fn write_payload(mut stdin: ChildStdin, payload: &str) -> Result<()> {
    stdin
        .write_all(payload.as_bytes())
        .and_then(|_| stdin.write_all(b"\n"))
        .map_err(TrackerError::Stdin)?;
    let _ = stdin.flush();
    Ok(())
}

fn reap(mut child: Child) {
    let spawned = thread::Builder::new()
        .name("wakatime-reaper".to_string())
        .spawn(move || {
            let _ = child.wait();
        });
    if let Err(err) = spawned {
        tracing::debug!(error = %err, "Failed to spawn reaper thread");
    }
}

/// Whether a spawn/write failure looks like security software blocking
/// the binary.
pub fn is_security_block(err: &std::io::Error, windows: bool) -> bool {
    windows
        && (err.kind() == std::io::ErrorKind::PermissionDenied
            || err.to_string().contains("Access is denied"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use std::io;

    #[test]
    fn security_block_only_on_windows() {
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(is_security_block(&denied, true));
        assert!(!is_security_block(&denied, false));
    }

    #[test]
    fn security_block_matches_message_text() {
        let denied = io::Error::new(io::ErrorKind::Other, "CreateProcess: Access is denied. (os error 5)");
        assert!(is_security_block(&denied, true));

        let missing = io::Error::new(io::ErrorKind::NotFound, "not found");
        assert!(!is_security_block(&missing, true));
    }

    #[test]
    fn empty_invocation_is_rejected() {
        let invocation = CliInvocation {
            argv: Vec::new(),
            stdin: None,
        };
        assert!(matches!(
            execute(&invocation, false),
            Err(TrackerError::EmptyCommand)
        ));
    }

    #[test]
    fn missing_binary_reports_spawn_error() {
        let invocation = CliInvocation {
            argv: vec!["/definitely/not/wakatime-cli".to_string()],
            stdin: None,
        };
        let err = execute(&invocation, true).unwrap_err();
        assert!(matches!(err, TrackerError::Spawn { .. }));
        assert_eq!(
            err.io_source().map(io::Error::kind),
            Some(io::ErrorKind::NotFound)
        );
    }

    #[cfg(unix)]
    fn blocked_runner(windows: bool) -> (ProcessRunner, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let runner = ProcessRunner::new(
            RunnerConfig {
                windows,
                ..RunnerConfig::default()
            },
            notifier.clone(),
        )
        .unwrap();
        (runner, notifier)
    }

    /// A file without exec bits fails to spawn with `PermissionDenied`.
    #[cfg(unix)]
    fn not_executable() -> (tempfile::TempPath, CliInvocation) {
        let file = tempfile::NamedTempFile::new().unwrap().into_temp_path();
        let invocation = CliInvocation {
            argv: vec![file.to_string_lossy().into_owned()],
            stdin: None,
        };
        (file, invocation)
    }

    #[cfg(unix)]
    #[test]
    fn blocked_spawn_warns_the_user_once() {
        let (_file, invocation) = not_executable();
        let err = execute(&invocation, false).unwrap_err();
        assert_eq!(
            err.io_source().map(io::Error::kind),
            Some(io::ErrorKind::PermissionDenied)
        );

        let (runner, notifier) = blocked_runner(true);
        runner.launch(invocation.clone());
        runner.launch(invocation);
        assert!(runner.shutdown(Duration::from_secs(5)));
        assert_eq!(notifier.titles(), vec!["Error".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn blocked_spawn_is_only_logged_off_windows() {
        let (_file, invocation) = not_executable();
        let (runner, notifier) = blocked_runner(false);
        runner.launch(invocation);
        assert!(runner.shutdown(Duration::from_secs(5)));
        assert!(notifier.titles().is_empty());
    }
}
