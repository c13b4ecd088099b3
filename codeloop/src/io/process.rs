//! Helpers for running child processes with timeouts and bounded output.
//!
//! Test and lint tools reach subprocesses only through [`CommandRunner`], so
//! tests substitute scripted runners without spawning anything.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How often a running child is checked for cancellation.
const POLL_SLICE: Duration = Duration::from_millis(50);

/// Parameters for one subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub timeout: Duration,
    /// Bytes of stdout/stderr kept in memory; the rest is drained and counted.
    pub output_limit_bytes: usize,
}

impl CommandRequest {
    /// Build a request from an argv array. Returns `None` for an empty argv.
    pub fn from_argv(
        argv: &[String],
        workdir: PathBuf,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            workdir,
            timeout,
            output_limit_bytes,
        })
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured child process output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    /// Killed because the caller's token was cancelled.
    pub cancelled: bool,
}

impl CommandOutput {
    pub fn stdout_truncated_notice(&self, label: &str) -> String {
        if self.stdout_truncated > 0 {
            format!(
                "\n[{label} stdout truncated {} bytes]\n",
                self.stdout_truncated
            )
        } else {
            String::new()
        }
    }

    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }

    /// Stdout and stderr as one lossy UTF-8 report.
    pub fn combined_text(&self, label: &str) -> String {
        let mut buf = String::new();
        buf.push_str("=== stdout ===\n");
        buf.push_str(&String::from_utf8_lossy(&self.stdout));
        buf.push_str(&self.stdout_truncated_notice(label));
        buf.push_str("\n=== stderr ===\n");
        buf.push_str(&String::from_utf8_lossy(&self.stderr));
        buf.push_str(&self.stderr_truncated_notice(label));
        buf
    }
}

/// Abstraction over subprocess execution.
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion, until `request.timeout` elapses, or
    /// until `cancel` fires. The child is killed in the last two cases.
    ///
    /// Timeouts and cancellation are reported through `CommandOutput`, not as
    /// errors. Errors are reserved for failures to spawn or wait.
    fn run(&self, request: &CommandRequest, cancel: &CancellationToken) -> Result<CommandOutput>;
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    #[instrument(skip_all, fields(program = %request.program, timeout_secs = request.timeout.as_secs()))]
    fn run(&self, request: &CommandRequest, cancel: &CancellationToken) -> Result<CommandOutput> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args).current_dir(&request.workdir);
        run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes, cancel)
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
/// The child is waited on in short slices so a cancelled `cancel` kills it promptly.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
    cancel: &CancellationToken,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let deadline = Instant::now() + timeout;
    let mut timed_out = false;
    let mut cancelled = false;
    let status = loop {
        let now = Instant::now();
        if cancel.is_cancelled() {
            warn!("command cancelled, killing");
            cancelled = true;
        } else if now >= deadline {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
        }
        if timed_out || cancelled {
            child.kill().context("kill command")?;
            break child.wait().context("wait command after kill")?;
        }
        let slice = POLL_SLICE.min(deadline - now);
        if let Some(status) = child.wait_timeout(slice).context("wait for command")? {
            break status;
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, cancelled, "command finished");
    Ok(CommandOutput {
        exit_code: status.code(),
        success: status.success() && !timed_out && !cancelled,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
        cancelled,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_argv_splits_program_and_args() {
        let argv = vec!["cargo".to_string(), "test".to_string(), "-q".to_string()];
        let request =
            CommandRequest::from_argv(&argv, PathBuf::from("."), Duration::from_secs(1), 10)
                .expect("request");
        assert_eq!(request.program, "cargo");
        assert_eq!(request.args, vec!["test", "-q"]);
        assert_eq!(request.display(), "cargo test -q");
        assert!(
            CommandRequest::from_argv(&[], PathBuf::from("."), Duration::from_secs(1), 10)
                .is_none()
        );
    }

    #[test]
    fn read_stream_limited_counts_dropped_bytes() {
        let (kept, truncated) = read_stream_limited(&b"abcdefghij"[..], 4).expect("read");
        assert_eq!(kept, b"abcd");
        assert_eq!(truncated, 6);
    }

    #[test]
    fn combined_text_reports_truncation() {
        let output = CommandOutput {
            stdout: b"ok".to_vec(),
            stderr_truncated: 12,
            ..CommandOutput::default()
        };
        let text = output.combined_text("tests");
        assert!(text.contains("=== stdout ===\nok"));
        assert!(text.contains("[tests stderr truncated 12 bytes]"));
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_captures_exit_code_and_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = CommandRequest {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
            workdir: temp.path().to_path_buf(),
            timeout: Duration::from_secs(10),
            output_limit_bytes: 1000,
        };
        let output = ProcessRunner
            .run(&request, &CancellationToken::new())
            .expect("run");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success);
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "err\n");
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_kills_on_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = CommandRequest {
            program: "sleep".to_string(),
            args: vec!["5".to_string()],
            workdir: temp.path().to_path_buf(),
            timeout: Duration::from_millis(100),
            output_limit_bytes: 1000,
        };
        let output = ProcessRunner
            .run(&request, &CancellationToken::new())
            .expect("run");
        assert!(output.timed_out);
        assert!(!output.success);
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_kills_on_cancel() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = CommandRequest {
            program: "sleep".to_string(),
            args: vec!["5".to_string()],
            workdir: temp.path().to_path_buf(),
            timeout: Duration::from_secs(30),
            output_limit_bytes: 1000,
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });

        let started = Instant::now();
        let output = ProcessRunner.run(&request, &cancel).expect("run");
        canceller.join().expect("canceller");
        assert!(output.cancelled);
        assert!(!output.timed_out);
        assert!(!output.success);
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
