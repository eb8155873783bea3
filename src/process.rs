//! Blocking subprocess execution with a timeout.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Minimum wait for output readers once the child has exited.
const READ_GRACE: Duration = Duration::from_millis(200);

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout and stderr joined, for matching and error messages.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, _) => self.stderr.trim_end().to_string(),
        }
    }
}

/// A command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout,
        }
    }

    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// `program arg1 arg2`, for logs and operator hints.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Like [`display`](Self::display), with the value of every `-e KEY=VALUE`
    /// replaced by `<redacted>`. Used wherever the command line is logged or
    /// shown to the operator.
    pub fn redacted(&self) -> String {
        let mut parts = vec![self.program.clone()];
        let mut after_env_flag = false;
        for arg in &self.args {
            match arg.split_once('=') {
                Some((key, _)) if after_env_flag => parts.push(format!("{}=<redacted>", key)),
                _ => parts.push(arg.clone()),
            }
            after_env_flag = arg == "-e" || arg == "--env";
        }
        parts.join(" ")
    }
}

/// Runs external commands. Swapped for a scripted runner in tests.
pub trait CommandRunner {
    /// Whether `program` can be found on `PATH`.
    fn is_available(&self, program: &str) -> bool;

    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        debug!("Running `{}` (timeout {:?})", spec.redacted(), spec.timeout);

        // Resolve through PATH/PATHEXT so `npm.cmd` works on Windows.
        let program = which::which(&spec.program).unwrap_or_else(|_| PathBuf::from(&spec.program));
        let mut cmd = Command::new(program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::NotFound(spec.program.clone())
            } else {
                ProcessError::Spawn(spec.program.clone(), e)
            }
        })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= spec.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProcessError::TimedOut(spec.redacted(), spec.timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(ProcessError::Wait(spec.program.clone(), e)),
            }
        };

        // A grandchild can keep the pipes open after the child exits, so the
        // readers are only waited on until the deadline.
        let deadline = started + spec.timeout;
        let output = CommandOutput {
            code: status.code(),
            stdout: collect(stdout, deadline, spec)?,
            stderr: collect(stderr, deadline, spec)?,
        };
        debug!("`{}` exited with {:?}", spec.redacted(), output.code);
        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

fn collect(
    reader: Option<mpsc::Receiver<String>>,
    deadline: Instant,
    spec: &CommandSpec,
) -> Result<String, ProcessError> {
    let Some(rx) = reader else {
        return Ok(String::new());
    };
    let wait = deadline.saturating_duration_since(Instant::now()).max(READ_GRACE);
    match rx.recv_timeout(wait) {
        Ok(text) => Ok(text),
        Err(mpsc::RecvTimeoutError::Disconnected) => Ok(String::new()),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(ProcessError::TimedOut(spec.redacted(), spec.timeout))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    NotFound(String),
    #[error("Failed to start {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("Failed waiting for {0}: {1}")]
    Wait(String, std::io::Error),
    #[error("`{0}` did not finish within {1:?}")]
    TimedOut(String, Duration),
}
