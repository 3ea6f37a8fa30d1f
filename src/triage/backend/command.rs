//! Process-backed analysis service.
//!
//! Runs a configured command-line client, writes the prompt to its stdin and
//! reads the generated text from stdout. Model parameters are passed through
//! environment variables so any wrapper script can forward them to the real
//! service.

use super::{classify_failure, AnalysisRequest, AnalysisService, ServiceError, ServiceResult};
use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Environment variable carrying the model name.
pub const MODEL_ENV: &str = "LOGSIFT_MODEL";
/// Environment variable carrying the output token ceiling.
pub const MAX_OUTPUT_TOKENS_ENV: &str = "LOGSIFT_MAX_OUTPUT_TOKENS";
/// Environment variable carrying the sampling temperature.
pub const TEMPERATURE_ENV: &str = "LOGSIFT_TEMPERATURE";

/// Analysis service that shells out to a CLI client.
#[derive(Debug, Clone)]
pub struct CommandService {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandService {
    /// Create a service for `command` with extra arguments and a per-call timeout.
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    /// The command this service runs.
    pub fn command(&self) -> &str {
        &self.command
    }

    fn render_stdin(request: &AnalysisRequest) -> String {
        if request.system_prompt.is_empty() {
            request.user_prompt.clone()
        } else {
            format!("{}\n\n{}", request.system_prompt, request.user_prompt)
        }
    }
}

impl AnalysisService for CommandService {
    fn name(&self) -> &str {
        &self.command
    }

    fn is_available(&self) -> bool {
        super::command_exists(&self.command)
    }

    fn analyze(&self, request: &AnalysisRequest) -> ServiceResult<String> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .env(MODEL_ENV, &request.model)
            .env(MAX_OUTPUT_TOKENS_ENV, request.max_output_tokens.to_string())
            .env(TEMPERATURE_ENV, request.temperature.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;

        // Drain output on background threads so a chatty child never blocks
        // on a full pipe while we are still writing the prompt.
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(Self::render_stdin(request).as_bytes()) {
                // A client that fails fast may exit before reading its input
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ServiceError::Io(e));
                }
            }
            // stdin is dropped here, closing the pipe
        }

        let status = match wait_with_timeout(&mut child, self.timeout) {
            Ok(status) => status,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(ServiceError::Timeout(self.timeout))
            }
            Err(e) => return Err(ServiceError::Io(e)),
        };

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);

        if status.success() {
            return Ok(stdout);
        }

        tracing::debug!(
            command = %self.command,
            code = ?status.code(),
            "analysis command failed"
        );

        // Some clients report errors on stdout
        let failure = if stderr.trim().is_empty() { stdout } else { stderr };
        Err(classify_failure(&failure))
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf).ok();
        buf
    })
}

fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).to_string())
        .unwrap_or_default()
}

/// Wait for a child process with a timeout.
///
/// Polls `try_wait` since std::process has no native timeout. The child is
/// killed and reaped when the timeout elapses.
pub(crate) fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> std::io::Result<ExitStatus> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(50);

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if start.elapsed() >= timeout {
            // Kill and reap to prevent a zombie process
            let _ = child.kill();
            let _ = child.wait();
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Process timed out",
            ));
        }
        std::thread::sleep(poll_interval);
    }
}
