use service_core::error::AppError;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Runs external programs with a hard deadline.
///
/// The child is spawned with `kill_on_drop`, so hitting the deadline or
/// dropping the request future terminates it instead of leaving it running.
#[derive(Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Exit status is returned to the caller rather than turned into an error.
    pub async fn run(
        &self,
        program: &str,
        args: &[OsString],
        working_dir: Option<&Path>,
    ) -> Result<Output, AppError> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            program = %program,
            args = ?args,
            timeout_secs = %self.timeout.as_secs(),
            "Executing command"
        );

        let child = cmd.spawn().map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to start '{}': {}", program, e))
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::error!(
                    program = %program,
                    timeout_secs = %self.timeout.as_secs(),
                    "Command timed out, child killed"
                );
                AppError::GatewayTimeout(format!(
                    "Converter timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })??;

        tracing::debug!(
            program = %program,
            status = %output.status,
            stdout_size = output.stdout.len(),
            stderr_size = output.stderr.len(),
            "Command exited"
        );

        Ok(output)
    }
}
