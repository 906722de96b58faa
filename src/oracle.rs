//! Test oracle that runs a shell command against the candidate code.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::workflow::{TestOracle, TestVerdict};

/// Writes the candidate to `scratch` and runs `command` through `sh -c`.
///
/// `{file}` in the command is replaced by the scratch path; the code is also
/// piped to stdin. Exit status 0 passes. Any other status fails with stderr,
/// or stdout when stderr is empty.
pub struct CommandOracle {
    command: String,
    scratch: PathBuf,
}

impl CommandOracle {
    pub fn new(command: impl Into<String>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            scratch: scratch.into(),
        }
    }

    fn rendered(&self) -> String {
        self.command
            .replace("{file}", &self.scratch.display().to_string())
    }

    async fn run(&self, code: &str) -> std::io::Result<std::process::Output> {
        if let Some(parent) = self.scratch.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.scratch, code).await?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(self.rendered())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            // The command may exit without reading stdin.
            if let Err(e) = stdin.write_all(code.as_bytes()).await {
                debug!(error = %e, "test command closed stdin early");
            }
        }
        child.wait_with_output().await
    }
}

#[async_trait]
impl TestOracle for CommandOracle {
    async fn check(&self, code: &str) -> TestVerdict {
        let output = match self.run(code).await {
            Ok(output) => output,
            Err(e) => {
                warn!(command = %self.command, error = %e, "test command could not run");
                return TestVerdict::Fail(format!("failed to run `{}`: {e}", self.command));
            }
        };
        if output.status.success() {
            return TestVerdict::Pass;
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("test command exited with {}", output.status));
        debug!(command = %self.command, %message, "test command failed");
        TestVerdict::Fail(message)
    }
}
