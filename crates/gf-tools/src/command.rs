//! Builder for executing external tool commands with timeout support.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use gf_tools::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> gf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("gifsicle"))
///     .arg("-O3")
///     .arg("in.gif")
///     .arg("-o")
///     .arg("out.gif")
///     .execute()
///     .await?;
/// println!("{}", output.stderr);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    /// Name reported in errors; defaults to the program's file name.
    label: Option<String>,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            label: None,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Report failures under `label` instead of the program name.
    pub fn label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Some(label.into());
        self
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn tool_name(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`gf_core::Error::Tool`] if spawning fails, the process exits
    /// with a non-zero status (message includes stderr), or the timeout
    /// expires.
    pub async fn execute(&self) -> gf_core::Result<ToolOutput> {
        let tool = self.tool_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(tool = %tool, args = ?self.args, "Spawning");

        let child = cmd
            .spawn()
            .map_err(|e| gf_core::Error::tool(&tool, format!("failed to spawn: {e}")))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(gf_core::Error::tool(
                        tool,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(gf_core::Error::tool(
                tool,
                format!("I/O error waiting for process: {e}"),
            )),
            // The dropped future kills the child (kill_on_drop).
            Err(_elapsed) => Err(gf_core::Error::tool(
                tool,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn execute_echo() {
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await;

        match output {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        assert_matches!(result, Err(gf_core::Error::Tool { .. }));
    }

    #[tokio::test]
    async fn label_names_the_failure() {
        let err = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .label("gifsicle")
            .execute()
            .await
            .unwrap_err();
        assert_matches!(err, gf_core::Error::Tool { ref tool, .. } if tool == "gifsicle");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_error() {
        let err = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo broken >&2; exit 3"])
            .execute()
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("broken"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_fires() {
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }
}
