//! A [`Tool`] backed by an external command configured in TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use gf_core::config::CommandToolConfig;
use gf_template::Params;

use crate::args::ArgContext;
use crate::command::ToolCommand;
use crate::tool::Tool;

/// Runs one external program, choosing arguments per operation.
///
/// The executable is located once at construction: an explicit `path` wins
/// when it exists, otherwise `program` is looked up in `PATH`.
#[derive(Debug, Clone)]
pub struct CommandTool {
    id: String,
    config: CommandToolConfig,
    resolved: Option<PathBuf>,
}

impl CommandTool {
    pub fn new(id: impl Into<String>, config: CommandToolConfig) -> Self {
        let id = id.into();
        let resolved = resolve_program(&id, &config);
        match &resolved {
            Some(path) => tracing::debug!(tool = %id, path = %path.display(), "Tool located"),
            None => tracing::debug!(tool = %id, "Tool not found"),
        }
        Self {
            id,
            config,
            resolved,
        }
    }

    /// Resolved executable path, if the tool was found.
    pub fn path(&self) -> Option<&Path> {
        self.resolved.as_deref()
    }

    /// Argument template for `operation`.
    fn arg_template(&self, operation: &str) -> gf_core::Result<&[String]> {
        self.config
            .operations
            .get(operation)
            .or(self.config.default_args.as_ref())
            .map(Vec::as_slice)
            .ok_or_else(|| {
                gf_core::Error::tool(
                    &self.id,
                    format!("no argument template for operation '{operation}'"),
                )
            })
    }

    /// Build the command for one invocation without running it.
    pub fn command(
        &self,
        operation: &str,
        input: &Path,
        output: &Path,
        params: &Params,
    ) -> gf_core::Result<ToolCommand> {
        let program = self
            .resolved
            .clone()
            .ok_or_else(|| gf_core::Error::tool_unavailable(&self.id))?;
        let template = self.arg_template(operation)?;

        let ctx = ArgContext::new()
            .with_params(params)
            .with_paths(input, output)
            .with_operation(operation);

        let mut cmd = ToolCommand::new(program);
        cmd.label(&self.id)
            .args(ctx.substitute_all(template))
            .timeout(Duration::from_secs(self.config.timeout_secs));
        Ok(cmd)
    }
}

fn resolve_program(id: &str, config: &CommandToolConfig) -> Option<PathBuf> {
    if let Some(path) = &config.path {
        if path.exists() {
            return Some(path.clone());
        }
    }
    let program = if config.program.is_empty() {
        id
    } else {
        config.program.as_str()
    };
    which::which(program).ok()
}

#[async_trait]
impl Tool for CommandTool {
    fn id(&self) -> &str {
        &self.id
    }

    fn available(&self) -> bool {
        self.resolved.is_some()
    }

    async fn execute(
        &self,
        operation: &str,
        input: &Path,
        output: &Path,
        params: &Params,
    ) -> gf_core::Result<PathBuf> {
        let cmd = self.command(operation, input, output, params)?;
        tracing::info!(tool = %self.id, operation, "exec: {}", cmd.get_args().join(" "));
        cmd.execute().await?;

        if !output.exists() {
            return Err(gf_core::Error::tool(
                &self.id,
                format!("produced no output at {}", output.display()),
            ));
        }
        Ok(output.to_path_buf())
    }
}
