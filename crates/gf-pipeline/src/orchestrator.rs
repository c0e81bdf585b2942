//! Single-run pipeline execution.
//!
//! Steps run strictly in order. Each step reads the artifact the previous
//! step produced and the first failure ends the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gf_core::config::WorkspaceConfig;
use gf_template::resolve::{render_value, substitute_params_tracked, substitute_tracked};
use gf_template::{Step, Template, VariableMap, PREVIOUS_OUTPUT, SOURCE_VARIABLE};
use gf_tools::{ToolRegistry, Workspace};
use serde::Serialize;

/// Job id used for runs that are not part of a batch.
pub const DEFAULT_JOB_ID: &str = "run";

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// Final artifact, set only on success.
    pub output_path: Option<PathBuf>,
    /// Wall-clock time of the whole run, success or failure.
    #[serde(with = "crate::duration_secs")]
    pub duration: Duration,
    /// Number of steps that finished before the run ended.
    pub steps_completed: usize,
    pub total_steps: usize,
    pub error_message: Option<String>,
    /// Process exit code matching the error's kind; `None` on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Runs templates against a shared tool registry.
#[derive(Debug, Clone)]
pub struct PipelineOrchestrator {
    tools: Arc<ToolRegistry>,
    workspace: WorkspaceConfig,
}

impl PipelineOrchestrator {
    pub fn new(tools: Arc<ToolRegistry>, workspace: WorkspaceConfig) -> Self {
        Self { tools, workspace }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Availability of every distinct tool the template references.
    pub fn check_tools(&self, template: &Template) -> BTreeMap<String, bool> {
        self.tools.check(template.tools())
    }

    /// Run `template` once, writing the final artifact to `output`.
    pub async fn execute(
        &self,
        template: &Template,
        resolved: &VariableMap,
        output: &Path,
    ) -> ExecutionResult {
        self.execute_job(template, resolved, output, DEFAULT_JOB_ID)
            .await
    }

    /// Like [`execute`](Self::execute), namespacing intermediates by `job_id`.
    pub async fn execute_job(
        &self,
        template: &Template,
        resolved: &VariableMap,
        output: &Path,
        job_id: &str,
    ) -> ExecutionResult {
        let start = Instant::now();
        let total_steps = template.steps.len();

        tracing::info!(
            template = %template.name,
            job = job_id,
            steps = total_steps,
            "Starting pipeline"
        );

        let outcome = self.run(template, resolved, output, job_id).await;
        let duration = start.elapsed();

        match outcome {
            Ok(path) => {
                tracing::info!(
                    job = job_id,
                    output = %path.display(),
                    elapsed = ?duration,
                    "Pipeline completed"
                );
                ExecutionResult {
                    success: true,
                    output_path: Some(path),
                    duration,
                    steps_completed: total_steps,
                    total_steps,
                    error_message: None,
                    exit_code: None,
                }
            }
            Err((completed, e)) => {
                tracing::error!(job = job_id, steps_completed = completed, "Pipeline failed: {e}");
                ExecutionResult {
                    success: false,
                    output_path: None,
                    duration,
                    steps_completed: completed,
                    total_steps,
                    error_message: Some(e.to_string()),
                    exit_code: Some(e.exit_code()),
                }
            }
        }
    }

    /// Returns the final artifact, or the number of completed steps together
    /// with the error that stopped the run.
    async fn run(
        &self,
        template: &Template,
        resolved: &VariableMap,
        output: &Path,
        job_id: &str,
    ) -> Result<PathBuf, (usize, gf_core::Error)> {
        let total = template.steps.len();
        if total == 0 {
            return Err((0, gf_core::Error::schema("pipeline has no steps")));
        }

        let workspace = Workspace::new(&self.workspace.temp_root).map_err(|e| (0, e))?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| (0, gf_core::Error::from(e)))?;
        }

        let mut previous: Option<PathBuf> = None;

        for (i, step) in template.steps.iter().enumerate() {
            let tool = self.tools.require(&step.tool).map_err(|e| (i, e))?;

            let input = self
                .step_input(step, i, resolved, previous.as_deref())
                .map_err(|e| (i, e))?;

            let target = if i + 1 == total {
                output.to_path_buf()
            } else {
                workspace.intermediate(job_id, i, &self.intermediate_extension(step))
            };

            let mut unresolved = Vec::new();
            let params = substitute_params_tracked(&step.params, resolved, &mut unresolved);
            if !unresolved.is_empty() {
                tracing::warn!(step = i, tool = %step.tool, tokens = ?unresolved, "Unresolved tokens in params");
            }

            tracing::info!(
                "[{}/{}] {} {} -> {}",
                i + 1,
                total,
                step.tool,
                step.operation,
                target.display()
            );

            let produced = tool
                .execute(&step.operation, &input, &target, &params)
                .await
                .map_err(|e| (i, wrap_step_error(i, &step.tool, e)))?;

            tracing::debug!(step = i, produced = %produced.display(), "Step completed");
            previous = Some(produced);
        }

        // The loop ran at least once, so `previous` is set.
        previous.ok_or_else(|| (total, gf_core::Error::Internal("no step produced output".into())))
    }

    fn step_input(
        &self,
        step: &Step,
        index: usize,
        resolved: &VariableMap,
        previous: Option<&Path>,
    ) -> gf_core::Result<PathBuf> {
        let sub = substitute_tracked(&step.input, resolved);
        let text = sub.text.trim();

        if is_previous_output(text) {
            return match previous {
                Some(path) => Ok(path.to_path_buf()),
                None if index == 0 => match resolved.get(SOURCE_VARIABLE) {
                    Some(source) if !source.is_null() => Ok(PathBuf::from(render_value(source))),
                    _ => Err(gf_core::Error::resolution(format!(
                        "step {index} reads {PREVIOUS_OUTPUT} but no {SOURCE_VARIABLE} was supplied"
                    ))),
                },
                None => Err(gf_core::Error::resolution(format!(
                    "step {index} reads {PREVIOUS_OUTPUT} before any step produced output"
                ))),
            };
        }

        if !sub.is_complete() {
            tracing::warn!(step = index, tokens = ?sub.unresolved, "Unresolved tokens in input");
        }
        Ok(PathBuf::from(text))
    }

    /// Extension of the step's declared output when it has a plain one,
    /// otherwise the configured default.
    fn intermediate_extension(&self, step: &Step) -> String {
        Path::new(&step.output)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_string)
            .unwrap_or_else(|| self.workspace.intermediate_extension.clone())
    }
}

fn is_previous_output(text: &str) -> bool {
    text == PREVIOUS_OUTPUT
        || text
            .strip_prefix("{{")
            .and_then(|t| t.strip_suffix("}}"))
            .is_some_and(|t| t.trim() == PREVIOUS_OUTPUT)
}

fn wrap_step_error(step: usize, tool: &str, err: gf_core::Error) -> gf_core::Error {
    match err {
        gf_core::Error::ToolUnavailable { .. } | gf_core::Error::StepFailed { .. } => err,
        gf_core::Error::Tool { message, .. } => gf_core::Error::step_failed(step, tool, message),
        other => gf_core::Error::step_failed(step, tool, other.to_string()),
    }
}
