//! Applying one template to many independent jobs.
//!
//! Every job gets its own orchestrator run. A job that fails, for whatever
//! reason, only ever fills in its own [`JobRecord`]; siblings keep running.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use gf_template::{validate_resolved, Template, Value, VariableMap, OUTPUT_VARIABLE, SOURCE_VARIABLE};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::orchestrator::PipelineOrchestrator;

/// One unit of batch work.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub id: String,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Extra user variables layered over `video_path`/`output_path`.
    pub variables: VariableMap,
}

impl BatchJob {
    /// A job whose id is the input's file stem.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let input = input.into();
        let id = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "job".to_string());
        Self {
            id,
            input,
            output: output.into(),
            variables: VariableMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_variables(mut self, variables: VariableMap) -> Self {
        self.variables = variables;
        self
    }

    /// The user-variable layer for this job.
    pub fn user_variables(&self) -> VariableMap {
        let mut vars = VariableMap::new();
        vars.insert(
            SOURCE_VARIABLE.to_string(),
            Value::String(self.input.display().to_string()),
        );
        vars.insert(
            OUTPUT_VARIABLE.to_string(),
            Value::String(self.output.display().to_string()),
        );
        vars.extend(self.variables.clone());
        vars
    }
}

/// Result of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub success: bool,
    pub output_path: Option<PathBuf>,
    #[serde(with = "crate::duration_secs")]
    pub duration: Duration,
    pub error: Option<String>,
}

impl JobRecord {
    fn failed(id: &str, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            success: false,
            output_path: None,
            duration,
            error: Some(error.into()),
        }
    }
}

/// How a batch went overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every job succeeded (or there were no jobs).
    Succeeded,
    /// Some jobs succeeded and some failed.
    PartialSuccess,
    /// Every job failed.
    Failed,
}

/// Aggregate batch result.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    #[serde(with = "crate::duration_secs")]
    pub duration: Duration,
    /// Sequential batches keep submission order; concurrent ones are in
    /// completion order.
    pub jobs: Vec<JobRecord>,
}

impl BatchResult {
    fn from_records(jobs: Vec<JobRecord>, duration: Duration) -> Self {
        let successful = jobs.iter().filter(|j| j.success).count();
        Self {
            total: jobs.len(),
            successful,
            failed: jobs.len() - successful,
            duration,
            jobs,
        }
    }

    pub fn outcome(&self) -> BatchOutcome {
        if self.failed == 0 {
            BatchOutcome::Succeeded
        } else if self.successful == 0 {
            BatchOutcome::Failed
        } else {
            BatchOutcome::PartialSuccess
        }
    }

    /// Whether every job failed.
    pub fn is_hard_failure(&self) -> bool {
        self.outcome() == BatchOutcome::Failed
    }
}

/// Execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// One job at a time, in submission order.
    Sequential,
    /// Up to `max_workers` jobs at once.
    Concurrent { max_workers: usize },
}

impl BatchMode {
    pub fn from_flags(parallel: bool, max_workers: usize) -> Self {
        if parallel {
            BatchMode::Concurrent { max_workers }
        } else {
            BatchMode::Sequential
        }
    }
}

/// Runs a template over many jobs using one shared orchestrator.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    orchestrator: Arc<PipelineOrchestrator>,
}

impl BatchProcessor {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn process(
        &self,
        template: Arc<Template>,
        jobs: Vec<BatchJob>,
        preset: Option<&str>,
        mode: BatchMode,
    ) -> BatchResult {
        let start = Instant::now();
        let total = jobs.len();
        tracing::info!(template = %template.name, jobs = total, ?mode, "Starting batch");

        let preset = preset.map(str::to_string);
        let records = match mode {
            BatchMode::Sequential => {
                let mut records = Vec::with_capacity(total);
                for (i, job) in jobs.into_iter().enumerate() {
                    let record =
                        run_job_guarded(&self.orchestrator, &template, &job, preset.as_deref())
                            .await;
                    log_record(i + 1, total, &record);
                    records.push(record);
                }
                records
            }
            BatchMode::Concurrent { max_workers } => {
                self.process_concurrent(template, jobs, preset, max_workers)
                    .await
            }
        };

        let result = BatchResult::from_records(records, start.elapsed());
        tracing::info!(
            total = result.total,
            successful = result.successful,
            failed = result.failed,
            elapsed = ?result.duration,
            "Batch finished"
        );
        result
    }

    async fn process_concurrent(
        &self,
        template: Arc<Template>,
        jobs: Vec<BatchJob>,
        preset: Option<String>,
        max_workers: usize,
    ) -> Vec<JobRecord> {
        let total = jobs.len();
        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let mut set = JoinSet::new();

        for job in jobs {
            let sem = semaphore.clone();
            let orchestrator = self.orchestrator.clone();
            let template = template.clone();
            let preset = preset.clone();

            set.spawn(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return JobRecord::failed(&job.id, Duration::ZERO, e.to_string()),
                };
                run_job_guarded(&orchestrator, &template, &job, preset.as_deref()).await
            });
        }

        let mut records = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            let record = match joined {
                Ok(record) => record,
                Err(e) => JobRecord::failed("unknown", Duration::ZERO, format!("job task failed: {e}")),
            };
            log_record(records.len() + 1, total, &record);
            records.push(record);
        }
        records
    }
}

fn log_record(n: usize, total: usize, record: &JobRecord) {
    match &record.error {
        None => tracing::info!("[{n}/{total}] {} succeeded", record.id),
        Some(e) => tracing::warn!("[{n}/{total}] {} failed: {e}", record.id),
    }
}

/// Run one job, turning a panic anywhere inside it into a failure record.
async fn run_job_guarded(
    orchestrator: &PipelineOrchestrator,
    template: &Template,
    job: &BatchJob,
    preset: Option<&str>,
) -> JobRecord {
    let start = Instant::now();
    match AssertUnwindSafe(run_job(orchestrator, template, job, preset))
        .catch_unwind()
        .await
    {
        Ok(record) => record,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            JobRecord::failed(&job.id, start.elapsed(), format!("internal fault: {message}"))
        }
    }
}

/// Resolve, validate and execute one job.
pub async fn run_job(
    orchestrator: &PipelineOrchestrator,
    template: &Template,
    job: &BatchJob,
    preset: Option<&str>,
) -> JobRecord {
    let start = Instant::now();

    let resolved = template.resolve_variables(&job.user_variables(), preset);
    let errors = validate_resolved(template, &resolved);
    if !errors.is_empty() {
        let err = gf_core::Error::resolution(errors.join("; "));
        return JobRecord::failed(&job.id, start.elapsed(), err.to_string());
    }

    let result = orchestrator
        .execute_job(template, &resolved, &job.output, &job.id)
        .await;

    JobRecord {
        id: job.id.clone(),
        success: result.success,
        output_path: result.output_path,
        duration: start.elapsed(),
        error: result.error_message,
    }
}

/// Build one job per file in `input_dir` matching `pattern`, writing
/// `<stem>.<extension>` into `output_dir`. Jobs are sorted by input path.
///
/// # Errors
///
/// [`gf_core::Error::Config`] for an invalid pattern or when nothing matches.
pub fn jobs_from_directory(
    input_dir: &Path,
    output_dir: &Path,
    pattern: &str,
    extension: &str,
) -> gf_core::Result<Vec<BatchJob>> {
    let base = glob::Pattern::escape(&input_dir.to_string_lossy());
    let full = format!("{}/{pattern}", base.trim_end_matches('/'));
    let paths = glob::glob(&full)
        .map_err(|e| gf_core::Error::Config(format!("invalid pattern '{pattern}': {e}")))?;

    let mut jobs = Vec::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping unreadable match: {e}");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let output = output_dir.join(format!("{stem}.{extension}"));
        jobs.push(BatchJob::new(path, output));
    }

    if jobs.is_empty() {
        return Err(gf_core::Error::Config(format!(
            "no files matching '{pattern}' in {}",
            input_dir.display()
        )));
    }

    jobs.sort_by(|a, b| a.input.cmp(&b.input));
    Ok(jobs)
}
