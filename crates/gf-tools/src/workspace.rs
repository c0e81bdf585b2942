//! Private per-run working area for intermediate step artifacts.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Prefix of every run directory created under the temp root.
pub const RUN_DIR_PREFIX: &str = "gf-run-";

/// Temporary directory owned by one pipeline run.
///
/// Intermediate paths are namespaced by job id and step index, so concurrent
/// runs never collide even when they share a temp root. The directory and
/// everything in it is removed when the workspace is dropped.
///
/// # Example
///
/// ```no_run
/// use gf_tools::Workspace;
///
/// let ws = Workspace::new(&std::env::temp_dir().join("gifforge")).unwrap();
/// let step0 = ws.intermediate("clip-01", 0, "gif");
/// assert!(step0.ends_with("clip-01-step0.gif"));
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a fresh run directory under `root`, creating `root` if needed.
    pub fn new(root: &Path) -> gf_core::Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| {
            gf_core::Error::Internal(format!(
                "failed to create temp root {}: {e}",
                root.display()
            ))
        })?;

        let temp_dir = tempfile::Builder::new()
            .prefix(RUN_DIR_PREFIX)
            .tempdir_in(root)
            .map_err(|e| gf_core::Error::Internal(format!("failed to create temp dir: {e}")))?;

        Ok(Self { temp_dir })
    }

    /// Path to the run directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path for the artifact produced by step `step` of job `job_id`.
    pub fn intermediate(&self, job_id: &str, step: usize, ext: &str) -> PathBuf {
        self.temp_dir
            .path()
            .join(format!("{}-step{step}.{ext}", sanitize(job_id)))
    }
}

fn sanitize(job_id: &str) -> String {
    let cleaned: String = job_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "job".to_string()
    } else {
        cleaned.to_string()
    }
}
