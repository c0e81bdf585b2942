//! Batch manifests.
//!
//! ```yaml
//! template: social-media/twitter-demo
//! preset: fast          # optional, defaults to batch.default_preset
//! parallel: true        # optional, defaults to batch.parallel
//! jobs:
//!   - input: videos/intro.mp4
//!     output: gifs/intro.gif
//!     id: intro         # optional, defaults to the input's file stem
//!     variables: {caption: "Hello"}
//! ```
//!
//! JSON manifests with the same shape are accepted too.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gf_core::config::BatchConfig;
use gf_template::{TemplateLoader, VariableMap};
use serde::{Deserialize, Serialize};

use crate::batch::{BatchJob, BatchMode, BatchProcessor, BatchResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Template id (`category/name`).
    pub template: String,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub parallel: Option<bool>,
    #[serde(default)]
    pub jobs: Vec<ManifestJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestJob {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub variables: VariableMap,
}

impl Manifest {
    /// Load a manifest, choosing JSON or YAML by file extension.
    pub fn from_path(path: &Path) -> gf_core::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            gf_core::Error::Config(format!("failed to read manifest {}: {e}", path.display()))
        })?;
        let is_json = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    pub fn from_json(text: &str) -> gf_core::Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| gf_core::Error::Config(format!("invalid manifest: {e}")))
    }

    pub fn from_yaml(text: &str) -> gf_core::Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| gf_core::Error::Config(format!("invalid manifest: {e}")))
    }

    /// Preset to use, falling back to the configured default.
    pub fn preset_or<'a>(&'a self, defaults: &'a BatchConfig) -> &'a str {
        self.preset.as_deref().unwrap_or(&defaults.default_preset)
    }

    pub fn mode(&self, defaults: &BatchConfig) -> BatchMode {
        BatchMode::from_flags(
            self.parallel.unwrap_or(defaults.parallel),
            defaults.max_workers,
        )
    }

    pub fn jobs(&self) -> Vec<BatchJob> {
        self.jobs
            .iter()
            .map(|j| {
                let job = BatchJob::new(j.input.clone(), j.output.clone())
                    .with_variables(j.variables.clone());
                match &j.id {
                    Some(id) => job.with_id(id.clone()),
                    None => job,
                }
            })
            .collect()
    }
}

impl BatchProcessor {
    /// Load the manifest's template and run all its jobs.
    ///
    /// # Errors
    ///
    /// Only template loading can fail here; per-job failures end up in the
    /// returned [`BatchResult`].
    pub async fn process_manifest(
        &self,
        loader: &TemplateLoader,
        manifest: &Manifest,
        defaults: &BatchConfig,
    ) -> gf_core::Result<BatchResult> {
        let template = Arc::new(loader.load(&manifest.template)?);
        if manifest.jobs.is_empty() {
            tracing::warn!(template = %manifest.template, "Manifest lists no jobs");
        }
        Ok(self
            .process(
                template,
                manifest.jobs(),
                Some(manifest.preset_or(defaults)),
                manifest.mode(defaults),
            )
            .await)
    }
}
