//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries all
//! sub-configs for templates, the per-run workspace, batch defaults and
//! command-backed tools. Every section defaults sensibly so a completely
//! empty file is valid.
//!
//! A `Config` is built once at process start and handed to constructors;
//! nothing below reads ambient state while a pipeline is running.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub templates: TemplatesConfig,
    pub workspace: WorkspaceConfig,
    pub batch: BatchConfig,
    /// Command-backed tools keyed by tool id (e.g. `[tools.gifsicle]`).
    pub tools: BTreeMap<String, CommandToolConfig>,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error: silently
    /// running with defaults would point the engine at the wrong templates.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))),
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.batch.max_workers == 0 {
            warnings.push("batch.max_workers is 0; one worker will be used".into());
        }

        if self.batch.output_extension.is_empty() {
            warnings.push("batch.output_extension is empty".into());
        }

        if !self.templates.dir.exists() {
            warnings.push(format!(
                "templates.dir {} does not exist",
                self.templates.dir.display()
            ));
        }

        for (id, tool) in &self.tools {
            if tool.operations.is_empty() && tool.default_args.is_none() {
                warnings.push(format!("tools.{id} defines no operations"));
            }
            if tool.timeout_secs == 0 {
                warnings.push(format!("tools.{id}.timeout_secs is 0"));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Where templates live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub dir: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./templates"),
        }
    }
}

/// Private working area used for intermediate step artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root directory under which each run creates its own temp directory.
    pub temp_root: PathBuf,
    /// Extension for intermediate artifacts when a step's output expression
    /// does not carry one.
    #[serde(default = "default_extension")]
    pub intermediate_extension: String,
}

fn default_extension() -> String {
    "gif".into()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir().join("gifforge"),
            intermediate_extension: default_extension(),
        }
    }
}

/// Batch processing defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_preset")]
    pub default_preset: String,
    #[serde(default = "default_extension")]
    pub output_extension: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_max_workers() -> usize {
    4
}
fn default_preset() -> String {
    "balanced".into()
}
fn default_pattern() -> String {
    "*.mp4".into()
}
fn default_true() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            default_preset: default_preset(),
            output_extension: default_extension(),
            pattern: default_pattern(),
            parallel: true,
        }
    }
}

/// A tool backed by an external command.
///
/// ```toml
/// [tools.gifsicle]
/// program = "gifsicle"
/// operations.optimize = ["-O{optimization_level}", "{input}", "-o", "{output}"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandToolConfig {
    /// Executable name looked up in `PATH`; the tool id when empty.
    pub program: String,
    /// Explicit executable path; takes precedence over `program` when it exists.
    pub path: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Argument templates keyed by operation name.
    pub operations: BTreeMap<String, Vec<String>>,
    /// Arguments used for operations without an explicit entry.
    pub default_args: Option<Vec<String>>,
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for CommandToolConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            path: None,
            timeout_secs: default_timeout_secs(),
            operations: BTreeMap::new(),
            default_args: None,
        }
    }
}
