//! Static template validation.
//!
//! The validator works on the raw document rather than a loaded
//! [`Template`](crate::Template), so it can report every problem at once
//! instead of stopping at the first schema error. Legacy steps are accepted
//! and reported as warnings together with the operation they migrate to.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use crate::loader::{parse_document, RESERVED_PREFIX, TEMPLATE_FILE};
use crate::migrate::infer_operation;
use crate::model::{kind_of, Params, Value, VarType};

/// Fields whose absence makes a document invalid.
pub const REQUIRED_FIELDS: &[&str] = &["name", "description", "version", "category", "pipeline"];

/// Recommended categories. Anything else is a warning.
pub const KNOWN_CATEGORIES: &[&str] = &[
    "demo",
    "social-media",
    "portrait-animation",
    "character-animation",
    "web-animation",
    "creative-effects",
    "professional",
    "technical-docs",
    "ecommerce",
    "ai-enhancement",
];

/// Tool ids recognised without extra configuration.
pub const KNOWN_TOOLS: &[&str] = &[
    "gifcurry",
    "gifsicle",
    "liveportrait",
    "first-order-model",
    "ffmpeg",
    "imagemagick",
];

/// Errors and warnings collected for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Human-readable summary of the report.
    pub fn summary(&self) -> String {
        if self.errors.is_empty() && self.warnings.is_empty() {
            return "Template is valid".to_string();
        }

        let mut lines = Vec::new();
        if !self.errors.is_empty() {
            lines.push(format!("{} error(s):", self.errors.len()));
            lines.extend(self.errors.iter().map(|e| format!("  - {e}")));
        }
        if !self.warnings.is_empty() {
            lines.push(format!("{} warning(s):", self.warnings.len()));
            lines.extend(self.warnings.iter().map(|w| format!("  - {w}")));
        }
        lines.join("\n")
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Structural checks over template documents.
#[derive(Debug, Clone)]
pub struct Validator {
    known_tools: Vec<String>,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            known_tools: KNOWN_TOOLS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat additional tool ids (e.g. configured command tools) as known.
    pub fn with_known_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tool in tools {
            let tool = tool.into();
            if !self.known_tools.contains(&tool) {
                self.known_tools.push(tool);
            }
        }
        self
    }

    /// Validate the template file at `path`.
    ///
    /// A missing file or unparsable YAML is reported in the returned errors.
    pub fn validate_file(&self, path: &Path) -> ValidationReport {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ValidationReport {
                    errors: vec![format!("Template file not found: {}", path.display())],
                    warnings: Vec::new(),
                }
            }
            Err(e) => {
                return ValidationReport {
                    errors: vec![format!("Failed to read {}: {e}", path.display())],
                    warnings: Vec::new(),
                }
            }
        };

        match parse_document(&text) {
            Ok(doc) => self.validate_document(&doc),
            Err(e) => ValidationReport {
                errors: vec![e.to_string()],
                warnings: Vec::new(),
            },
        }
    }

    /// Validate every template under `root`, keyed by its directory relative
    /// to `root`. Directories starting with `_` are skipped.
    pub fn validate_directory(&self, root: &Path) -> BTreeMap<String, ValidationReport> {
        let mut results = BTreeMap::new();

        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(RESERVED_PREFIX)
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.file_name() != TEMPLATE_FILE {
                continue;
            }

            let path = entry.path();
            let key = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            results.insert(key, self.validate_file(path));
        }

        results
    }

    /// Validate a parsed document.
    pub fn validate_document(&self, doc: &Value) -> ValidationReport {
        let mut report = ValidationReport::default();

        let Some(doc) = doc.as_object() else {
            report.error("Template document must be a mapping");
            return report;
        };

        for field in REQUIRED_FIELDS {
            if !doc.contains_key(*field) {
                report.error(format!("Missing required field: {field}"));
            }
        }

        for field in ["name", "description"] {
            if let Some(value) = doc.get(field) {
                if value.as_str().is_none_or(str::is_empty) {
                    report.error(format!("Field '{field}' must be a non-empty string"));
                }
            }
        }

        if let Some(version) = doc.get("version") {
            if !version.is_string() {
                report.error("Field 'version' must be a string");
            }
        }

        if let Some(category) = doc.get("category") {
            match category.as_str() {
                Some(c) if KNOWN_CATEGORIES.contains(&c) => {}
                Some(c) => report.warn(format!(
                    "Category '{c}' is not in standard categories: {}",
                    KNOWN_CATEGORIES.join(", ")
                )),
                None => report.error("Field 'category' must be a string"),
            }
        }

        if let Some(pipeline) = doc.get("pipeline") {
            self.check_pipeline(pipeline, &mut report);
        }

        match doc.get("presets") {
            None => report.warn("Template declares no presets"),
            Some(presets) => check_presets(presets, &mut report),
        }

        match doc.get("variables") {
            None => report.warn("Template declares no variables"),
            Some(variables) => check_variables(variables, &mut report),
        }

        report
    }

    fn check_pipeline(&self, pipeline: &Value, report: &mut ValidationReport) {
        let steps = match pipeline {
            Value::Array(steps) => steps,
            Value::Object(map) => match map.get("steps") {
                Some(Value::Array(steps)) => steps,
                Some(_) => {
                    report.error("Pipeline 'steps' must be a list");
                    return;
                }
                None => {
                    report.error("Pipeline dict must have 'steps' key");
                    return;
                }
            },
            Value::Null => {
                report.error("Pipeline is empty");
                return;
            }
            _ => {
                report.error("Pipeline must be a list or dict with 'steps' key");
                return;
            }
        };

        if steps.is_empty() {
            report.error("Pipeline has no steps");
            return;
        }

        for (i, step) in steps.iter().enumerate() {
            self.check_step(step, i + 1, report);
        }
    }

    fn check_step(&self, step: &Value, n: usize, report: &mut ValidationReport) {
        let Some(step) = step.as_object() else {
            report.error(format!("Step {n} must be a mapping"));
            return;
        };

        let tool = match step.get("tool") {
            Some(Value::String(t)) => Some(t.as_str()),
            Some(_) => {
                report.error(format!("Step {n} field 'tool' must be a string"));
                None
            }
            None => {
                report.error(format!("Step {n} missing required field: tool"));
                None
            }
        };

        if let Some(tool) = tool {
            if !self.known_tools.iter().any(|t| t == tool) {
                report.warn(format!(
                    "Step {n} uses non-standard tool: {tool}. Valid tools: {}",
                    self.known_tools.join(", ")
                ));
            }
        }

        if let Some(params) = step.get("params") {
            if !params.is_object() {
                report.error(format!("Step {n} params must be a mapping"));
            }
        }

        if let Some(operation) = step.get("operation") {
            if operation.as_str().is_none_or(str::is_empty) {
                report.error(format!("Step {n} operation cannot be empty"));
            }
        }
        for field in ["operation", "input", "output"] {
            if !step.contains_key(field) {
                report.error(format!("Step {n} missing required field: {field}"));
            }
        }

        // The loader can still run legacy steps; name the operation it would pick.
        if !step.contains_key("operation") {
            let config = match step.get("config").or_else(|| step.get("params")) {
                None | Some(Value::Null) => Params::new(),
                Some(Value::Object(c)) => c.clone(),
                Some(_) => {
                    report.error(format!("Step {n} config must be a mapping"));
                    return;
                }
            };
            if let Some(tool) = tool {
                report.warn(format!(
                    "Step {n} uses the legacy format; migrated to operation '{}'",
                    infer_operation(tool, &config)
                ));
            }
        }
    }
}

fn check_presets(presets: &Value, report: &mut ValidationReport) {
    let Some(presets) = presets.as_object() else {
        report.error("Presets must be a mapping");
        return;
    };
    if presets.is_empty() {
        report.warn("Presets dictionary is empty");
        return;
    }

    for (name, preset) in presets {
        match preset.as_object() {
            Some(p) if !p.contains_key("description") => {
                report.warn(format!("Preset '{name}' missing description"));
            }
            Some(_) => {}
            None => report.error(format!("Preset '{name}' must be a mapping")),
        }
    }
}

fn check_variables(variables: &Value, report: &mut ValidationReport) {
    let Some(variables) = variables.as_object() else {
        report.error("Variables must be a mapping");
        return;
    };

    for (name, spec) in variables {
        let Some(spec) = spec.as_object() else {
            report.error(format!("Variable '{name}' must be a mapping"));
            continue;
        };

        match spec.get("type").and_then(Value::as_str) {
            None => report.warn(format!("Variable '{name}' missing type")),
            Some(declared) => {
                let var_type = VarType::parse(declared);
                if let Some(default) = spec.get("default").filter(|d| !d.is_null()) {
                    if !var_type.accepts(default) {
                        report.warn(format!(
                            "Variable '{name}' default should be {declared}, got {}",
                            kind_of(default)
                        ));
                    }
                }
            }
        }

        if !spec.contains_key("description") {
            report.warn(format!("Variable '{name}' missing description"));
        }
    }
}
