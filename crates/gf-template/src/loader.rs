//! Template discovery and loading.
//!
//! Templates live at `<root>/<category>/<name>/template.yaml` and are
//! addressed by the id `"category/name"`. Top-level directories starting with
//! `_` hold shared fragments and are never listed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::migrate::normalize_pipeline;
use crate::model::{
    kind_of, Preset, Template, TemplateMetadata, Value, VarType, VariableMap, VariableSpec,
    PRESET_METADATA_KEYS,
};

/// File name of a template document inside its directory.
pub const TEMPLATE_FILE: &str = "template.yaml";

/// Directories whose names start with this prefix are skipped.
pub const RESERVED_PREFIX: char = '_';

/// Top-level fields every template document must carry.
pub const REQUIRED_FIELDS: &[&str] = &[
    "name",
    "description",
    "version",
    "category",
    "pipeline",
    "presets",
    "variables",
];

type Document = serde_json::Map<String, Value>;

/// Loads templates from a root directory.
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    root: PathBuf,
}

impl TemplateLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document backing `id`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(id).join(TEMPLATE_FILE)
    }

    /// Load the template identified by `"category/name"`.
    ///
    /// # Errors
    ///
    /// [`gf_core::Error::Schema`] if the document does not exist, is not valid
    /// YAML, or lacks a required field.
    pub fn load(&self, id: &str) -> gf_core::Result<Template> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(gf_core::Error::schema(format!(
                "Template not found: {}",
                path.display()
            )));
        }
        let template = load_file(&path)?;
        tracing::debug!(
            id,
            name = %template.name,
            steps = template.steps.len(),
            migrated = template.migrated_steps(),
            "Loaded template"
        );
        Ok(template)
    }

    /// List every template id under the root, sorted.
    pub fn list_templates(&self) -> gf_core::Result<Vec<String>> {
        let mut ids = Vec::new();

        for category in read_dirs(&self.root)? {
            let Some(category_name) = dir_name(&category) else {
                continue;
            };
            if category_name.starts_with(RESERVED_PREFIX) {
                continue;
            }
            for template_dir in read_dirs(&category)? {
                let Some(template_name) = dir_name(&template_dir) else {
                    continue;
                };
                if template_dir.join(TEMPLATE_FILE).is_file() {
                    ids.push(format!("{category_name}/{template_name}"));
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

fn read_dirs(path: &Path) -> gf_core::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    Ok(dirs)
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Load a template document from an explicit path.
pub fn load_file(path: &Path) -> gf_core::Result<Template> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        gf_core::Error::schema(format!("failed to read {}: {e}", path.display()))
    })?;
    from_yaml_str(&text)
        .map_err(|e| gf_core::Error::schema(format!("{}: {}", path.display(), schema_message(e))))
}

fn schema_message(err: gf_core::Error) -> String {
    match err {
        gf_core::Error::Schema(msg) => msg,
        other => other.to_string(),
    }
}

/// Parse YAML text into a document tree.
pub fn parse_document(text: &str) -> gf_core::Result<Value> {
    serde_yaml::from_str(text).map_err(|e| gf_core::Error::schema(format!("invalid YAML: {e}")))
}

/// Parse and build a template from YAML text.
pub fn from_yaml_str(text: &str) -> gf_core::Result<Template> {
    from_document(&parse_document(text)?)
}

/// Build a template from an already-parsed document, migrating legacy steps.
pub fn from_document(doc: &Value) -> gf_core::Result<Template> {
    let doc = doc
        .as_object()
        .ok_or_else(|| gf_core::Error::schema("template document must be a mapping"))?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| !doc.contains_key(*f))
        .collect();
    if !missing.is_empty() {
        return Err(gf_core::Error::schema(format!(
            "Template missing required fields: {}",
            missing.join(", ")
        )));
    }

    let raw_steps = pipeline_steps(&doc["pipeline"])?;
    if raw_steps.is_empty() {
        return Err(gf_core::Error::schema("pipeline has no steps"));
    }
    let steps = normalize_pipeline(raw_steps)?;

    Ok(Template {
        name: scalar_field(doc, "name")?,
        description: scalar_field(doc, "description")?,
        version: scalar_field(doc, "version")?,
        category: scalar_field(doc, "category")?,
        steps,
        presets: presets(&doc["presets"])?,
        variables: variables(&doc["variables"])?,
        validation: doc
            .get("validation")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        metadata: metadata(doc),
    })
}

/// The step list of a pipeline given either as a sequence or as a mapping
/// with a `steps` key.
pub fn pipeline_steps(pipeline: &Value) -> gf_core::Result<&[Value]> {
    match pipeline {
        Value::Array(steps) => Ok(steps),
        Value::Object(map) => match map.get("steps") {
            Some(Value::Array(steps)) => Ok(steps),
            _ => Err(gf_core::Error::schema(
                "pipeline mapping must have a 'steps' list",
            )),
        },
        _ => Err(gf_core::Error::schema(
            "pipeline must be a list or a mapping with a 'steps' key",
        )),
    }
}

fn scalar_field(doc: &Document, key: &str) -> gf_core::Result<String> {
    match &doc[key] {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(gf_core::Error::schema(format!(
            "field '{key}' must be a string, got {}",
            kind_of(other)
        ))),
    }
}

fn presets(value: &Value) -> gf_core::Result<BTreeMap<String, Preset>> {
    let map = match value {
        Value::Null => return Ok(BTreeMap::new()),
        Value::Object(map) => map,
        other => {
            return Err(gf_core::Error::schema(format!(
                "presets must be a mapping, got {}",
                kind_of(other)
            )))
        }
    };

    let mut presets = BTreeMap::new();
    for (name, entry) in map {
        let entry = entry.as_object().ok_or_else(|| {
            gf_core::Error::schema(format!("preset '{name}' must be a mapping"))
        })?;

        let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);
        let values: VariableMap = entry
            .iter()
            .filter(|(k, _)| !PRESET_METADATA_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        presets.insert(
            name.clone(),
            Preset {
                description: text("description"),
                expected_size: text("expected_size"),
                processing_time: text("processing_time"),
                values,
            },
        );
    }
    Ok(presets)
}

fn variables(value: &Value) -> gf_core::Result<BTreeMap<String, VariableSpec>> {
    let map = match value {
        Value::Null => return Ok(BTreeMap::new()),
        Value::Object(map) => map,
        other => {
            return Err(gf_core::Error::schema(format!(
                "variables must be a mapping, got {}",
                kind_of(other)
            )))
        }
    };

    let mut specs = BTreeMap::new();
    for (name, entry) in map {
        let entry = entry.as_object().ok_or_else(|| {
            gf_core::Error::schema(format!("variable '{name}' must be a mapping"))
        })?;
        specs.insert(
            name.clone(),
            VariableSpec {
                var_type: entry.get("type").and_then(Value::as_str).map(VarType::parse),
                required: entry.get("required").and_then(Value::as_bool).unwrap_or(false),
                default: entry.get("default").cloned(),
                description: entry
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
        );
    }
    Ok(specs)
}

fn metadata(doc: &Document) -> TemplateMetadata {
    let strings = |key: &str| -> Vec<String> {
        doc.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    TemplateMetadata {
        tags: strings("tags"),
        use_cases: strings("use_cases"),
        platform: doc
            .get("platform")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    }
}

/// Check a resolved variable map against the template's declarations.
///
/// Returns one message per problem; an empty list means the map is usable.
pub fn validate_resolved(template: &Template, resolved: &VariableMap) -> Vec<String> {
    let mut errors = Vec::new();

    for (name, spec) in &template.variables {
        if spec.required && !matches!(resolved.get(name), Some(v) if !v.is_null()) {
            errors.push(format!("Required variable missing: {name}"));
        }
    }

    for (name, value) in resolved {
        let Some(spec) = template.variables.get(name) else {
            continue;
        };
        let Some(var_type) = &spec.var_type else {
            continue;
        };
        // A null required value was already reported above.
        if value.is_null() && spec.required {
            continue;
        }
        if !var_type.accepts(value) {
            errors.push(format!(
                "Variable '{name}' should be {}, got {}",
                var_type.as_str(),
                kind_of(value)
            ));
        }
    }

    errors
}

impl TemplateLoader {
    /// See [`validate_resolved`].
    pub fn validate_resolved(&self, template: &Template, resolved: &VariableMap) -> Vec<String> {
        validate_resolved(template, resolved)
    }
}
