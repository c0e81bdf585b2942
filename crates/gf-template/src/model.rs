//! In-memory template representation.
//!
//! A [`Template`] is built once by the loader and never mutated afterwards.
//! Every [`Step`] it holds is canonical; legacy steps have already been
//! normalized by [`crate::migrate`].

use std::collections::BTreeMap;

use serde::Serialize;

/// A variable or parameter value as it appears in a template document.
pub type Value = serde_json::Value;

/// Variable name to value. Ordered, so resolution output is deterministic.
pub type VariableMap = serde_json::Map<String, Value>;

/// A step's parameter tree.
pub type Params = serde_json::Map<String, Value>;

/// A named, versioned recipe.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub name: String,
    pub description: String,
    pub version: String,
    pub category: String,
    /// Ordered, non-empty list of canonical steps.
    pub steps: Vec<Step>,
    pub presets: BTreeMap<String, Preset>,
    pub variables: BTreeMap<String, VariableSpec>,
    /// Free-form validation rules (quality gates); carried, not enforced.
    pub validation: serde_json::Map<String, Value>,
    pub metadata: TemplateMetadata,
}

impl Template {
    /// Look up a preset by name.
    pub fn get_preset(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    /// Names of all variables flagged `required`.
    pub fn required_variables(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Distinct tool ids in the order they first appear in the pipeline.
    pub fn tools(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for step in &self.steps {
            if !seen.contains(&step.tool.as_str()) {
                seen.push(&step.tool);
            }
        }
        seen
    }

    /// Number of steps that were migrated from the legacy shape.
    pub fn migrated_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.is_migrated()).count()
    }
}

/// Descriptive metadata collected from the document's top level.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateMetadata {
    pub tags: Vec<String>,
    pub use_cases: Vec<String>,
    pub platform: serde_json::Map<String, Value>,
}

/// One tool invocation in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub tool: String,
    pub operation: String,
    /// Input expression; may contain `{{tokens}}` or the `previous_output` sentinel.
    pub input: String,
    /// Output expression; may contain `{{tokens}}`.
    pub output: String,
    pub params: Params,
    pub provenance: Provenance,
}

impl Step {
    /// Whether the loader migrated this step from the legacy shape.
    pub fn is_migrated(&self) -> bool {
        matches!(self.provenance, Provenance::Migrated { .. })
    }
}

/// Where a canonical step came from. Diagnostics only; execution ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// The document already carried operation, input and params.
    Canonical,
    /// The loader rewrote a legacy step.
    Migrated { original: LegacyShape },
}

/// How a legacy step carried its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyShape {
    /// `tool` plus a `config` map.
    ConfigMap,
    /// `tool` plus a `params` map, without `operation`/`input`.
    ParamsMap,
    /// `tool` alone.
    Bare,
}

/// A named variable-override bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Preset {
    pub description: Option<String>,
    pub expected_size: Option<String>,
    pub processing_time: Option<String>,
    /// Variable overrides seeded into resolution.
    pub values: VariableMap,
}

/// Preset keys that describe the preset rather than override variables.
pub const PRESET_METADATA_KEYS: &[&str] = &["description", "expected_size", "processing_time"];

/// Declared type of a template variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    Integer,
    Float,
    Boolean,
    String,
    /// Any other declared type (`file`, `color`, ...); not type-checked.
    Other(std::string::String),
}

impl VarType {
    pub fn parse(s: &str) -> Self {
        match s {
            "integer" | "int" => VarType::Integer,
            "float" | "number" => VarType::Float,
            "boolean" | "bool" => VarType::Boolean,
            "string" | "str" => VarType::String,
            other => VarType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VarType::Integer => "integer",
            VarType::Float => "float",
            VarType::Boolean => "boolean",
            VarType::String => "string",
            VarType::Other(s) => s,
        }
    }

    /// Whether `value` satisfies this type. Floats accept integers; types
    /// outside the checked set accept anything.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            VarType::Integer => value.is_i64() || value.is_u64(),
            VarType::Float => value.is_number(),
            VarType::Boolean => value.is_boolean(),
            VarType::String => value.is_string(),
            VarType::Other(_) => true,
        }
    }
}

/// Declaration of a template variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VariableSpec {
    pub var_type: Option<VarType>,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

/// Short name of a value's runtime kind, for error messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(tool: &str) -> Step {
        Step {
            tool: tool.into(),
            operation: "process".into(),
            input: "{{previous_output}}".into(),
            output: "out.gif".into(),
            params: Params::new(),
            provenance: Provenance::Canonical,
        }
    }

    #[test]
    fn var_type_accepts() {
        assert!(VarType::Integer.accepts(&json!(640)));
        assert!(!VarType::Integer.accepts(&json!(6.5)));
        assert!(VarType::Float.accepts(&json!(6.5)));
        assert!(VarType::Float.accepts(&json!(6)));
        assert!(VarType::Boolean.accepts(&json!(true)));
        assert!(!VarType::Boolean.accepts(&json!("true")));
        assert!(VarType::String.accepts(&json!("x")));
        assert!(VarType::parse("file").accepts(&json!(1)));
    }

    #[test]
    fn tools_are_distinct_in_order() {
        let template = Template {
            name: "t".into(),
            description: "d".into(),
            version: "1.0".into(),
            category: "demo".into(),
            steps: vec![step("ffmpeg"), step("gifsicle"), step("ffmpeg")],
            presets: BTreeMap::new(),
            variables: BTreeMap::new(),
            validation: Default::default(),
            metadata: TemplateMetadata::default(),
        };
        assert_eq!(template.tools(), vec!["ffmpeg", "gifsicle"]);
        assert_eq!(template.migrated_steps(), 0);
    }

    #[test]
    fn kind_names() {
        assert_eq!(kind_of(&json!(1)), "integer");
        assert_eq!(kind_of(&json!(1.5)), "float");
        assert_eq!(kind_of(&json!("a")), "string");
        assert_eq!(kind_of(&json!(null)), "null");
    }
}
