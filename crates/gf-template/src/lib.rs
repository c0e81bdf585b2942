//! Template documents for gifforge.
//!
//! A template is a declarative recipe: an ordered pipeline of tool steps,
//! named presets, and declared variables. This crate loads templates from
//! YAML (migrating legacy step shapes on the way in), resolves variables with
//! preset/default/user precedence, substitutes `{{tokens}}`, and validates
//! documents statically.

pub mod loader;
pub mod migrate;
pub mod model;
pub mod resolve;
pub mod validator;

pub use loader::{validate_resolved, TemplateLoader};
pub use migrate::{OUTPUT_VARIABLE, PREVIOUS_OUTPUT, SOURCE_VARIABLE};
pub use model::{
    Params, Preset, Provenance, Step, Template, TemplateMetadata, Value, VarType, VariableMap,
    VariableSpec,
};
pub use resolve::{resolve_variables, substitute, substitute_params, substitute_tracked};
pub use validator::{ValidationReport, Validator};

impl Template {
    /// Parse a template from YAML text.
    pub fn from_yaml_str(text: &str) -> gf_core::Result<Self> {
        loader::from_yaml_str(text)
    }

    /// Build a template from an already-parsed document.
    pub fn from_document(doc: &Value) -> gf_core::Result<Self> {
        loader::from_document(doc)
    }
}
