//! Template integration tests
//!
//! Loading, migration, resolution and validation against real template trees.

use assert_matches::assert_matches;
use gf_template::{
    substitute, validate_resolved, Provenance, TemplateLoader, Validator, VariableMap,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn bundled_templates() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates")
}

fn vars(value: serde_json::Value) -> VariableMap {
    value.as_object().cloned().unwrap_or_default()
}

fn write_template(root: &Path, id: &str, yaml: &str) {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("template.yaml"), yaml).unwrap();
}

const MINIMAL: &str = r#"
name: Minimal
description: One step
version: "1.0"
category: demo
pipeline:
  - tool: ffmpeg
    operation: convert
    input: "{{video_path}}"
    output: "{{output_path}}"
    params: {}
presets: {}
variables: {}
"#;

#[test]
fn test_bundled_templates_are_listed() {
    let loader = TemplateLoader::new(bundled_templates());
    let ids = loader.list_templates().unwrap();
    assert_eq!(ids, vec!["ecommerce/product-spin", "social-media/twitter-demo"]);
}

#[test]
fn test_bundled_canonical_template_is_valid() {
    let reports = Validator::new().validate_directory(&bundled_templates());
    assert_eq!(reports.len(), 2);
    let report = &reports["social-media/twitter-demo"];
    assert!(report.is_valid(), "{}", report.summary());
}

#[test]
fn test_legacy_template_loads_but_fails_validation() {
    let loader = TemplateLoader::new(bundled_templates());
    assert!(loader.load("ecommerce/product-spin").is_ok());

    let path = bundled_templates().join("ecommerce/product-spin/template.yaml");
    let report = Validator::new().validate_file(&path);
    assert!(!report.is_valid());
    for n in 1..=3 {
        for field in ["operation", "input", "output"] {
            let expected = format!("Step {n} missing required field: {field}");
            assert!(report.errors.contains(&expected), "{}", report.summary());
        }
    }
    assert_eq!(report.errors.len(), 9);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("legacy format") && w.contains("apply_filter")));
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("non-standard tool: backgroundremover")));
}

#[test]
fn test_configured_tools_are_known_to_validator() {
    let path = bundled_templates().join("ecommerce/product-spin/template.yaml");
    let report = Validator::new()
        .with_known_tools(["backgroundremover"])
        .validate_file(&path);
    assert!(!report
        .warnings
        .iter()
        .any(|w| w.contains("non-standard tool")));
}

#[test]
fn test_canonical_template_keeps_steps_verbatim() {
    let loader = TemplateLoader::new(bundled_templates());
    let template = loader.load("social-media/twitter-demo").unwrap();

    assert_eq!(template.migrated_steps(), 0);
    assert!(template
        .steps
        .iter()
        .all(|s| s.provenance == Provenance::Canonical));
    assert_eq!(template.tools(), vec!["gifcurry", "gifsicle"]);
    assert_eq!(template.required_variables(), vec!["video_path"]);
    assert_eq!(template.metadata.tags, vec!["twitter", "demo", "loop"]);
}

#[test]
fn test_preset_metadata_is_not_an_override() {
    let loader = TemplateLoader::new(bundled_templates());
    let template = loader.load("social-media/twitter-demo").unwrap();

    let fast = template.get_preset("fast").unwrap();
    assert_eq!(fast.description.as_deref(), Some("Small and quick to render"));
    assert_eq!(fast.expected_size.as_deref(), Some("~1MB"));
    assert!(!fast.values.contains_key("description"));

    let resolved = template.resolve_variables(&VariableMap::new(), Some("fast"));
    assert!(!resolved.contains_key("description"));
    assert!(!resolved.contains_key("processing_time"));
}

#[test]
fn test_resolution_precedence() {
    let loader = TemplateLoader::new(bundled_templates());
    let template = loader.load("social-media/twitter-demo").unwrap();

    let resolved = template.resolve_variables(
        &vars(json!({"width": 640, "video_path": "clip.mp4"})),
        Some("fast"),
    );

    // user beats preset
    assert_eq!(resolved["width"], json!(640));
    // preset beats default
    assert_eq!(resolved["fps"], json!(10));
    assert_eq!(resolved["colors"], json!(64));
    // default fills the rest
    assert_eq!(resolved["optimization_level"], json!(3));
    assert_eq!(resolved["output_path"], json!("twitter-demo.gif"));

    assert!(validate_resolved(&template, &resolved).is_empty());
    assert_eq!(
        substitute("{{video_path}} at {{width}}px", &resolved),
        "clip.mp4 at 640px"
    );
}

#[test]
fn test_missing_required_variable_is_reported() {
    let loader = TemplateLoader::new(bundled_templates());
    let template = loader.load("social-media/twitter-demo").unwrap();

    let resolved = template.resolve_variables(&VariableMap::new(), Some("balanced"));
    let errors = validate_resolved(&template, &resolved);
    assert_eq!(errors, vec!["Required variable missing: video_path"]);
}

#[test]
fn test_mistyped_user_value_is_reported() {
    let loader = TemplateLoader::new(bundled_templates());
    let template = loader.load("social-media/twitter-demo").unwrap();

    let resolved = template.resolve_variables(
        &vars(json!({"video_path": "a.mp4", "width": "wide"})),
        None,
    );
    let errors = validate_resolved(&template, &resolved);
    assert_eq!(errors, vec!["Variable 'width' should be integer, got string"]);
}

#[test]
fn test_reserved_directories_are_skipped() {
    let dir = tempdir().unwrap();
    write_template(dir.path(), "demo/minimal", MINIMAL);
    write_template(dir.path(), "_drafts/wip", MINIMAL);

    let loader = TemplateLoader::new(dir.path());
    assert_eq!(loader.list_templates().unwrap(), vec!["demo/minimal"]);

    let reports = Validator::new().validate_directory(dir.path());
    assert_eq!(reports.keys().collect::<Vec<_>>(), vec!["demo/minimal"]);
}

#[test]
fn test_unknown_template_is_schema_error() {
    let dir = tempdir().unwrap();
    let loader = TemplateLoader::new(dir.path());
    let err = loader.load("demo/absent").unwrap_err();
    assert_matches!(err, gf_core::Error::Schema(msg) if msg.contains("Template not found"));
}

#[test]
fn test_missing_pipeline_fails_load_and_validation() {
    let dir = tempdir().unwrap();
    let broken = MINIMAL
        .lines()
        .take_while(|l| !l.starts_with("pipeline"))
        .collect::<Vec<_>>()
        .join("\n");
    write_template(dir.path(), "demo/broken", &broken);

    let loader = TemplateLoader::new(dir.path());
    let err = loader.load("demo/broken").unwrap_err();
    assert_matches!(err, gf_core::Error::Schema(msg) if msg.contains("pipeline"));

    let report = Validator::new().validate_file(&dir.path().join("demo/broken/template.yaml"));
    assert!(!report.is_valid());
    assert!(report.errors.iter().any(|e| e.contains("pipeline")));
}
