//! Pipeline integration tests
//!
//! Templates loaded from disk run end to end through the orchestrator and
//! batch processor, with fake tools standing in for media programs.

use async_trait::async_trait;
use gf_core::config::{BatchConfig, CommandToolConfig, WorkspaceConfig};
use gf_pipeline::{
    jobs_from_directory, BatchMode, BatchOutcome, BatchProcessor, Manifest, PipelineOrchestrator,
};
use gf_template::{Params, Template, TemplateLoader, VariableMap};
use gf_tools::{Tool, ToolRegistry};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Appends `<id>:<operation>` to the input's content and writes it to output.
struct Stamp {
    id: &'static str,
    calls: AtomicUsize,
    seen_params: Mutex<Vec<Params>>,
}

impl Stamp {
    fn new(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            calls: AtomicUsize::new(0),
            seen_params: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Tool for Stamp {
    fn id(&self) -> &str {
        self.id
    }

    fn available(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        operation: &str,
        input: &Path,
        output: &Path,
        params: &Params,
    ) -> gf_core::Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_params.lock().unwrap().push(params.clone());
        let body = fs::read_to_string(input)?;
        if body.contains("corrupt") {
            return Err(gf_core::Error::tool(self.id, "cannot decode input"));
        }
        fs::write(output, format!("{body}|{}:{operation}", self.id))?;
        Ok(output.to_path_buf())
    }
}

const TWO_STEP: &str = r#"
name: Two Step
description: Capture then optimize
version: "1.0"
category: demo
pipeline:
  - tool: capture
    operation: create_gif
    input: "{{video_path}}"
    output: capture.gif
    params:
      width: "{{width}}"
      fps: "{{fps}}"
  - tool: shrink
    operation: optimize
    input: previous_output
    output: "{{output_path}}"
    params:
      level: "{{level}}"
presets:
  fast:
    description: Quick
    width: 480
    fps: 10
  balanced:
    description: Default
    width: 640
variables:
  video_path:
    type: file
    required: true
  width:
    type: integer
    default: 320
  fps:
    type: integer
    default: 15
  level:
    type: integer
    default: 3
"#;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    loader: TemplateLoader,
    capture: Arc<Stamp>,
    shrink: Arc<Stamp>,
    orchestrator: Arc<PipelineOrchestrator>,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let root = dir.path().to_path_buf();

    let template_dir = root.join("templates/demo/two-step");
    fs::create_dir_all(&template_dir).unwrap();
    fs::write(template_dir.join("template.yaml"), TWO_STEP).unwrap();

    let capture = Stamp::new("capture");
    let shrink = Stamp::new("shrink");
    let mut registry = ToolRegistry::new();
    registry.register(capture.clone()).register(shrink.clone());

    let workspace = WorkspaceConfig {
        temp_root: root.join("work"),
        ..WorkspaceConfig::default()
    };
    let orchestrator = Arc::new(PipelineOrchestrator::new(Arc::new(registry), workspace));

    Fixture {
        loader: TemplateLoader::new(root.join("templates")),
        root,
        _dir: dir,
        capture,
        shrink,
        orchestrator,
    }
}

fn write_input(dir: &Path, name: &str, body: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn user_vars(value: serde_json::Value) -> VariableMap {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_single_run_chains_steps_and_resolves_params() {
    let fx = fixture();
    let template = fx.loader.load("demo/two-step").unwrap();
    let input = write_input(&fx.root.join("in"), "clip.mp4", "video");
    let output = fx.root.join("out/clip.gif");

    let resolved = template.resolve_variables(
        &user_vars(json!({"video_path": input.display().to_string(), "fps": 24})),
        Some("fast"),
    );
    let result = fx.orchestrator.execute(&template, &resolved, &output).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.steps_completed, 2);
    assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "video|capture:create_gif|shrink:optimize"
    );

    // Params are rendered into text; typing is left to the tool.
    let capture_params = fx.capture.seen_params.lock().unwrap()[0].clone();
    assert_eq!(capture_params.get("width"), Some(&json!("480")));
    assert_eq!(capture_params.get("fps"), Some(&json!("24")));
    let shrink_params = fx.shrink.seen_params.lock().unwrap()[0].clone();
    assert_eq!(shrink_params.get("level"), Some(&json!("3")));

    // The per-run workspace is gone once the run ends.
    let leftovers: Vec<_> = fs::read_dir(fx.root.join("work")).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_failing_first_step_skips_the_rest() {
    let fx = fixture();
    let template = fx.loader.load("demo/two-step").unwrap();
    let input = write_input(&fx.root.join("in"), "bad.mp4", "corrupt");

    let resolved = template.resolve_variables(
        &user_vars(json!({"video_path": input.display().to_string()})),
        None,
    );
    let result = fx
        .orchestrator
        .execute(&template, &resolved, &fx.root.join("out/bad.gif"))
        .await;

    assert!(!result.success);
    assert_eq!(result.steps_completed, 0);
    assert_eq!(result.total_steps, 2);
    assert_eq!(result.exit_code, Some(70));
    assert!(result.error_message.unwrap().contains("cannot decode input"));
    assert_eq!(fx.shrink.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_directory_batch_with_partial_failure() {
    let fx = fixture();
    let template = Arc::new(fx.loader.load("demo/two-step").unwrap());
    let in_dir = fx.root.join("videos");
    for (name, body) in [
        ("a.mp4", "ok"),
        ("b.mp4", "corrupt"),
        ("c.mp4", "ok"),
        ("d.mp4", "ok"),
        ("e.mp4", "corrupt"),
        ("notes.txt", "ignored"),
    ] {
        write_input(&in_dir, name, body);
    }
    let out_dir = fx.root.join("gifs");

    let jobs = jobs_from_directory(&in_dir, &out_dir, "*.mp4", "gif").unwrap();
    assert_eq!(jobs.len(), 5);

    let processor = BatchProcessor::new(fx.orchestrator.clone());
    let result = processor
        .process(
            template,
            jobs,
            Some("balanced"),
            BatchMode::Concurrent { max_workers: 2 },
        )
        .await;

    assert_eq!(result.total, 5);
    assert_eq!(result.successful, 3);
    assert_eq!(result.failed, 2);
    assert_eq!(result.outcome(), BatchOutcome::PartialSuccess);
    assert!(!result.is_hard_failure());

    let mut failed: Vec<&str> = result
        .jobs
        .iter()
        .filter(|j| !j.success)
        .map(|j| j.id.as_str())
        .collect();
    failed.sort();
    assert_eq!(failed, vec!["b", "e"]);

    for stem in ["a", "c", "d"] {
        assert!(out_dir.join(format!("{stem}.gif")).is_file());
    }
}

#[tokio::test]
async fn test_manifest_batch_runs_in_order() {
    let fx = fixture();
    let in_dir = fx.root.join("in");
    let first = write_input(&in_dir, "one.mp4", "first");
    let second = write_input(&in_dir, "two.mp4", "second");

    let manifest_path = fx.root.join("batch.yaml");
    fs::write(
        &manifest_path,
        format!(
            "template: demo/two-step\nparallel: false\njobs:\n  - input: {}\n    output: {}\n    id: opener\n    variables:\n      width: 800\n  - input: {}\n    output: {}\n",
            first.display(),
            fx.root.join("out/one.gif").display(),
            second.display(),
            fx.root.join("out/two.gif").display(),
        ),
    )
    .unwrap();

    let manifest = Manifest::from_path(&manifest_path).unwrap();
    let defaults = BatchConfig {
        default_preset: "fast".into(),
        ..BatchConfig::default()
    };
    let processor = BatchProcessor::new(fx.orchestrator.clone());
    let result = processor
        .process_manifest(&fx.loader, &manifest, &defaults)
        .await
        .unwrap();

    assert_eq!(result.outcome(), BatchOutcome::Succeeded);
    let ids: Vec<&str> = result.jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["opener", "two"]);

    let widths: Vec<serde_json::Value> = fx
        .capture
        .seen_params
        .lock()
        .unwrap()
        .iter()
        .map(|p| p["width"].clone())
        .collect();
    assert_eq!(widths, vec![json!("800"), json!("480")]);
}

#[tokio::test]
async fn test_manifest_with_unknown_template_fails_up_front() {
    let fx = fixture();
    let manifest = Manifest::from_yaml("template: demo/absent\njobs: []\n").unwrap();
    let processor = BatchProcessor::new(fx.orchestrator.clone());
    let err = processor
        .process_manifest(&fx.loader, &manifest, &BatchConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, gf_core::Error::Schema(_)));
}

#[tokio::test]
async fn test_job_without_source_fails_resolution() {
    let fx = fixture();
    let template = Arc::new(fx.loader.load("demo/two-step").unwrap());
    let processor = BatchProcessor::new(fx.orchestrator.clone());

    // A job always supplies video_path, so blank it out through its variables.
    let job = gf_pipeline::BatchJob::new("x.mp4", fx.root.join("x.gif"))
        .with_variables(user_vars(json!({"video_path": null})));
    let result = processor
        .process(template, vec![job], None, BatchMode::Sequential)
        .await;

    assert_eq!(result.outcome(), BatchOutcome::Failed);
    let error = result.jobs[0].error.as_deref().unwrap();
    assert!(error.contains("Required variable missing: video_path"));
    assert_eq!(fx.capture.calls.load(Ordering::SeqCst), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_tools_from_config() {
    let dir = tempdir().unwrap();
    let template = Template::from_yaml_str(
        r#"
name: Copy Twice
description: Two external copies
version: "1"
category: demo
pipeline:
  - tool: copy
    operation: convert
    input: "{{video_path}}"
    output: stage.bin
    params: {}
  - tool: copy
    operation: convert
    input: previous_output
    output: "{{output_path}}"
    params: {}
presets: {}
variables: {}
"#,
    )
    .unwrap();

    let mut tools = BTreeMap::new();
    tools.insert(
        "copy".to_string(),
        CommandToolConfig {
            program: "cp".into(),
            default_args: Some(vec!["{input}".into(), "{output}".into()]),
            ..CommandToolConfig::default()
        },
    );
    let registry = ToolRegistry::from_config(&tools);
    let orchestrator = PipelineOrchestrator::new(
        Arc::new(registry),
        WorkspaceConfig {
            temp_root: dir.path().join("work"),
            ..WorkspaceConfig::default()
        },
    );

    let input = write_input(dir.path(), "in.bin", "payload");
    let output = dir.path().join("out/final.bin");
    let resolved = template.resolve_variables(
        &user_vars(json!({"video_path": input.display().to_string()})),
        None,
    );
    let result = orchestrator.execute(&template, &resolved, &output).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(fs::read_to_string(&output).unwrap(), "payload");
}

/// Appends "+" to whatever it reads.
struct Append;

#[async_trait]
impl Tool for Append {
    fn id(&self) -> &str {
        "append"
    }

    fn available(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        _operation: &str,
        input: &Path,
        output: &Path,
        _params: &Params,
    ) -> gf_core::Result<PathBuf> {
        let body = tokio::fs::read_to_string(input).await?;
        tokio::task::yield_now().await;
        tokio::fs::write(output, format!("{body}+")).await?;
        Ok(output.to_path_buf())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_jobs_sharing_an_id_keep_intermediates_apart() {
    let dir = tempdir().unwrap();
    let template = Arc::new(
        Template::from_yaml_str(
            r#"
name: Three Appends
description: Each step appends to the previous result
version: "1"
category: demo
pipeline:
  - tool: append
    operation: convert
    input: "{{video_path}}"
    output: stage.gif
    params: {}
  - tool: append
    operation: convert
    input: previous_output
    output: stage.gif
    params: {}
  - tool: append
    operation: convert
    input: previous_output
    output: "{{output_path}}"
    params: {}
presets: {}
variables:
  video_path:
    type: file
    required: true
"#,
        )
        .unwrap(),
    );

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Append));
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::new(registry),
        WorkspaceConfig {
            temp_root: dir.path().join("work"),
            ..WorkspaceConfig::default()
        },
    ));

    let in_dir = dir.path().join("in");
    let out_dir = dir.path().join("out");
    let jobs: Vec<_> = (0..8)
        .map(|i| {
            let input = write_input(&in_dir, &format!("j{i}.mp4"), &format!("J{i}"));
            gf_pipeline::BatchJob::new(input, out_dir.join(format!("j{i}.gif"))).with_id("clip")
        })
        .collect();

    let result = BatchProcessor::new(orchestrator)
        .process(template, jobs, None, BatchMode::Concurrent { max_workers: 8 })
        .await;

    assert_eq!(result.successful, 8, "{:?}", result.jobs);
    for i in 0..8 {
        let body = fs::read_to_string(out_dir.join(format!("j{i}.gif"))).unwrap();
        assert_eq!(body, format!("J{i}+++"));
    }
}
