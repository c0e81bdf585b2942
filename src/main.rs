mod cli;
mod config;
mod vars;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{BatchArgs, Cli, Commands};
use gf_core::Config;
use gf_pipeline::{
    jobs_from_directory, BatchMode, BatchOutcome, BatchProcessor, BatchResult, Manifest,
    PipelineOrchestrator,
};
use gf_template::resolve::render_value;
use gf_template::{
    validate_resolved, Template, TemplateLoader, ValidationReport, Validator, Value,
    OUTPUT_VARIABLE, SOURCE_VARIABLE,
};
use gf_tools::ToolRegistry;

/// Output path used when neither `--output` nor the template provides one.
const DEFAULT_OUTPUT: &str = "output.gif";

// Same codes as `gf_core::Error::exit_code` for schema and tool-unavailable errors.
const EXIT_INVALID_TEMPLATE: u8 = 65;
const EXIT_TOOL_UNAVAILABLE: u8 = 69;

/// Exit code for a batch where some, but not all, jobs failed.
const EXIT_PARTIAL_SUCCESS: u8 = 2;

/// Everything a command needs, built once from the CLI flags and config file.
struct App {
    config: Config,
    loader: TemplateLoader,
    json: bool,
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let config = config::load_config_or_default(cli.config.as_deref())?;
        let templates_dir = cli
            .templates
            .clone()
            .unwrap_or_else(|| config.templates.dir.clone());
        tracing::debug!("Template root: {}", templates_dir.display());

        Ok(Self {
            loader: TemplateLoader::new(templates_dir),
            config,
            json: cli.json,
        })
    }

    fn orchestrator(&self) -> Arc<PipelineOrchestrator> {
        let tools = Arc::new(ToolRegistry::from_config(&self.config.tools));
        Arc::new(PipelineOrchestrator::new(tools, self.config.workspace.clone()))
    }

    fn load(&self, id: &str) -> Result<Template> {
        self.loader
            .load(id)
            .with_context(|| format!("Failed to load template '{id}'"))
    }

    /// Preset to apply: the requested one (which must exist), else the
    /// configured default when the template defines it.
    fn pick_preset<'a>(
        &'a self,
        template: &Template,
        requested: Option<&'a str>,
    ) -> Result<Option<&'a str>> {
        match requested {
            Some(name) if template.get_preset(name).is_none() => Err(gf_core::Error::resolution(
                format!("Unknown preset '{name}' for template '{}'", template.name),
            )
            .into()),
            Some(name) => Ok(Some(name)),
            None => {
                let default = self.config.batch.default_preset.as_str();
                Ok(template.get_preset(default).map(|_| default))
            }
        }
    }

    fn print_json(&self, value: &impl serde::Serialize) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "gifforge=debug,gf_core=debug,gf_template=debug,gf_tools=debug,gf_pipeline=debug"
                .to_string()
        } else {
            "gifforge=info,gf_template=warn,gf_tools=info,gf_pipeline=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Exit code for a failed command: the code of the first gifforge error in
/// the chain, 1 otherwise.
fn exit_code_for(e: &anyhow::Error) -> u8 {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<gf_core::Error>())
        .map(|err| err.exit_code())
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let app = App::new(&cli)?;

    match cli.command {
        Commands::List => list_templates(&app),
        Commands::Info { template } => show_info(&app, &template),
        Commands::Presets { template } => show_presets(&app, &template),
        Commands::Check { template } => check_tools(&app, template.as_deref()),
        Commands::Validate { path } => validate(&app, path.as_deref()),
        Commands::Create {
            template,
            input,
            output,
            preset,
            vars,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(create(
                &app,
                &template,
                input,
                output,
                preset.as_deref(),
                &vars,
            ))
        }
        Commands::Batch(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(batch(&app, args))
        }
    }
}

fn list_templates(app: &App) -> Result<ExitCode> {
    let ids = app.loader.list_templates()?;

    let mut entries = Vec::with_capacity(ids.len());
    for id in &ids {
        let entry = match app.loader.load(id) {
            Ok(t) => serde_json::json!({
                "id": id,
                "name": t.name,
                "category": t.category,
                "description": t.description,
            }),
            Err(e) => serde_json::json!({ "id": id, "error": e.to_string() }),
        };
        entries.push(entry);
    }

    if app.json {
        app.print_json(&entries)?;
        return Ok(ExitCode::SUCCESS);
    }

    if entries.is_empty() {
        println!("No templates found in {}", app.loader.root().display());
        return Ok(ExitCode::SUCCESS);
    }

    println!("Templates in {}:\n", app.loader.root().display());
    for entry in &entries {
        let id = entry["id"].as_str().unwrap_or_default();
        match entry.get("error").and_then(Value::as_str) {
            Some(err) => println!("  ✗ {id} (invalid: {err})"),
            None => println!(
                "  {id} - {}",
                entry["description"].as_str().unwrap_or_default()
            ),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn show_info(app: &App, id: &str) -> Result<ExitCode> {
    let template = app.load(id)?;

    if app.json {
        app.print_json(&template)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("Template: {} (v{})", template.name, template.version);
    println!("Category: {}", template.category);
    println!("Description: {}", template.description);
    if !template.metadata.tags.is_empty() {
        println!("Tags: {}", template.metadata.tags.join(", "));
    }

    println!("\nPipeline ({} steps):", template.steps.len());
    for (i, step) in template.steps.iter().enumerate() {
        let migrated = if step.is_migrated() { " [migrated]" } else { "" };
        println!("  {}. {} {}{}", i + 1, step.tool, step.operation, migrated);
        println!("     {} -> {}", step.input, step.output);
    }

    if !template.variables.is_empty() {
        println!("\nVariables:");
        for (name, spec) in &template.variables {
            let ty = spec.var_type.as_ref().map(|t| t.as_str()).unwrap_or("any");
            let required = if spec.required { ", required" } else { "" };
            let default = spec
                .default
                .as_ref()
                .map(|v| format!(" = {}", render_value(v)))
                .unwrap_or_default();
            println!("  {name} ({ty}{required}){default}");
            if let Some(desc) = &spec.description {
                println!("      {desc}");
            }
        }
    }

    if !template.presets.is_empty() {
        let names: Vec<&str> = template.presets.keys().map(String::as_str).collect();
        println!("\nPresets: {}", names.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

fn show_presets(app: &App, id: &str) -> Result<ExitCode> {
    let template = app.load(id)?;

    if app.json {
        app.print_json(&template.presets)?;
        return Ok(ExitCode::SUCCESS);
    }

    if template.presets.is_empty() {
        println!("{} defines no presets", template.name);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Presets for {}:\n", template.name);
    for (name, preset) in &template.presets {
        match &preset.description {
            Some(desc) => println!("  {name} - {desc}"),
            None => println!("  {name}"),
        }
        if let Some(size) = &preset.expected_size {
            println!("      expected size: {size}");
        }
        if let Some(time) = &preset.processing_time {
            println!("      processing time: {time}");
        }
        for (key, value) in &preset.values {
            println!("      {key} = {}", render_value(value));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn check_tools(app: &App, id: Option<&str>) -> Result<ExitCode> {
    let registry = ToolRegistry::from_config(&app.config.tools);

    let template = id.map(|id| app.load(id)).transpose()?;
    let ids: Vec<&str> = match &template {
        Some(t) => t.tools(),
        None => app.config.tools.keys().map(String::as_str).collect(),
    };
    let infos = registry.check_all(&ids);
    let all_available = infos.iter().all(|i| i.available);

    if app.json {
        app.print_json(&infos)?;
    } else {
        println!("Checking tools...\n");
        for info in &infos {
            if info.available {
                println!("  ✓ {}", info.id);
            } else if info.registered {
                println!("  ✗ {} (not found on this system)", info.id);
            } else {
                println!("  ✗ {} (not configured)", info.id);
            }
        }
        println!();
        if infos.is_empty() {
            println!("No tools to check.");
        } else if all_available {
            println!("All required tools are available!");
        } else {
            println!("Some tools are missing. Configure them under [tools.<id>].");
        }
    }

    Ok(if all_available {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_TOOL_UNAVAILABLE)
    })
}

fn validate(app: &App, path: Option<&Path>) -> Result<ExitCode> {
    let validator = Validator::new().with_known_tools(app.config.tools.keys().cloned());
    let target = path.unwrap_or_else(|| app.loader.root());

    let reports: Vec<(String, ValidationReport)> = if target.is_dir() {
        validator.validate_directory(target).into_iter().collect()
    } else {
        vec![(
            target.display().to_string(),
            validator.validate_file(target),
        )]
    };
    let all_valid = reports.iter().all(|(_, r)| r.is_valid());

    if app.json {
        let map: serde_json::Map<String, Value> = reports
            .iter()
            .map(|(name, r)| -> Result<(String, Value)> {
                Ok((name.clone(), serde_json::to_value(r)?))
            })
            .collect::<Result<_>>()?;
        app.print_json(&map)?;
    } else if reports.is_empty() {
        println!("No templates found in {}", target.display());
    } else {
        for (name, report) in &reports {
            let mark = if report.is_valid() { "✓" } else { "✗" };
            println!("{mark} {name}");
            if !report.errors.is_empty() || !report.warnings.is_empty() {
                for line in report.summary().lines() {
                    println!("    {line}");
                }
            }
        }
    }

    Ok(if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INVALID_TEMPLATE)
    })
}

async fn create(
    app: &App,
    id: &str,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    preset: Option<&str>,
    raw_vars: &[String],
) -> Result<ExitCode> {
    let template = app.load(id)?;
    let preset = app.pick_preset(&template, preset)?;

    let mut user_vars = vars::parse_vars(raw_vars)?;
    if let Some(input) = &input {
        user_vars.insert(
            SOURCE_VARIABLE.to_string(),
            Value::String(input.display().to_string()),
        );
    }

    let mut resolved = template.resolve_variables(&user_vars, preset);
    let output = output
        .or_else(|| {
            resolved
                .get(OUTPUT_VARIABLE)
                .filter(|v| !v.is_null())
                .map(|v| PathBuf::from(render_value(v)))
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    resolved.insert(
        OUTPUT_VARIABLE.to_string(),
        Value::String(output.display().to_string()),
    );

    let errors = validate_resolved(&template, &resolved);
    if !errors.is_empty() {
        return Err(gf_core::Error::resolution(errors.join("; ")).into());
    }

    let orchestrator = app.orchestrator();
    let missing: Vec<String> = orchestrator
        .check_tools(&template)
        .into_iter()
        .filter(|(_, available)| !available)
        .map(|(tool, _)| tool)
        .collect();
    if let Some(tool) = missing.first() {
        tracing::error!(missing = ?missing, "Required tools are unavailable");
        return Err(gf_core::Error::tool_unavailable(tool.clone()).into());
    }

    tracing::info!(template = id, preset = ?preset, output = %output.display(), "Creating GIF");
    let result = orchestrator.execute(&template, &resolved, &output).await;

    if app.json {
        app.print_json(&result)?;
    } else if result.success {
        println!("✓ Created {}", output.display());
        println!(
            "  {} steps in {:.1}s",
            result.steps_completed,
            result.duration.as_secs_f64()
        );
    } else {
        println!(
            "✗ Failed after {}/{} steps: {}",
            result.steps_completed,
            result.total_steps,
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(match result.exit_code {
        None => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
    })
}

async fn batch(app: &App, args: BatchArgs) -> Result<ExitCode> {
    let mut defaults = app.config.batch.clone();
    if let Some(workers) = args.workers {
        defaults.max_workers = workers;
    }
    let shared_vars = vars::parse_vars(&args.vars)?;
    let processor = BatchProcessor::new(app.orchestrator());

    let result = if let Some(path) = &args.manifest {
        let mut manifest = Manifest::from_path(path)?;
        if args.preset.is_some() {
            manifest.preset = args.preset.clone();
        }
        if let Some(name) = manifest.preset.as_deref() {
            let template = app.load(&manifest.template)?;
            app.pick_preset(&template, Some(name))?;
        }
        if args.sequential {
            manifest.parallel = Some(false);
        }
        for job in &mut manifest.jobs {
            for (key, value) in &shared_vars {
                job.variables
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        processor
            .process_manifest(&app.loader, &manifest, &defaults)
            .await?
    } else {
        let (Some(id), Some(input_dir)) = (&args.template, &args.input_dir) else {
            bail!("batch needs either --manifest or --template with --input-dir");
        };
        let template = app.load(id)?;
        let preset = app.pick_preset(&template, args.preset.as_deref())?;

        let output_dir = args
            .output_dir
            .clone()
            .unwrap_or_else(|| input_dir.join("output"));
        std::fs::create_dir_all(&output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;

        let pattern = args.pattern.as_deref().unwrap_or(&defaults.pattern);
        let jobs = jobs_from_directory(input_dir, &output_dir, pattern, &defaults.output_extension)?
            .into_iter()
            .map(|job| job.with_variables(shared_vars.clone()))
            .collect();

        let mode = if args.sequential {
            BatchMode::Sequential
        } else {
            BatchMode::from_flags(defaults.parallel, defaults.max_workers)
        };
        let preset = preset.map(str::to_string);
        processor
            .process(Arc::new(template), jobs, preset.as_deref(), mode)
            .await
    };

    print_batch(app, &result)?;

    Ok(match result.outcome() {
        BatchOutcome::Succeeded => ExitCode::SUCCESS,
        BatchOutcome::PartialSuccess => ExitCode::from(EXIT_PARTIAL_SUCCESS),
        BatchOutcome::Failed => ExitCode::FAILURE,
    })
}

fn print_batch(app: &App, result: &BatchResult) -> Result<()> {
    if app.json {
        let mut value = serde_json::to_value(result)?;
        value["outcome"] = serde_json::to_value(result.outcome())?;
        return app.print_json(&value);
    }

    for job in &result.jobs {
        match (&job.output_path, &job.error) {
            (Some(path), None) => println!("  ✓ {} -> {}", job.id, path.display()),
            (_, Some(err)) => println!("  ✗ {}: {err}", job.id),
            (None, None) => println!("  ✓ {}", job.id),
        }
    }
    println!(
        "\nBatch complete: {} total, {} succeeded, {} failed in {:.1}s",
        result.total,
        result.successful,
        result.failed,
        result.duration.as_secs_f64()
    );
    Ok(())
}
