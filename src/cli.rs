use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gifforge")]
#[command(author, version, about = "Template-driven GIF generation")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Template root directory (overrides templates.dir)
    #[arg(long, global = true)]
    pub templates: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available templates
    List,

    /// Show details of a template
    Info {
        /// Template id (e.g. social-media/twitter-demo)
        template: String,
    },

    /// Show the presets of a template
    Presets {
        /// Template id
        template: String,
    },

    /// Check that the tools a template needs are available
    Check {
        /// Template id; checks every configured tool when omitted
        template: Option<String>,
    },

    /// Validate a template file or a directory of templates
    Validate {
        /// File or directory (defaults to the template root)
        path: Option<PathBuf>,
    },

    /// Create a GIF from a template
    Create {
        /// Template id
        template: String,

        /// Input video
        #[arg(short, long, alias = "video")]
        input: Option<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Preset to use
        #[arg(short, long)]
        preset: Option<String>,

        /// Variable override, repeatable (key=value)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },

    /// Apply a template to many inputs
    Batch(BatchArgs),
}

#[derive(Args)]
pub struct BatchArgs {
    /// Batch manifest (JSON or YAML)
    #[arg(short, long, conflicts_with_all = ["template", "input_dir"])]
    pub manifest: Option<PathBuf>,

    /// Template id (required with --input-dir)
    #[arg(short, long, requires = "input_dir")]
    pub template: Option<String>,

    /// Directory of input videos
    #[arg(short, long, requires = "template")]
    pub input_dir: Option<PathBuf>,

    /// Output directory (defaults to <input-dir>/output)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// File pattern inside the input directory
    #[arg(long)]
    pub pattern: Option<String>,

    /// Preset to use
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Run jobs one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Maximum concurrent jobs
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Variable applied to every job, repeatable (key=value)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,
}
