use atomica::core::convert::fragment::FragmentationMethod;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "ATOMICA Contributors",
    version,
    about = "ATOMICA CLI - Build block-level interface graphs from PDB complexes and predict binding affinities with a hierarchical GNN.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Turn the structures listed in a sample index into interface graph items (JSON Lines).
    Process(ProcessArgs),
    /// Create a model directory, either freshly initialized or from a pretrained checkpoint.
    Init(InitArgs),
    /// Predict binding energies for processed items with a saved model.
    Predict(PredictArgs),
}

/// Arguments for the `process` subcommand.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Path to the CSV sample index.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub index: PathBuf,

    /// Path for the output JSON Lines file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub out: PathBuf,

    /// Path to an optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Interface distance threshold in Angstrom, overriding the config file.
    #[arg(short = 'd', long, value_name = "FLOAT")]
    pub dist_th: Option<f64>,

    /// Ligand fragmentation method, overriding the config file (e.g., 'motif').
    #[arg(short, long, value_name = "METHOD")]
    pub fragmentation: Option<FragmentationMethod>,
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write `config.toml` and `model.safetensors` into.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub out: PathBuf,

    /// Model configuration file in TOML format (`[encoder]` and `[head]` tables).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Pretrained checkpoint directory whose encoder architecture and weights are reused.
    #[arg(short, long, value_name = "DIR")]
    pub pretrained: Option<PathBuf>,

    /// Override the number of nearest neighbours of the pretrained encoder.
    #[arg(short, long, value_name = "INT", requires = "pretrained")]
    pub k_neighbors: Option<usize>,

    /// Override the encoder dropout of the pretrained encoder.
    #[arg(long, value_name = "FLOAT", requires = "pretrained")]
    pub dropout: Option<f64>,

    /// Enable or disable atom-level global message passing.
    #[arg(long, value_name = "BOOL", requires = "pretrained")]
    pub bottom_global_message_passing: Option<bool>,

    /// Enable or disable block-level global message passing.
    #[arg(long, value_name = "BOOL", requires = "pretrained")]
    pub global_message_passing: Option<bool>,

    /// Only train the energy head when fine-tuning.
    #[arg(long, requires = "pretrained")]
    pub partial_finetune: bool,
}

/// Arguments for the `predict` subcommand.
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory written by `init` or by a training run.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub model_dir: PathBuf,

    /// JSON Lines file produced by `process`.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output JSON Lines predictions.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub out: PathBuf,

    /// Number of items per forward pass.
    #[arg(short, long, default_value_t = 16, value_name = "INT")]
    pub batch_size: usize,
}
