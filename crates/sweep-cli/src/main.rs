mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sweep_runner::{run_sweep, GridSpec, OllamaExecutor, ResultStore, TraversalOrder};

use config::AxisOverrides;

/// Rough wall-clock cost of one trial (model reload plus inference), used
/// only for the describe-time estimate.
const ESTIMATED_MINUTES_PER_TEST: f64 = 2.1;

#[derive(Parser)]
#[command(
    name = "ollama-sweep",
    version,
    about = "Grid-sweep benchmark of Ollama num_ctx/num_batch throughput"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SweepArgs {
    /// YAML config file with axis ranges and traversal order.
    #[arg(long, default_value = "benchmark_config.yaml")]
    config: PathBuf,

    /// num_ctx start value (overrides config file).
    #[arg(long)]
    ctx_start: Option<u32>,
    /// num_ctx end value (overrides config file).
    #[arg(long)]
    ctx_end: Option<u32>,
    /// num_ctx step size (overrides config file).
    #[arg(long)]
    ctx_step: Option<u32>,

    /// num_batch start value (overrides config file).
    #[arg(long)]
    batch_start: Option<u32>,
    /// num_batch end value (overrides config file).
    #[arg(long)]
    batch_end: Option<u32>,
    /// num_batch step size (overrides config file).
    #[arg(long)]
    batch_step: Option<u32>,

    /// Name of the model rebuilt for every grid point.
    #[arg(long, default_value = "nemotron_f")]
    model: String,

    /// Modelfile template to render per grid point.
    #[arg(long, default_value = "modelfile")]
    template: PathBuf,

    /// Where the rendered modelfile is written.
    #[arg(long, default_value = "modelfile_temp")]
    modelfile: PathBuf,

    /// Prompt payload piped to the workload command.
    #[arg(long, default_value = "prompt.txt")]
    prompt: PathBuf,

    /// Durable result store (JSON).
    #[arg(long, default_value = "benchmark_results.json")]
    results: PathBuf,

    /// num_predict substituted into the modelfile; kept minimal so only
    /// prompt evaluation is measured.
    #[arg(long, default_value_t = 2)]
    num_predict: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sweep, resuming past any already-recorded grid points.
    Run(SweepArgs),
    /// Print the resolved grid and time estimate without running anything.
    Describe(SweepArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Describe(args) => describe(args),
    }
}

fn resolve_grid(args: &SweepArgs) -> Result<GridSpec> {
    let file = config::load_file_config(&args.config)?;
    config::resolve_grid(
        &file,
        AxisOverrides {
            start: args.ctx_start,
            end: args.ctx_end,
            step: args.ctx_step,
        },
        AxisOverrides {
            start: args.batch_start,
            end: args.batch_end,
            step: args.batch_step,
        },
    )
}

fn run(args: SweepArgs) -> Result<()> {
    let grid = resolve_grid(&args)?;
    let store = ResultStore::new(&args.results);
    let mut executor = OllamaExecutor::new(
        &args.model,
        &args.template,
        &args.modelfile,
        &args.prompt,
        args.num_predict,
    )
    .context("loading template and prompt")?;

    let report = run_sweep(&grid, &store, &mut executor)?;

    println!("total: {}", report.total);
    println!("skipped: {}", report.skipped);
    println!("executed: {}", report.executed);
    println!("succeeded: {}", report.succeeded);
    println!("failed: {}", report.failed);
    println!("results: {}", args.results.display());
    Ok(())
}

fn describe(args: SweepArgs) -> Result<()> {
    let grid = resolve_grid(&args)?;
    let total = grid.len();
    let estimated_minutes = total as f64 * ESTIMATED_MINUTES_PER_TEST;

    println!("model: {}", args.model);
    println!(
        "num_ctx range: {} ({} values)",
        grid.num_ctx.describe(),
        grid.num_ctx.len()
    );
    println!(
        "num_batch range: {} ({} values)",
        grid.num_batch.describe(),
        grid.num_batch.len()
    );
    println!("total tests: {}", total);
    println!("num_predict: {}", args.num_predict);
    println!(
        "test order: {}",
        match grid.order {
            TraversalOrder::ColumnFirst => "column-first (fixed num_ctx, varying num_batch)",
            TraversalOrder::RowFirst => "row-first (fixed num_batch, varying num_ctx)",
        }
    );
    println!(
        "estimated time: {:.1} hours (~{:.1} days) at ~{} minutes/test",
        estimated_minutes / 60.0,
        estimated_minutes / 1440.0,
        ESTIMATED_MINUTES_PER_TEST
    );
    println!("results: {}", args.results.display());
    Ok(())
}
