//! `dataset`: pair every graph with its metrics record by filename stem,
//! filter and deduplicate, and emit a packed dataset.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use llvm_ml_dataset::assemble;

/// Dataset Assembler.
#[derive(Parser, Debug)]
#[command(name = "dataset")]
#[command(version)]
#[command(about = "Pair graphs with metrics and assemble a training dataset")]
struct Args {
    /// Directory of `.cbuf` graph records.
    graphs: PathBuf,

    /// Directory of `.cbuf` metrics records.
    metrics: PathBuf,

    /// Output path for the assembled dataset.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Maximum coefficient-of-variation to accept, as a percent (1-100).
    #[arg(long = "max-cov", default_value_t = 10)]
    max_cov: u32,

    /// Emit diagnostics JSON instead of packed binary.
    #[arg(long = "readable-json")]
    readable_json: bool,

    #[arg(short, long)]
    verbose: bool,
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(err) = run(&args) {
        error!("dataset failed: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.max_cov == 0 || args.max_cov > 100 {
        return Err(format!("--max-cov must be between 1 and 100, got {}", args.max_cov).into());
    }
    let max_cov_fraction = f64::from(args.max_cov) / 100.0;

    let entries = assemble(&args.graphs, &args.metrics, max_cov_fraction)?;
    info!(count = entries.len(), "assembled dataset entries");

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if args.readable_json {
        std::fs::write(&args.output, llvm_ml_codec::to_json_pretty(&entries)?)?;
    } else {
        std::fs::write(&args.output, llvm_ml_codec::dataset_to_bytes(&entries))?;
    }

    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
