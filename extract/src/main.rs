//! `extract`: split an object file into one `.s` file per basic block,
//! with an optional filter/dedup postprocessing pass.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use llvm_ml_extract::{extract_blocks, filter_directory, write_blocks};
use llvm_ml_target::X86Target;

/// Basic-Block Extractor.
#[derive(Parser, Debug)]
#[command(name = "extract")]
#[command(version)]
#[command(about = "Split an object file into basic blocks")]
struct Args {
    /// Input object file, or (with `--postprocess-only`) a directory of
    /// already-extracted `.s` files.
    path: PathBuf,

    /// Output directory for extracted `.s` files.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Filename prefix each extracted block is written under.
    #[arg(long, default_value = "block")]
    prefix: String,

    /// Run the filter/dedup pass after extraction.
    #[arg(long)]
    postprocess: bool,

    /// Run only the filter/dedup pass, over an existing directory.
    #[arg(long = "postprocess-only")]
    postprocess_only: bool,

    #[arg(short, long)]
    verbose: bool,
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(err) = run(&args) {
        error!("extract failed: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let target = X86Target;

    if args.postprocess_only {
        let survivors = filter_directory(&args.path, &target)?;
        info!(count = survivors.len(), "postprocess-only complete");
        return Ok(());
    }

    std::fs::create_dir_all(&args.output)?;
    let bytes = std::fs::read(&args.path)?;
    let blocks = extract_blocks(&bytes, &target)?;
    info!(count = blocks.len(), "extracted blocks");
    write_blocks(&blocks, &args.output, &args.prefix, 0)?;

    if args.postprocess {
        let survivors = filter_directory(&args.output, &target)?;
        info!(count = survivors.len(), "postprocess complete");
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
