//! `unpacker`: decode a packed `.cbuf` record and emit readable JSON — the
//! inverse of every tool's `--readable-json` path.
//!
//! The packed wire format carries no type tag, so the record kind must be
//! named explicitly rather than sniffed from the bytes.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Record Unpacker.
#[derive(Parser, Debug)]
#[command(name = "unpacker")]
#[command(version)]
#[command(about = "Decode a packed .cbuf record into readable JSON")]
struct Args {
    /// Input `.cbuf` file.
    path: PathBuf,

    /// Output path for the decoded JSON.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Record kind the input encodes.
    #[arg(long, value_enum)]
    kind: Kind,

    #[arg(short, long)]
    verbose: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Graph,
    Metrics,
    Dataset,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(err) = run(&args) {
        error!("unpacker failed: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(&args.path)?;

    let text = match args.kind {
        Kind::Graph => llvm_ml_codec::to_json_pretty(&llvm_ml_codec::graph_from_bytes(&bytes)?)?,
        Kind::Metrics => {
            llvm_ml_codec::to_json_pretty(&llvm_ml_codec::metrics_from_bytes(&bytes)?)?
        }
        Kind::Dataset => {
            llvm_ml_codec::to_json_pretty(&llvm_ml_codec::dataset_from_bytes(&bytes)?)?
        }
    };

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.output, text)?;
    info!(path = %args.output.display(), "unpacked record");

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
