//! `embedding`: build a `Graph` record from a basic block's assembly text
//! Accepts either a single `.s` file or a directory.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use llvm_ml_graph::{build_graph, BuildOptions};
use llvm_ml_target::asm::parse;
use llvm_ml_target::X86Target;

/// Graph Builder.
#[derive(Parser, Debug)]
#[command(name = "embedding")]
#[command(version)]
#[command(about = "Build a data-flow graph from a basic block")]
struct Args {
    /// Input `.s` file, or a directory of them (batch mode).
    path: PathBuf,

    /// Output path: a file in single-input mode, a directory in batch mode.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Prepend a virtual root node linking every instruction.
    #[arg(long = "virtual-root")]
    virtual_root: bool,

    /// Add in-order (program-order) edges between consecutive instructions.
    #[arg(long = "in-order")]
    in_order: bool,

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
        error!("embedding failed: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let target = X86Target;
    let opts = BuildOptions {
        add_virtual_root: args.virtual_root,
        in_order_links: args.in_order,
        max_opcodes: 0,
    };

    if args.path.is_dir() {
        std::fs::create_dir_all(&args.output)?;
        for entry in std::fs::read_dir(&args.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("s") {
                continue;
            }
            let ext = if args.readable_json { "json" } else { "cbuf" };
            let output = args.output.join(format!("{}.{ext}", file_stem(&path)));
            build_one(&target, opts, &path, &output, args.readable_json)?;
        }
    } else {
        build_one(&target, opts, &args.path, &args.output, args.readable_json)?;
    }

    info!("embedding complete");
    Ok(())
}

fn build_one(
    target: &X86Target,
    opts: BuildOptions,
    input: &Path,
    output: &Path,
    readable_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(input)?;
    let instructions = parse(&source)?;
    let graph = build_graph(target, &instructions, input.to_string_lossy(), opts)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if readable_json {
        std::fs::write(output, llvm_ml_codec::to_json_pretty(&graph)?)?;
    } else {
        std::fs::write(output, llvm_ml_codec::graph_to_bytes(&graph))?;
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("block").to_string()
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
