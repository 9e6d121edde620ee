//! `bench`: compile one (or a directory of) basic block(s), run it through
//! the Sandboxed Runner, and emit a `Metrics` record.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use llvm_ml_common::consts::DEFAULT_NUM_REPEAT_NOISE;
use llvm_ml_common::metrics::MetricsRecord;
use llvm_ml_common::result::measure;
use llvm_ml_harness::create_cpu_test_harness;
use llvm_ml_harness::asm_builder::X86AsmBuilder;
use llvm_ml_runner::{aggregate, SandboxedRunner};
use llvm_ml_target::asm::parse;

/// Cycle-accurate basic-block benchmark harness.
#[derive(Parser, Debug)]
#[command(name = "bench")]
#[command(author = "llvm-ml")]
#[command(version)]
#[command(about = "Measure one or many x86-64 basic blocks")]
struct Args {
    /// Input assembly file, or a directory of `.s` files (batch mode).
    path: PathBuf,

    /// Output path: a file in single-input mode, a directory in batch mode.
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Unroll factor for the workload; 0 requests auto-calibration.
    #[arg(long = "num-repeat", default_value_t = 0)]
    num_repeat: u32,

    /// Unroll factor for the noise/baseline harness.
    #[arg(long = "num-repeat-noise", default_value_t = DEFAULT_NUM_REPEAT_NOISE)]
    num_repeat_noise: u32,

    /// Max trials per harness.
    #[arg(short = 'r', default_value_t = llvm_ml_common::consts::DEFAULT_MAX_TRIALS)]
    max_trials: u32,

    /// CPU id(s) to pin to; repeatable, at least one required.
    #[arg(short = 'c', action = clap::ArgAction::Append, required = true)]
    cpu: Vec<usize>,

    /// Emit diagnostics JSON instead of packed binary.
    #[arg(long)]
    readable_json: bool,

    /// Override target architecture selection (single-target build: only
    /// `x86_64` is accepted today).
    #[arg(long)]
    arch: Option<String>,

    /// Override target triple selection.
    #[arg(long)]
    triple: Option<String>,

    /// Batch-mode error log (JSON Lines, one object per failed input).
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Enable verbose (DEBUG) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(err) = run(&args) {
        error!("bench failed: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arch) = &args.arch {
        if arch != "x86_64" && arch != "x86-64" {
            return Err(format!("unsupported --arch {arch:?}: only x86_64 is implemented").into());
        }
    }
    if let Some(triple) = &args.triple {
        warn!(triple, "ignoring --triple override: this build only targets x86_64-unknown-linux-gnu");
    }

    let runner = SandboxedRunner::new(*args.cpu.first().expect("clap enforces at least one -c"));

    if args.path.is_dir() {
        run_batch(args, &runner)
    } else {
        let output = if args.output.is_dir() || args.output.extension().is_none() {
            let ext = if args.readable_json { "json" } else { "cbuf" };
            args.output.join(format!("{}.{ext}", file_stem(&args.path)))
        } else {
            args.output.clone()
        };
        run_one(args, &runner, &args.path, &output)
    }
}

fn run_batch(args: &Args, runner: &SandboxedRunner) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&args.output)?;
    let mut log_entries = Vec::new();

    for entry in std::fs::read_dir(&args.path)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("s") {
            continue;
        }
        let ext = if args.readable_json { "json" } else { "cbuf" };
        let output = args.output.join(format!("{}.{ext}", file_stem(&path)));

        if let Err(err) = run_one(args, runner, &path, &output) {
            warn!(path = %path.display(), %err, "block failed");
            log_entries.push(serde_json::json!({
                "path": path.to_string_lossy(),
                "error": err.to_string(),
            }));
        }
    }

    if let Some(log_path) = &args.log_file {
        let text = log_entries
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(log_path, text)?;
    }

    Ok(())
}

fn run_one(
    args: &Args,
    runner: &SandboxedRunner,
    input: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(input = %input.display(), "benchmarking block");

    let source = std::fs::read_to_string(input)?;
    let instructions = parse(&source)?;
    if instructions.is_empty() {
        return Err("block contains no instructions".into());
    }

    let workload_unroll = if args.num_repeat == 0 {
        let check_module = create_cpu_test_harness(&source, 1, &X86AsmBuilder)?;
        runner.check(&check_module, args.num_repeat_noise)?
    } else {
        args.num_repeat
    };

    let module = create_cpu_test_harness(&source, workload_unroll, &X86AsmBuilder)?;
    let (noise_trials, workload_trials) =
        runner.run(&module, args.num_repeat_noise, workload_unroll, args.max_trials)?;

    let noise = aggregate(noise_trials);
    let workload = aggregate(workload_trials.clone());
    if workload.failed {
        warn!(input = %input.display(), "every workload trial failed; writing a no-sample record");
    }
    let measurement = measure(&workload, &noise);

    let mut record = MetricsRecord::new(source, workload_unroll);
    record.measured_cycles = measurement.measured_cycles;
    record.workload_samples = workload_trials;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if args.readable_json {
        std::fs::write(output, llvm_ml_codec::to_json_pretty(&record)?)?;
    } else {
        std::fs::write(output, llvm_ml_codec::metrics_to_bytes(&record))?;
    }

    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("block")
        .to_string()
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
