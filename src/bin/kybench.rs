//! Command-line harness for timing the Knuth-Yao samplers.
//!
//! # Usage
//!
//! ```bash
//! # Write dist.enc, dist.mat and dist.matc for weights 1:3:4:2
//! kybench build --weights 1,3,4,2 --output dist
//!
//! # Draw one million outcomes with the cached matrix, seed 1
//! kybench run dist.matc --sampler ky.matc --seed 1 --steps 1000000
//!
//! # Same, with settings from a TOML file (flags override it)
//! kybench run --config bench.toml --steps 10
//!
//! # Closest 32-bit weights to 0.1:0.3:0.4:0.2 under Hellinger, written as dist.*
//! kybench approx --probabilities 0.1,0.3,0.4,0.2 --divergence hellinger --output dist
//!
//! # Smallest precision with relative entropy below 2^-10
//! kybench approx -p 0.07,0.91,0.02 -d kl --max-error 0.0009765625 --output dist
//! ```
//!
//! `run` prints `SAMPLER CPU_SECONDS RNG_CALLS` followed by the outcome checksum.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use knuth_yao::bench::{self, BenchConfig};
use knuth_yao::{approximate, approximate_within, Divergence};
use ringlog::*;

/// Exact discrete sampling benchmark
#[derive(Parser, Debug)]
#[command(name = "kybench")]
#[command(about = "Build and time Knuth-Yao samplers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Time repeated draws from one representation
    Run(RunArgs),
    /// Write all three representations of a distribution
    Build(BuildArgs),
    /// Approximate real probabilities, then write all three representations
    Approx(ApproxArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Distribution file (overrides `path` in the config)
    path: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the bit source
    #[arg(long)]
    seed: Option<u64>,

    /// Number of draws
    #[arg(long)]
    steps: Option<u64>,

    /// Sampler: ky.enc, ky.mat or ky.matc
    #[arg(short, long)]
    sampler: Option<String>,

    /// Usable bits per generator word (1..=32)
    #[arg(long)]
    word_width: Option<u32>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(clap::Args, Debug)]
struct BuildArgs {
    /// Non-negative integer weights, comma-separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    weights: Vec<u64>,

    /// Output prefix; files get .enc, .mat and .matc appended
    #[arg(short, long)]
    output: PathBuf,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(clap::Args, Debug)]
struct ApproxArgs {
    /// Target probabilities, comma-separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    probabilities: Vec<f64>,

    /// Divergence: tv, hellinger, pchi2, nchi2, td, kl, reverse_kl or js
    #[arg(short, long, default_value = "hellinger")]
    divergence: String,

    /// Expansion length k; every Z = 2^k - 2^l is tried
    #[arg(short = 'k', long, default_value_t = 32, conflicts_with = "max_error")]
    precision: usize,

    /// Use the smallest precision whose error is at most this
    #[arg(long)]
    max_error: Option<f64>,

    /// Output prefix; files get .enc, .mat and .matc appended
    #[arg(short, long)]
    output: PathBuf,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Build(args) => build(args),
        Command::Approx(args) => approx(args),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(file) => BenchConfig::load(file)?,
        None => BenchConfig::default(),
    };
    if let Some(path) = args.path {
        config = config.with_path(path);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(steps) = args.steps {
        config = config.with_steps(steps);
    }
    if let Some(sampler) = args.sampler {
        config = config.with_sampler(sampler);
    }
    if let Some(width) = args.word_width {
        config = config.with_word_width(width);
    }
    if let Some(level) = args.log_level {
        config = config.with_log_level(level);
    }

    let mut log = start_log(config.log_level())?;
    info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let report = bench::run(&config);
    let _ = log.flush();
    let report = report?;

    println!("{report}");
    println!("checksum {}", report.checksum);
    Ok(())
}

fn build(args: BuildArgs) -> Result<(), Box<dyn Error>> {
    let mut log = start_log(&args.log_level)?;
    let written = bench::build_files(&args.weights, &args.output);
    let _ = log.flush();
    for path in written? {
        println!("{}", path.display());
    }
    Ok(())
}

fn approx(args: ApproxArgs) -> Result<(), Box<dyn Error>> {
    let divergence: Divergence = args.divergence.parse()?;
    let mut log = start_log(&args.log_level)?;
    let found = match args.max_error {
        Some(max_error) => approximate_within(&args.probabilities, divergence, max_error),
        None => approximate(&args.probabilities, args.precision, divergence),
    };
    let written = found
        .map_err(Box::<dyn Error>::from)
        .and_then(|found| {
            info!(
                "{divergence}: k={} l={} Z={} error={}",
                found.k, found.l, found.total, found.error
            );
            let written = bench::build_files(&found.weights, &args.output)?;
            Ok((found, written))
        });
    let _ = log.flush();
    let (found, written) = written?;

    let weights: Vec<String> = found.weights.iter().map(u64::to_string).collect();
    println!("weights {}", weights.join(","));
    println!("error {}", found.error);
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

/// Route log records to stderr.
fn start_log(name: &str) -> Result<Box<dyn Drain>, Box<dyn Error>> {
    let level: Level = name
        .parse()
        .map_err(|_| format!("unknown log level {name:?}"))?;
    let stderr = LogBuilder::new()
        .format(ringlog::default_format)
        .output(Box::new(Stderr::new()))
        .build()
        .map_err(|e| format!("failed to initialize log: {e:?}"))?;

    Ok(MultiLogBuilder::new()
        .level_filter(level.to_level_filter())
        .default(stderr)
        .build()
        .start())
}
