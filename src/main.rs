//! vthread-bench - platform threads vs. virtual threads
//!
//! Times N sleeping work items on a pool of reusable OS threads and on a
//! per-task executor, and prints one line per run.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, LevelFilter};

use vthread_bench::bench::run_suite;
use vthread_bench::{sequence, BenchConfig, PoolKind, Result};

/// Platform vs. virtual thread benchmark
#[derive(Parser, Debug)]
#[command(name = "vthread-bench")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the timing suite
    Run {
        /// JSON config file; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Which pools to time
        #[arg(short, long, value_enum, default_value_t = KindArg::Both)]
        kind: KindArg,

        /// Work items per run (repeatable)
        #[arg(short, long = "tasks")]
        tasks: Vec<usize>,

        /// How long each item sleeps, in milliseconds
        #[arg(short, long = "pause-ms")]
        pause_ms: Option<u64>,

        /// Upper bound on platform worker threads
        #[arg(long = "max-threads")]
        max_threads: Option<usize>,
    },
    /// Print the ordered-sequence walk-through
    Sequence,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Platform,
    Virtual,
    Both,
}

impl KindArg {
    fn kinds(self) -> Vec<PoolKind> {
        match self {
            KindArg::Platform => vec![PoolKind::Platform],
            KindArg::Virtual => vec![PoolKind::Virtual],
            KindArg::Both => vec![PoolKind::Platform, PoolKind::Virtual],
        }
    }
}

fn setup_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Run {
            config,
            kind,
            tasks,
            pause_ms,
            max_threads,
        } => {
            let mut config = match config {
                Some(path) => BenchConfig::from_json_file(path)?,
                None => BenchConfig::default(),
            };
            if !tasks.is_empty() {
                config.task_counts = tasks;
            }
            if let Some(ms) = pause_ms {
                config.pause_ms = ms;
            }
            if let Some(n) = max_threads {
                config.platform.max_threads = n;
            }
            config.validate()?;

            run_suite(&kind.kinds(), &config, |m| println!("{}", m))?;
        }
        Command::Sequence => {
            for line in sequence::demo()? {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
