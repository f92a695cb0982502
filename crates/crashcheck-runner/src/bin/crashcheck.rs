//! CLI for the crashcheck fault oracle.
//!
//! # Usage
//!
//! ```bash
//! # Derived single-crash probability for a scenario shape
//! crashcheck probability --possible-crashes 50 --actors 4
//!
//! # Run synthetic invocations and report how often the oracle fired
//! crashcheck simulate --threads 4 --crash-points 50 --invocations 500
//!
//! # Same, as JSON, with a fixed seed
//! crashcheck simulate --seed 7 --json
//!
//! # Load the oracle configuration from a file
//! crashcheck simulate --oracle-config oracle.json --output outcomes.json
//!
//! # Scenario shape from a test configuration, with overrides
//! crashcheck simulate --test-config test.json --iterations 2 --invocations 50
//! ```
//!
//! Without `--seed` or `--oracle-config`, the seed and crash budget come
//! from `CRASHCHECK_SEED` and `CRASHCHECK_EXPECTED_CRASHES`.  Without
//! `--test-config`, a single iteration of 100 invocations runs with one
//! actor on each of 4 threads.

use clap::{Args, Parser, Subcommand};
use crashcheck_fault::config::OracleConfig;
use crashcheck_fault::oracle::{CrashParameters, FaultOracle};
use crashcheck_fault::tracker::RecoverableStateTracker;
use crashcheck_runner::configuration::TestConfiguration;
use crashcheck_runner::report::{format_simulation, save_summaries_json};
use crashcheck_runner::simulation::{simulate, SimulationConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "crashcheck")]
#[command(about = "Seeded crash and flush decisions for recoverable-algorithm testing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the single-crash probability for a scenario shape.
    Probability {
        /// Crash-eligible points per actor.
        #[arg(short, long)]
        possible_crashes: i64,

        /// Concurrent actors.
        #[arg(short, long)]
        actors: i64,

        /// Target mean crashes per invocation.
        #[arg(short, long, default_value = "10")]
        expected: i64,
    },

    /// Run synthetic invocations against the oracle.
    Simulate {
        /// Seed for the draw source (overrides the environment).
        #[arg(short, long)]
        seed: Option<u64>,

        /// Oracle configuration JSON file.
        #[arg(long)]
        oracle_config: Option<PathBuf>,

        /// Test configuration JSON file (scenario shape and invocation counts).
        #[arg(long)]
        test_config: Option<PathBuf>,

        #[command(flatten)]
        shape: ShapeArgs,

        /// Crash-eligible points per actor.
        #[arg(short, long, default_value = "50")]
        crash_points: usize,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Write per-invocation outcome summaries to this JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Overrides applied on top of the test configuration.
#[derive(Args)]
struct ShapeArgs {
    /// Iterations (scenarios) to run.
    #[arg(long)]
    iterations: Option<usize>,

    /// Invocations per iteration.
    #[arg(short, long)]
    invocations: Option<usize>,

    /// Parallel threads per invocation.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Actors per parallel thread.
    #[arg(long)]
    actors_per_thread: Option<usize>,

    /// Sequential actors before the parallel part.
    #[arg(long)]
    actors_before: Option<usize>,

    /// Sequential actors after the parallel part.
    #[arg(long)]
    actors_after: Option<usize>,

    /// Target mean crashes per invocation.
    #[arg(short, long)]
    expected: Option<i64>,
}

impl ShapeArgs {
    fn apply(&self, test: &mut TestConfiguration) {
        if let Some(v) = self.iterations {
            test.iterations = v;
        }
        if let Some(v) = self.invocations {
            test.invocations_per_iteration = v;
        }
        if let Some(v) = self.threads {
            test.threads = v;
        }
        if let Some(v) = self.actors_per_thread {
            test.actors_per_thread = v;
        }
        if let Some(v) = self.actors_before {
            test.actors_before = v;
        }
        if let Some(v) = self.actors_after {
            test.actors_after = v;
        }
        if let Some(v) = self.expected {
            test.expected_crashes = v;
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probability {
            possible_crashes,
            actors,
            expected,
        } => cmd_probability(possible_crashes, actors, expected),
        Commands::Simulate {
            seed,
            oracle_config,
            test_config,
            shape,
            crash_points,
            json,
            output,
        } => cmd_simulate(
            seed,
            oracle_config,
            test_config,
            shape,
            crash_points,
            json,
            output,
        ),
    }
}

fn cmd_probability(possible_crashes: i64, actors: i64, expected: i64) {
    let parameters = CrashParameters::new(possible_crashes, actors, expected);
    println!("Possible crashes:       {}", parameters.total_possible_crashes());
    println!("Actors:                 {}", parameters.total_actors());
    println!("Expected crashes:       {}", parameters.expected_crashes());
    println!(
        "Single crash p:         {:.6}",
        parameters.single_crash_probability()
    );
    if parameters.is_floored() {
        println!("Note: possible crashes x actors < 1, denominator floored to 1");
    }
}

fn cmd_simulate(
    seed: Option<u64>,
    oracle_config: Option<PathBuf>,
    test_config: Option<PathBuf>,
    shape: ShapeArgs,
    crash_points: usize,
    json: bool,
    output: Option<PathBuf>,
) {
    let loaded = match oracle_config {
        Some(path) => OracleConfig::load(&path),
        None => OracleConfig::from_env(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid oracle configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(seed) = seed {
        config.seed = seed;
    }

    let mut simulation = SimulationConfig {
        crash_points_per_actor: crash_points,
        ..Default::default()
    };
    match test_config {
        Some(path) => match TestConfiguration::load(&path) {
            Ok(test) => simulation.test = test,
            Err(e) => {
                eprintln!("Error: invalid test configuration: {}", e);
                std::process::exit(1);
            }
        },
        None => simulation.test.expected_crashes = config.expected_crashes,
    }
    shape.apply(&mut simulation.test);
    if let Err(e) = simulation.test.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let tracker = Arc::new(RecoverableStateTracker::new());
    let oracle = FaultOracle::new(config, tracker.clone());
    let report = simulate(&simulation, &oracle, &tracker);

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: failed to serialize report: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print!("{}", format_simulation(&report, oracle.seed()));
    }

    if let Some(path) = output {
        if let Err(e) = save_summaries_json(&report.outcomes, &path) {
            eprintln!("Error: failed to write {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
