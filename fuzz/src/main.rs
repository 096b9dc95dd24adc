//! Explore (or replay) random operation sequences against gradebook components.

use clap::{value_parser, Arg, ArgMatches, Command};
use gradebook_fuzz::snapshot;
use gradebook_harness::{
    campaign::{self, Config, Outcome},
    target::Provider,
    Path,
};
use std::{num::NonZeroUsize, process::ExitCode};
use tracing::{error, info, Level};

/// Every path passed (or the requested path was replayed without a violation).
const EXIT_PASSED: u8 = 0;

/// A path violated a property.
const EXIT_VIOLATION: u8 = 1;

/// A path could not be run.
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let matches = Command::new("gradebook-fuzz")
        .about("Explore (or replay) random operation sequences against gradebook components.")
        .subcommand_required(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .value_parser(value_parser!(Level))
                .help("Maximum level of emitted logs"),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Fuzz the grade snapshot store")
                .arg(
                    Arg::new("path")
                        .long("path")
                        .allow_hyphen_values(true)
                        .value_parser(value_parser!(Path))
                        .help("Replay a single path (formatted as seed:steps) with a trace"),
                )
                .arg(
                    Arg::new("min-steps")
                        .long("min-steps")
                        .default_value("10")
                        .value_parser(value_parser!(u64))
                        .help("Minimum number of steps in an explored path (inclusive)"),
                )
                .arg(
                    Arg::new("max-steps")
                        .long("max-steps")
                        .default_value("200")
                        .value_parser(value_parser!(u64))
                        .help("Maximum number of steps in an explored path (exclusive)"),
                )
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .value_parser(value_parser!(NonZeroUsize))
                        .help("Number of worker threads (defaults to the available cores)"),
                )
                .arg(
                    Arg::new("max-paths")
                        .long("max-paths")
                        .value_parser(value_parser!(u64))
                        .help("Stop after this many paths pass (runs until a violation if unset)"),
                ),
        )
        .get_matches();

    // Create logger
    let level = matches
        .get_one::<Level>("log-level")
        .copied()
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let code = match matches.subcommand() {
        Some(("snapshot", matches)) => execute(&snapshot::build, matches),
        _ => {
            error!("unknown target");
            EXIT_FATAL
        }
    };
    ExitCode::from(code)
}

/// Replay the requested path or explore random ones, returning the exit code.
fn execute<P: Provider>(provider: &P, matches: &ArgMatches) -> u8 {
    if let Some(path) = matches.get_one::<Path>("path") {
        return match campaign::replay(provider, *path) {
            Ok(results) if results.failed() => EXIT_VIOLATION,
            Ok(_) => EXIT_PASSED,
            Err(_) => EXIT_FATAL,
        };
    }

    let defaults = Config::default();
    let cfg = Config {
        min_steps: matches
            .get_one::<u64>("min-steps")
            .copied()
            .unwrap_or(defaults.min_steps),
        max_steps: matches
            .get_one::<u64>("max-steps")
            .copied()
            .unwrap_or(defaults.max_steps),
        workers: matches.get_one::<NonZeroUsize>("workers").copied(),
        max_paths: matches.get_one::<u64>("max-paths").copied(),
        ..defaults
    };
    match campaign::explore(provider, &cfg) {
        Ok(Outcome::Exhausted { paths }) => {
            info!(paths, "no violations found");
            EXIT_PASSED
        }
        Ok(Outcome::Failed(failure)) => {
            info!(path = %failure.path, "violation found");
            EXIT_VIOLATION
        }
        Err(err) => {
            error!(?err, "exploration failed");
            EXIT_FATAL
        }
    }
}
