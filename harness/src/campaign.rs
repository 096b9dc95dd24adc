//! Explore many random paths in parallel (or replay one).
//!
//! # Exploration
//!
//! [explore] starts one worker thread per available core. Each worker repeatedly draws a fresh
//! seed, picks a step count in `[min_steps, max_steps)`, builds a fresh target, and runs the
//! resulting [Path]. The first path that records a violation (or aborts) raises a shared stop
//! flag and is reported together with the [Path] that reproduces it. Workers only observe the
//! flag between paths, so a path already in flight always runs to completion.
//!
//! # Replay
//!
//! [replay] runs exactly one [Path] synchronously with a trace of every invoked step, which is
//! the intended way to investigate a violation reported by [explore].

use crate::{
    runner::{run, run_with_registry},
    target::{Provider, Results},
    Error, Path,
};
use prometheus_client::{encoding::text::encode, registry::Registry};
use rand::Rng;
use std::{
    any::Any,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, RecvTimeoutError},
        OnceLock,
    },
    thread,
    time::Duration,
};
use tracing::{debug, error, info, warn};

/// Configuration for [explore].
#[derive(Clone, Debug)]
pub struct Config {
    /// Minimum number of steps in a path (inclusive).
    pub min_steps: u64,

    /// Maximum number of steps in a path (exclusive).
    pub max_steps: u64,

    /// Number of worker threads (defaults to the available parallelism).
    pub workers: Option<NonZeroUsize>,

    /// Stop after this many paths complete without a violation (runs forever if unset).
    pub max_paths: Option<u64>,

    /// How often to log the number of completed paths.
    pub progress: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_steps: 10,
            max_steps: 200,
            workers: None,
            max_paths: None,
            progress: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Ensure the configuration describes a non-empty range of step counts.
    pub fn validate(&self) -> Result<(), Error> {
        if self.min_steps >= self.max_steps {
            return Err(Error::InvalidConfig("min_steps must be less than max_steps"));
        }
        if self.progress.is_zero() {
            return Err(Error::InvalidConfig("progress interval must be non-zero"));
        }
        Ok(())
    }

    fn concurrency(&self) -> usize {
        self.workers
            .or_else(|| thread::available_parallelism().ok())
            .map_or(1, NonZeroUsize::get)
    }
}

/// A path that violated at least one property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub path: Path,
    pub failures: Vec<String>,
}

/// How an exploration ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A path recorded at least one violation.
    Failed(Failure),

    /// [Config::max_paths] paths completed without a violation.
    Exhausted { paths: u64 },
}

/// Run `path` once with a trace of every invoked step, logging what happened.
pub fn replay<P: Provider>(provider: &P, path: Path) -> Result<Results, Error> {
    info!(%path, "replaying path");
    let mut registry = Registry::default();
    let results = run_with_registry(provider, path, true, &mut registry).inspect_err(|err| {
        error!(%path, ?err, "path crashed");
    })?;

    if let Some(trace) = results.trace() {
        for (index, step) in trace.iter().enumerate() {
            info!(index, %step, "trace");
        }
    }
    let mut metrics = String::new();
    if encode(&mut metrics, &registry).is_ok() {
        debug!(%metrics, "telemetry");
    }
    if results.failed() {
        report(path, results.failures());
    } else {
        info!(%path, "path passed");
    }
    Ok(results)
}

/// Explore random paths on every core until one fails (or [Config::max_paths] is reached).
///
/// A violation is returned as [Outcome::Failed]. A path that aborts is returned as
/// [Error::Crashed]. Both carry the [Path] needed to reproduce them with [replay].
pub fn explore<P: Provider>(provider: &P, cfg: &Config) -> Result<Outcome, Error> {
    cfg.validate()?;
    let workers = cfg.concurrency();
    info!(
        workers,
        min_steps = cfg.min_steps,
        max_steps = cfg.max_steps,
        "starting exploration"
    );

    let stop = AtomicBool::new(false);
    let paths = AtomicU64::new(0);
    let first = OnceLock::new();
    thread::scope(|scope| {
        // The reporter exits once every worker has dropped its sender
        let (alive, done) = mpsc::channel::<()>();
        let progress = cfg.progress;
        let counter = &paths;
        scope.spawn(move || monitor(counter, done, progress));

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let alive = alive.clone();
                let (stop, paths, first) = (&stop, &paths, &first);
                scope.spawn(move || {
                    work(worker, provider, cfg, stop, paths, first);
                    drop(alive);
                })
            })
            .collect();
        drop(alive);

        for handle in handles {
            if handle.join().is_err() {
                // Panics inside paths are caught, so this is a bug in the worker loop itself
                stop.store(true, Ordering::Release);
                warn!("worker exited unexpectedly");
                let _ = first.set(Err(Error::Panicked("worker exited unexpectedly".into())));
            }
        }
    });

    let paths = paths.into_inner();
    match first.into_inner() {
        Some(outcome) => outcome,
        None => {
            info!(paths, "exploration exhausted");
            Ok(Outcome::Exhausted { paths })
        }
    }
}

/// Run paths until `stop` is raised (or the path limit is reached).
fn work<P: Provider>(
    worker: usize,
    provider: &P,
    cfg: &Config,
    stop: &AtomicBool,
    paths: &AtomicU64,
    first: &OnceLock<Result<Outcome, Error>>,
) {
    let mut seeds = rand::thread_rng();
    while !stop.load(Ordering::Acquire) {
        if let Some(max_paths) = cfg.max_paths {
            if paths.load(Ordering::Relaxed) >= max_paths {
                break;
            }
        }

        let path = Path::new(seeds.gen(), seeds.gen_range(cfg.min_steps..cfg.max_steps));
        debug!(worker, %path, "running path");
        let result = panic::catch_unwind(AssertUnwindSafe(|| run(provider, path, false)))
            .unwrap_or_else(|panic| Err(Error::Panicked(panic_message(panic.as_ref()))));
        match result {
            Ok(results) => {
                paths.fetch_add(1, Ordering::Relaxed);
                if !results.failed() {
                    continue;
                }
                stop.store(true, Ordering::Release);
                report(path, results.failures());
                let failure = Failure {
                    path,
                    failures: results.into_failures(),
                };
                let _ = first.set(Ok(Outcome::Failed(failure)));
                return;
            }
            Err(err) => {
                stop.store(true, Ordering::Release);
                error!(worker, %path, ?err, "path crashed (replay with --path {path})");
                let _ = first.set(Err(Error::Crashed {
                    path,
                    source: Box::new(err),
                }));
                return;
            }
        }
    }
    debug!(worker, "worker stopped");
}

/// Periodically log the number of completed paths until `done` disconnects.
fn monitor(paths: &AtomicU64, done: mpsc::Receiver<()>, interval: Duration) {
    let mut last = 0;
    loop {
        match done.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let current = paths.load(Ordering::Relaxed);
                info!(paths = current, new = current - last, "progress");
                last = current;
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Log every violation of a path together with the information required to replay it.
fn report(path: Path, failures: &[String]) {
    for failure in failures {
        error!(%path, %failure, "property violated");
    }
    error!(
        %path,
        seed = path.seed,
        steps = path.steps,
        violations = failures.len(),
        "path failed (replay with --path {path})"
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
