//! Explore stateful systems with seeded, replayable sequences of random operations.
//!
//! A [target::Target] exposes an ordered list of [target::Step]s. The [runner] executes one
//! [Path] (a seed and a step count) against a freshly built target, selecting a step uniformly
//! at random on each iteration and collecting property violations into [target::Results]. The
//! [campaign] fans paths out across every core and halts on the first violation, reporting the
//! [Path] needed to reproduce it.
//!
//! # Example
//!
//! ```rust
//! use gradebook_harness::{
//!     runner,
//!     target::{Results, Step, Target},
//!     Error, Path,
//! };
//! use prometheus_client::registry::Registry;
//! use rand::rngs::StdRng;
//!
//! struct Counter(u64);
//!
//! impl Counter {
//!     fn increment(&mut self, _: &mut StdRng, _: &mut Results) -> Result<(), Error> {
//!         self.0 += 1;
//!         Ok(())
//!     }
//! }
//!
//! impl Target for Counter {
//!     fn steps(&self) -> Vec<Step<Self>> {
//!         vec![Step::new("increment", Self::increment)]
//!     }
//!
//!     fn on_end(&mut self, results: &mut Results) {
//!         if self.0 != 10 {
//!             results.fail(format!("expected 10 increments, saw {}", self.0));
//!         }
//!     }
//! }
//!
//! let provider = |_: &mut StdRng, _: &mut Registry| Ok::<_, Error>(Counter(0));
//! let results = runner::run(&provider, Path::new(42, 10), false).unwrap();
//! assert!(!results.failed());
//! ```

use thiserror::Error;

pub mod campaign;
pub mod choice;
pub mod latency;
mod path;
pub use path::Path;
pub mod runner;
pub mod target;
pub mod time;

/// Errors that abort a path (or construction of the machinery that runs one).
///
/// Property violations of the system under test are never reported through this type. They
/// are recorded with [target::Results::fail] and the path keeps running.
#[derive(Error, Debug)]
pub enum Error {
    #[error("weights must not be empty")]
    EmptyWeights,
    #[error("weight at index {0} is zero")]
    ZeroWeight(usize),
    #[error("duplicate step: {0}")]
    DuplicateStep(&'static str),
    #[error("target has no steps")]
    NoSteps,
    #[error("fatal: {0}")]
    Fatal(String),
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("step {name} aborted: {source}")]
    Step {
        name: &'static str,
        #[source]
        source: Box<Error>,
    },
    #[error("path {path} crashed: {source}")]
    Crashed {
        path: Path,
        #[source]
        source: Box<Error>,
    },
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}
