//! Describe a stateful system under test as an ordered set of steps.
//!
//! Each [Target] lists its steps explicitly. The [Dispatcher] inspects a live instance, validates
//! the list, and exposes it by index so that selecting "step `i`" means the same operation on
//! every instance of the same target type (which is what makes a seeded run reproducible).

use crate::Error;
use prometheus_client::registry::Registry;
use rand::rngs::StdRng;
use std::collections::HashSet;

/// Signature of a step.
///
/// Returning an error aborts the whole run. Property violations of the system under test must
/// instead be recorded with [Results::fail].
pub type StepFn<T> = fn(&mut T, &mut StdRng, &mut Results) -> Result<(), Error>;

/// A named operation on a [Target].
pub struct Step<T> {
    name: &'static str,
    run: StepFn<T>,
}

impl<T> Step<T> {
    pub const fn new(name: &'static str, run: StepFn<T>) -> Self {
        Self { name, run }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Execute the step against `target`.
    pub fn run(
        &self,
        target: &mut T,
        rng: &mut StdRng,
        results: &mut Results,
    ) -> Result<(), Error> {
        (self.run)(target, rng, results)
    }
}

impl<T> Clone for Step<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Step<T> {}

/// A stateful system that can be driven by random sequences of steps.
///
/// Every step must tolerate being invoked in any order and at any point in a run.
pub trait Target: Sized {
    /// The steps eligible for random selection, in a stable order.
    fn steps(&self) -> Vec<Step<Self>>;

    /// Invoked once after all steps of a run complete (and never after a run aborts).
    ///
    /// Use this for aggregate checks that cannot be evaluated per step.
    fn on_end(&mut self, _results: &mut Results) {}
}

/// Builds a fresh [Target] for each run.
///
/// The provided `rng` is the same stream the run will use to select steps, and `registry` is
/// the telemetry sink for the run (discarded when the run ends).
pub trait Provider: Send + Sync {
    type Target: Target;

    fn build(&self, rng: &mut StdRng, registry: &mut Registry) -> Result<Self::Target, Error>;
}

impl<T, F> Provider for F
where
    T: Target,
    F: Fn(&mut StdRng, &mut Registry) -> Result<T, Error> + Send + Sync,
{
    type Target = T;

    fn build(&self, rng: &mut StdRng, registry: &mut Registry) -> Result<T, Error> {
        self(rng, registry)
    }
}

/// The validated steps of a [Target] instance.
pub struct Dispatcher<T> {
    steps: Vec<Step<T>>,
}

impl<T: Target> Dispatcher<T> {
    /// Discover the steps of `target`.
    ///
    /// Two steps may not share a name.
    pub fn inspect(target: &T) -> Result<Self, Error> {
        let steps = target.steps();
        let mut seen = HashSet::with_capacity(steps.len());
        for step in &steps {
            if !seen.insert(step.name) {
                return Err(Error::DuplicateStep(step.name));
            }
        }
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the step at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Step<T>> {
        self.steps.get(index)
    }

    /// Names of all steps, in selection order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().map(Step::name)
    }
}

/// Violations (and, optionally, the sequence of steps) recorded during one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Results {
    failures: Vec<String>,
    trace: Option<Vec<String>>,
}

impl Results {
    /// Create an empty accumulator, recording a trace of invoked steps if `trace` is set.
    pub fn new(trace: bool) -> Self {
        Self {
            failures: Vec::new(),
            trace: trace.then(Vec::new),
        }
    }

    /// Record a violated property. The run continues.
    pub fn fail(&mut self, failure: impl Into<String>) {
        self.failures.push(failure.into());
    }

    /// Append an entry to the trace (if enabled).
    pub fn record(&mut self, entry: impl Into<String>) {
        if let Some(trace) = &mut self.trace {
            trace.push(entry.into());
        }
    }

    /// Returns `true` if any property was violated.
    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Returns the trace, if enabled.
    pub fn trace(&self) -> Option<&[String]> {
        self.trace.as_deref()
    }

    pub fn into_failures(self) -> Vec<String> {
        self.failures
    }
}
