//! Execute a single [Path] against a [Target].

use crate::{
    target::{Dispatcher, Provider, Results, Target},
    Error, Path,
};
use prometheus_client::registry::Registry;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::trace;

/// Invoke `steps` uniformly selected steps of `target`, then its end hook.
///
/// A step that returns an error aborts the run immediately: no results are returned and the end
/// hook is not invoked. With `steps == 0` only the end hook runs.
pub fn run_path<T: Target>(
    target: &mut T,
    rng: &mut StdRng,
    steps: u64,
    trace: bool,
) -> Result<Results, Error> {
    let dispatcher = Dispatcher::inspect(target)?;
    if steps > 0 && dispatcher.is_empty() {
        return Err(Error::NoSteps);
    }

    let mut results = Results::new(trace);
    for iteration in 0..steps {
        let index = rng.gen_range(0..dispatcher.len());
        let step = dispatcher.get(index).ok_or(Error::NoSteps)?;
        trace!(iteration, step = step.name(), "invoking step");
        results.record(step.name());
        step.run(target, rng, &mut results).map_err(|err| Error::Step {
            name: step.name(),
            source: Box::new(err),
        })?;
    }
    target.on_end(&mut results);
    Ok(results)
}

/// Build a fresh target with `provider` and run `path` against it.
pub fn run<P: Provider>(provider: &P, path: Path, trace: bool) -> Result<Results, Error> {
    let mut registry = Registry::default();
    run_with_registry(provider, path, trace, &mut registry)
}

/// Like [run], but registers the target's telemetry with a caller-provided registry.
pub fn run_with_registry<P: Provider>(
    provider: &P,
    path: Path,
    trace: bool,
    registry: &mut Registry,
) -> Result<Results, Error> {
    let mut rng = StdRng::seed_from_u64(path.seed);
    let mut target = provider.build(&mut rng, registry)?;
    run_path(&mut target, &mut rng, path.steps, trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Step;
    use std::sync::{Arc, Mutex};

    /// Records every value it draws and flags any draw divisible by 7.
    #[derive(Default)]
    struct Recorder {
        draws: Vec<u32>,
        ends: u32,
    }

    impl Recorder {
        fn draw(&mut self, rng: &mut StdRng, results: &mut Results) -> Result<(), Error> {
            let value = rng.gen_range(0..100);
            if value % 7 == 0 {
                results.fail(format!("drew multiple of 7: {value}"));
            }
            self.draws.push(value);
            Ok(())
        }

        fn skip(&mut self, _: &mut StdRng, _: &mut Results) -> Result<(), Error> {
            Ok(())
        }

        fn abort(&mut self, rng: &mut StdRng, _: &mut Results) -> Result<(), Error> {
            if rng.gen_ratio(1, 4) {
                return Err(Error::Fatal("harness misconfigured".into()));
            }
            Ok(())
        }
    }

    impl Target for Recorder {
        fn steps(&self) -> Vec<Step<Self>> {
            vec![Step::new("draw", Self::draw), Step::new("skip", Self::skip)]
        }

        fn on_end(&mut self, results: &mut Results) {
            self.ends += 1;
            results.record(format!("end after {} draws", self.draws.len()));
        }
    }

    struct Aborting(Recorder);

    impl Aborting {
        fn draw(&mut self, rng: &mut StdRng, results: &mut Results) -> Result<(), Error> {
            self.0.draw(rng, results)
        }

        fn abort(&mut self, rng: &mut StdRng, results: &mut Results) -> Result<(), Error> {
            self.0.abort(rng, results)
        }
    }

    impl Target for Aborting {
        fn steps(&self) -> Vec<Step<Self>> {
            vec![Step::new("draw", Self::draw), Step::new("abort", Self::abort)]
        }

        fn on_end(&mut self, _: &mut Results) {
            panic!("end hook must not run after an abort");
        }
    }

    struct Empty;

    impl Target for Empty {
        fn steps(&self) -> Vec<Step<Self>> {
            Vec::new()
        }

        fn on_end(&mut self, results: &mut Results) {
            results.fail("constructed");
        }
    }

    fn recorder(_: &mut StdRng, _: &mut Registry) -> Result<Recorder, Error> {
        Ok(Recorder::default())
    }

    #[test]
    fn test_deterministic() {
        for seed in 0..32 {
            let path = Path::new(seed, 50);
            let first = run(&recorder, path, true).unwrap();
            let second = run(&recorder, path, true).unwrap();
            assert_eq!(first, second);
            assert_eq!(first.trace().unwrap().len(), 51);
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let first = run(&recorder, Path::new(1, 50), true).unwrap();
        let second = run(&recorder, Path::new(2, 50), true).unwrap();
        assert_ne!(first.trace(), second.trace());
    }

    #[test]
    fn test_exact_step_count() {
        let mut target = Recorder::default();
        let mut rng = StdRng::seed_from_u64(3);
        let results = run_path(&mut target, &mut rng, 200, true).unwrap();
        let trace = results.trace().unwrap();
        assert_eq!(trace.len(), 201);
        let draws = trace.iter().filter(|s| *s == "draw").count();
        assert_eq!(draws, target.draws.len());
        assert_eq!(target.ends, 1);
        assert!(draws > 0 && draws < 200);
    }

    #[test]
    fn test_zero_steps_runs_end_hook() {
        let mut target = Recorder::default();
        let mut rng = StdRng::seed_from_u64(4);
        let results = run_path(&mut target, &mut rng, 0, true).unwrap();
        assert_eq!(target.ends, 1);
        assert_eq!(results.trace().unwrap(), ["end after 0 draws"]);

        let mut rng = StdRng::seed_from_u64(4);
        let results = run_path(&mut Empty, &mut rng, 0, false).unwrap();
        assert_eq!(results.failures(), ["constructed"]);
    }

    #[test]
    fn test_no_steps() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            run_path(&mut Empty, &mut rng, 1, false),
            Err(Error::NoSteps)
        ));
    }

    #[test]
    fn test_fatal_step_aborts() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut target = Aborting(Recorder::default());
        let err = run_path(&mut target, &mut rng, 10_000, false).unwrap_err();
        match err {
            Error::Step { name, source } => {
                assert_eq!(name, "abort");
                assert!(matches!(*source, Error::Fatal(_)));
            }
            err => panic!("unexpected error: {err:?}"),
        }
    }

    #[test]
    fn test_provider_shares_run_rng() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let provider = {
            let seen = seen.clone();
            move |rng: &mut StdRng, _: &mut Registry| {
                seen.lock().unwrap().push(rng.gen::<u64>());
                Ok::<_, Error>(Recorder::default())
            }
        };
        run(&provider, Path::new(9, 3), false).unwrap();
        run(&provider, Path::new(9, 3), false).unwrap();
        run(&provider, Path::new(10, 3), false).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], seen[1]);
        assert_ne!(seen[0], seen[2]);
    }
}
