//! Track how often an operation exceeds a wall-clock budget.
//!
//! Per-call latencies are i.i.d. across a run, so the fraction of calls over budget is used as a
//! stand-in for a percentile: "no more than 5% of calls over 10ms" approximates a p95 bound.

use crate::target::Results;
use std::time::{Duration, Instant};

/// Counts calls of one operation and how many exceeded `threshold`.
#[derive(Clone, Debug)]
pub struct Budget {
    name: &'static str,
    threshold: Duration,
    calls: u64,
    exceeded: u64,
}

impl Budget {
    pub fn new(name: &'static str, threshold: Duration) -> Self {
        Self {
            name,
            threshold,
            calls: 0,
            exceeded: 0,
        }
    }

    /// Record one call that took `elapsed`.
    pub fn observe(&mut self, elapsed: Duration) {
        self.calls += 1;
        if elapsed > self.threshold {
            self.exceeded += 1;
        }
    }

    /// Run `f`, recording how long it took.
    pub fn time<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        self.observe(start.elapsed());
        result
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn exceeded(&self) -> u64 {
        self.exceeded
    }

    /// Fraction of calls over budget (zero when nothing was observed).
    pub fn ratio(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.exceeded as f64 / self.calls as f64
    }

    /// Record a failure if more than `max_ratio` of calls exceeded the threshold.
    pub fn check(&self, max_ratio: f64, results: &mut Results) {
        let ratio = self.ratio();
        if ratio > max_ratio {
            results.fail(format!(
                "{}: {}/{} calls exceeded {:?} ({:.1}% > {:.1}%)",
                self.name,
                self.exceeded,
                self.calls,
                self.threshold,
                ratio * 100.0,
                max_ratio * 100.0
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runner::run_path,
        target::{Step, Target},
        Error,
    };
    use rand::{rngs::StdRng, SeedableRng};
    use std::thread;

    const THRESHOLD: Duration = Duration::from_millis(10);
    const MAX_RATIO: f64 = 0.05;

    /// A target whose only operation sleeps for a fixed duration.
    struct Sleeper {
        delay: Duration,
        budget: Budget,
    }

    impl Sleeper {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                budget: Budget::new("get_snapshots", THRESHOLD),
            }
        }

        fn get(&mut self, _: &mut StdRng, _: &mut Results) -> Result<(), Error> {
            let delay = self.delay;
            self.budget.time(|| thread::sleep(delay));
            Ok(())
        }
    }

    impl Target for Sleeper {
        fn steps(&self) -> Vec<Step<Self>> {
            vec![Step::new("get", Self::get)]
        }

        fn on_end(&mut self, results: &mut Results) {
            self.budget.check(MAX_RATIO, results);
        }
    }

    #[test]
    fn test_slow_target_fails() {
        let mut target = Sleeper::new(Duration::from_millis(15));
        let mut rng = StdRng::seed_from_u64(0);
        let results = run_path(&mut target, &mut rng, 5, false).unwrap();
        assert_eq!(target.budget.calls(), 5);
        assert_eq!(target.budget.exceeded(), 5);
        assert_eq!(results.failures().len(), 1);
        assert!(results.failures()[0].starts_with("get_snapshots: 5/5"));
    }

    #[test]
    fn test_fast_target_passes() {
        let mut target = Sleeper::new(Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(0);
        let results = run_path(&mut target, &mut rng, 100, false).unwrap();
        assert_eq!(target.budget.calls(), 100);
        assert!(!results.failed());
    }

    #[test]
    fn test_ratio_boundary() {
        let mut budget = Budget::new("make_snapshot", THRESHOLD);
        for _ in 0..95 {
            budget.observe(Duration::from_millis(1));
        }
        for _ in 0..5 {
            budget.observe(Duration::from_millis(11));
        }

        // Exactly 5% is within budget
        let mut results = Results::default();
        budget.check(MAX_RATIO, &mut results);
        assert!(!results.failed());

        // One more slow call tips it over
        budget.observe(Duration::from_millis(11));
        budget.check(MAX_RATIO, &mut results);
        assert!(results.failed());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut budget = Budget::new("get_snapshots", THRESHOLD);
        budget.observe(THRESHOLD);
        assert_eq!(budget.exceeded(), 0);
        assert_eq!(budget.ratio(), 0.0);
    }

    #[test]
    fn test_empty_budget_passes() {
        let budget = Budget::new("get_snapshots", THRESHOLD);
        let mut results = Results::default();
        budget.check(MAX_RATIO, &mut results);
        assert!(!results.failed());
    }
}
