//! Fuzz the grade snapshot store.
//!
//! [SnapshotTarget] drives a fresh [Store] with random account registrations, snapshot writes,
//! snapshot reads, and jumps of a simulated clock in both directions. It keeps its own record
//! of every accepted write (the oracle) and checks that:
//!
//! - reads return exactly the values the oracle expects for the account and course (at most one
//!   value per UTC calendar day, the last one written that day, ordered by day),
//! - reads for one account never return values written for another,
//! - the times returned alongside values are strictly increasing,
//! - no more than 5% of reads (or writes) take longer than 10ms.

use chrono::NaiveDate;
use gradebook_harness::{
    choice::WeightedChoice,
    latency::Budget,
    target::{Results, Step, Target},
    time::TimeShim,
    Error,
};
use gradebook_snapshot::{day, AccountId, Clock, Config as StoreConfig, Store};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use rand::{rngs::StdRng, Rng};
use std::{
    collections::HashMap,
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::debug;

/// Relative likelihood of reusing a known identifier versus synthesizing a new one.
const REUSE_WEIGHTS: [u32; 2] = [4, 1];

/// Relative likelihood of a random, zero, negative, minimum, or maximum synthesized account id.
const ACCOUNT_WEIGHTS: [u32; 5] = [12, 1, 1, 1, 1];

/// Relative likelihood of a realistic, empty, padded, non-ASCII, long, or hostile course id.
const COURSE_WEIGHTS: [u32; 6] = [12, 1, 1, 1, 1, 1];

const SUBJECTS: [&str; 8] = ["MATH", "ENGL", "HIST", "BIOL", "CHEM", "PHYS", "ARTS", "COMP"];
const NAMES: [&str; 6] = ["ada", "grace", "alan", "edsger", "barbara", "ken"];
const DOMAINS: [&str; 3] = ["school.example", "students.example", "district.example"];

/// Simulated time starts somewhere in the year following 2024-01-01T00:00:00Z.
const START: Duration = Duration::from_secs(1_704_067_200);
const START_SPREAD: u64 = 365 * 24 * 60 * 60;

/// Configuration for [SnapshotTarget].
#[derive(Clone, Debug)]
pub struct Config {
    /// Configuration of the wrapped store.
    pub store: StoreConfig,

    /// Calls slower than this count against the latency budget.
    pub threshold: Duration,

    /// Maximum fraction of calls (per operation) allowed to exceed `threshold`.
    pub max_exceeded: f64,

    /// Delay added to every timed store call.
    pub latency: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            threshold: Duration::from_millis(10),
            max_exceeded: 0.05,
            latency: Duration::ZERO,
        }
    }
}

/// A [Clock] that reads a [TimeShim].
#[derive(Clone)]
pub struct Simulated(TimeShim);

impl Clock for Simulated {
    fn current(&self) -> SystemTime {
        self.0.now()
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct StepLabel {
    step: String,
}

/// Build a [SnapshotTarget] with the default [Config].
pub fn build(rng: &mut StdRng, registry: &mut Registry) -> Result<SnapshotTarget, Error> {
    SnapshotTarget::new(rng, registry, Config::default())
}

/// A [Target] wrapping a fresh [Store] and a simulated clock.
pub struct SnapshotTarget {
    cfg: Config,
    store: Store<Simulated>,
    time: TimeShim,

    oracle: HashMap<(AccountId, String), Vec<(NaiveDate, f32)>>,
    accounts: Vec<AccountId>,
    courses: Vec<String>,

    reuse: WeightedChoice,
    account_kind: WeightedChoice,
    course_kind: WeightedChoice,

    get_latency: Budget,
    make_latency: Budget,
    calls: Family<StepLabel, Counter>,
}

impl SnapshotTarget {
    pub fn new(rng: &mut StdRng, registry: &mut Registry, cfg: Config) -> Result<Self, Error> {
        let start = UNIX_EPOCH + START + Duration::from_secs(rng.gen_range(0..START_SPREAD));
        let time = TimeShim::new(start);
        let store = Store::init(Simulated(time.clone()), registry, cfg.store.clone())
            .map_err(|err| Error::Fatal(format!("unable to initialize store: {err}")))?;

        let calls = Family::<StepLabel, Counter>::default();
        registry.sub_registry_with_prefix("fuzz").register(
            "step_calls",
            "Number of times each step was invoked",
            calls.clone(),
        );
        Ok(Self {
            get_latency: Budget::new("get_snapshots", cfg.threshold),
            make_latency: Budget::new("make_snapshot", cfg.threshold),
            cfg,
            store,
            time,
            oracle: HashMap::new(),
            accounts: Vec::new(),
            courses: Vec::new(),
            reuse: WeightedChoice::new(&REUSE_WEIGHTS)?,
            account_kind: WeightedChoice::new(&ACCOUNT_WEIGHTS)?,
            course_kind: WeightedChoice::new(&COURSE_WEIGHTS)?,
            calls,
        })
    }

    fn count(&self, step: &str) {
        self.calls
            .get_or_create(&StepLabel {
                step: step.to_string(),
            })
            .inc();
    }

    fn get_snapshots(&mut self, rng: &mut StdRng, results: &mut Results) -> Result<(), Error> {
        self.count("get_snapshots");
        let account = self.pick_account(rng);
        let course = self.pick_course(rng);
        self.check(account, &course, results);
        Ok(())
    }

    fn make_snapshot(&mut self, rng: &mut StdRng, _: &mut Results) -> Result<(), Error> {
        self.count("make_snapshot");
        let account = self.pick_account(rng);
        let course = self.pick_course(rng);
        let value = ((rng.gen::<f64>() * 100.0).round() / 100.0) as f32;
        self.make(account, course, value);
        Ok(())
    }

    fn add_account(&mut self, rng: &mut StdRng, results: &mut Results) -> Result<(), Error> {
        self.count("add_account");
        let email = format!(
            "{}.{}@{}",
            NAMES[rng.gen_range(0..NAMES.len())],
            rng.gen_range(0..1_000),
            DOMAINS[rng.gen_range(0..DOMAINS.len())]
        );
        match self.store.add_account(&email) {
            Ok(account) => {
                if self.accounts.contains(&account) {
                    results.fail(format!("add_account reused id {account} for {email}"));
                    return Ok(());
                }
                self.accounts.push(account);
            }
            Err(err) => debug!(%email, ?err, "unable to add account"),
        }
        Ok(())
    }

    fn add_time(&mut self, rng: &mut StdRng, _: &mut Results) -> Result<(), Error> {
        self.count("add_time");
        let delta = self.time.advance(rng);
        debug!(?delta, "advanced clock");
        Ok(())
    }

    fn sub_time(&mut self, rng: &mut StdRng, _: &mut Results) -> Result<(), Error> {
        self.count("sub_time");
        let delta = self.time.retreat(rng);
        debug!(?delta, "rewound clock");
        Ok(())
    }

    /// Write `value` and, if the store accepts it, record it in the oracle for the current day.
    fn make(&mut self, account: AccountId, course: String, value: f32) {
        let latency = self.cfg.latency;
        let store = &mut self.store;
        let outcome = self.make_latency.time(|| {
            pause(latency);
            store.make_snapshot(account, &course, value)
        });
        if let Err(err) = outcome {
            debug!(account, %course, ?err, "make_snapshot rejected");
            return;
        }

        let today = self.today();
        let days = self.oracle.entry((account, course.clone())).or_default();
        match days.binary_search_by_key(&today, |(day, _)| *day) {
            Ok(index) => days[index].1 = value,
            Err(index) => days.insert(index, (today, value)),
        }
        if !self.courses.contains(&course) {
            self.courses.push(course);
        }
    }

    /// Read snapshots for `account` in `course` and compare them with the oracle.
    fn check(&mut self, account: AccountId, course: &str, results: &mut Results) {
        let latency = self.cfg.latency;
        let store = &self.store;
        let outcome = self.get_latency.time(|| {
            pause(latency);
            store.get_snapshots(account, course)
        });
        let (values, times) = match outcome {
            Ok(snapshots) => snapshots,
            Err(err) => {
                debug!(account, course, ?err, "get_snapshots rejected");
                return;
            }
        };

        let expected: Vec<f32> = self
            .oracle
            .get(&(account, course.to_string()))
            .map(|days| days.iter().map(|(_, value)| *value).collect())
            .unwrap_or_default();
        if values.len() != expected.len() {
            results.fail(format!(
                "get_snapshots returned {} values for account={account} course={course:?}, expected {} ({expected:?}, got {values:?})",
                values.len(),
                expected.len()
            ));
            return;
        }
        for (index, (got, want)) in values.iter().zip(&expected).enumerate() {
            if got != want {
                results.fail(format!(
                    "get_snapshots mismatch at index {index} for account={account} course={course:?}: expected {want}, got {got}"
                ));
            }
        }
        if times.len() != values.len() {
            results.fail(format!(
                "get_snapshots returned {} times for {} values (account={account} course={course:?})",
                times.len(),
                values.len()
            ));
        } else if times.windows(2).any(|pair| pair[0] >= pair[1]) {
            results.fail(format!(
                "get_snapshots times out of order for account={account} course={course:?}"
            ));
        }
    }

    /// The UTC calendar day of the simulated clock.
    fn today(&self) -> NaiveDate {
        day(self.time.now())
    }

    fn pick_account(&self, rng: &mut StdRng) -> AccountId {
        if !self.accounts.is_empty() && self.reuse.sample(rng) == 0 {
            return self.accounts[rng.gen_range(0..self.accounts.len())];
        }
        match self.account_kind.sample(rng) {
            0 => rng.gen(),
            1 => 0,
            2 => rng.gen_range(AccountId::MIN..0),
            3 => AccountId::MIN,
            _ => AccountId::MAX,
        }
    }

    fn pick_course(&self, rng: &mut StdRng) -> String {
        if !self.courses.is_empty() && self.reuse.sample(rng) == 0 {
            return self.courses[rng.gen_range(0..self.courses.len())].clone();
        }
        match self.course_kind.sample(rng) {
            0 => format!(
                "{}-{}",
                SUBJECTS[rng.gen_range(0..SUBJECTS.len())],
                rng.gen_range(100..500)
            ),
            1 => String::new(),
            2 => format!("  {}-{} ", SUBJECTS[0], rng.gen_range(100..500)),
            3 => format!("数学-{}", rng.gen_range(100..500)),
            4 => "x".repeat(rng.gen_range(
                self.cfg.store.max_course_len / 2..self.cfg.store.max_course_len * 2,
            )),
            _ => format!("MATH-101\0'; DROP TABLE snapshots;--{}", rng.gen::<u8>()),
        }
    }
}

fn pause(latency: Duration) {
    if !latency.is_zero() {
        thread::sleep(latency);
    }
}

impl Target for SnapshotTarget {
    fn steps(&self) -> Vec<Step<Self>> {
        vec![
            Step::new("get_snapshots", Self::get_snapshots),
            Step::new("make_snapshot", Self::make_snapshot),
            Step::new("add_account", Self::add_account),
            Step::new("add_time", Self::add_time),
            Step::new("sub_time", Self::sub_time),
        ]
    }

    fn on_end(&mut self, results: &mut Results) {
        self.get_latency.check(self.cfg.max_exceeded, results);
        self.make_latency.check(self.cfg.max_exceeded, results);
    }
}
