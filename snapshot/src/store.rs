use crate::{metrics::Metrics, Clock, Error};
use chrono::{DateTime, NaiveDate, Utc};
use prometheus_client::registry::Registry;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    time::SystemTime,
};
use tracing::debug;

/// Identifier assigned to an account by [Store::add_account].
pub type AccountId = i64;

/// Configuration for [Store].
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of accounts that can be registered.
    pub max_accounts: usize,

    /// Maximum length (in bytes) of a course identifier.
    pub max_course_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_accounts: 1_024,
            max_course_len: 256,
        }
    }
}

/// Returns the UTC calendar day containing `time`.
pub fn day(time: SystemTime) -> NaiveDate {
    DateTime::<Utc>::from(time).date_naive()
}

/// The snapshot recorded for one day.
#[derive(Clone, Copy, Debug)]
struct Entry {
    value: f32,
    recorded: SystemTime,
}

/// An isolated, in-memory store of accounts and their grade snapshots.
///
/// Every instance starts with an empty schema: accounts (keyed by a sequential id, with unique
/// emails) and snapshots (keyed by account, course, and day).
pub struct Store<C: Clock> {
    clock: C,
    cfg: Config,

    next_account: AccountId,
    accounts: BTreeMap<AccountId, String>,
    emails: HashSet<String>,
    snapshots: HashMap<(AccountId, String), BTreeMap<NaiveDate, Entry>>,

    metrics: Metrics,
}

impl<C: Clock> Store<C> {
    /// Create an empty store that reads the current time from `clock`.
    pub fn init(clock: C, registry: &mut Registry, cfg: Config) -> Result<Self, Error> {
        if cfg.max_accounts == 0 {
            return Err(Error::InvalidConfig("max_accounts must be non-zero"));
        }
        if cfg.max_course_len == 0 {
            return Err(Error::InvalidConfig("max_course_len must be non-zero"));
        }
        Ok(Self {
            clock,
            cfg,
            next_account: 1,
            accounts: BTreeMap::new(),
            emails: HashSet::new(),
            snapshots: HashMap::new(),
            metrics: Metrics::init(registry),
        })
    }

    /// Register a new account, returning its id.
    pub fn add_account(&mut self, email: &str) -> Result<AccountId, Error> {
        if email.is_empty() || !email.contains('@') {
            return Err(Error::InvalidEmail(email.to_string()));
        }
        if self.accounts.len() >= self.cfg.max_accounts {
            return Err(Error::TooManyAccounts(self.cfg.max_accounts));
        }
        if !self.emails.insert(email.to_string()) {
            return Err(Error::DuplicateEmail(email.to_string()));
        }

        let account = self.next_account;
        self.next_account += 1;
        self.accounts.insert(account, email.to_string());
        self.metrics.accounts.set(self.accounts.len() as i64);
        debug!(account, email, "added account");
        Ok(account)
    }

    /// Returns `true` if `account` is registered.
    pub fn has_account(&self, account: AccountId) -> bool {
        self.accounts.contains_key(&account)
    }

    /// Ids of all registered accounts, in ascending order.
    pub fn accounts(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.accounts.keys().copied()
    }

    /// Returns the recorded values (and when each was recorded) for `account` in `course`,
    /// ordered by day.
    ///
    /// An unknown account or course yields empty vectors.
    pub fn get_snapshots(
        &self,
        account: AccountId,
        course: &str,
    ) -> Result<(Vec<f32>, Vec<SystemTime>), Error> {
        self.validate_course(course)?;
        self.metrics.lookups.inc();

        let Some(days) = self.snapshots.get(&(account, course.to_string())) else {
            return Ok((Vec::new(), Vec::new()));
        };
        Ok(days
            .values()
            .map(|entry| (entry.value, entry.recorded))
            .unzip())
    }

    /// Record `value` as the grade of `account` in `course` for the current day.
    ///
    /// If a snapshot was already recorded for the current day, its value is replaced.
    pub fn make_snapshot(
        &mut self,
        account: AccountId,
        course: &str,
        value: f32,
    ) -> Result<(), Error> {
        self.validate_course(course)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidValue(value));
        }
        if !self.has_account(account) {
            return Err(Error::AccountNotFound(account));
        }

        let now = self.clock.current();
        let today = day(now);
        let entry = Entry {
            value,
            recorded: now,
        };
        let days = self
            .snapshots
            .entry((account, course.to_string()))
            .or_default();
        if days.insert(today, entry).is_some() {
            self.metrics.replaced.inc();
            debug!(account, course, %today, value, "replaced snapshot");
        } else {
            self.metrics.made.inc();
            debug!(account, course, %today, value, "made snapshot");
        }
        Ok(())
    }

    fn validate_course(&self, course: &str) -> Result<(), Error> {
        if course.len() > self.cfg.max_course_len {
            return Err(Error::InvalidCourse(course.len()));
        }
        Ok(())
    }
}
