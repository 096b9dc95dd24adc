//! Record and recall per-course grade snapshots for student accounts.
//!
//! A snapshot is the grade (a value in `[0, 1]`) of one account in one course on one calendar
//! day. [Store] keeps at most one snapshot per account, course, and day: recording again on the
//! same day replaces that day's value. Days are UTC calendar days of the time reported by the
//! injected [Clock], so tests can move time freely.
//!
//! # Example
//!
//! ```rust
//! use gradebook_snapshot::{Config, Store, SystemClock};
//! use prometheus_client::registry::Registry;
//!
//! let mut registry = Registry::default();
//! let mut store = Store::init(SystemClock, &mut registry, Config::default()).unwrap();
//! let account = store.add_account("ada@school.example").unwrap();
//!
//! store.make_snapshot(account, "MATH-101", 0.93).unwrap();
//! store.make_snapshot(account, "MATH-101", 0.95).unwrap();
//!
//! // Both snapshots fall on the same day, so only the latest is kept
//! let (values, _) = store.get_snapshots(account, "MATH-101").unwrap();
//! assert_eq!(values, vec![0.95]);
//! ```

use std::time::SystemTime;
use thiserror::Error;

mod metrics;
mod store;
pub use store::{day, AccountId, Config, Store};

/// Errors that can occur when interacting with [Store].
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("duplicate email: {0}")]
    DuplicateEmail(String),
    #[error("invalid email: {0:?}")]
    InvalidEmail(String),
    #[error("too many accounts (max {0})")]
    TooManyAccounts(usize),
    #[error("invalid course id ({0} bytes)")]
    InvalidCourse(usize),
    #[error("invalid value: {0}")]
    InvalidValue(f32),
}

/// A source of the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Returns the current time.
    fn current(&self) -> SystemTime;
}

/// A [Clock] backed by the system's wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current(&self) -> SystemTime {
        SystemTime::now()
    }
}
