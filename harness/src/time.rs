//! A controllable clock for exercising time-dependent logic reproducibly.

use crate::choice::WeightedChoice;
use rand::Rng;
use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Relative likelihood of moving by seconds, minutes, hours, or days.
const MAGNITUDE_WEIGHTS: [u32; 4] = [8, 4, 2, 1];

/// For each magnitude, the length of one unit (in seconds) and the maximum number of units.
const MAGNITUDE_UNITS: [(u64, u64); 4] = [(1, 59), (60, 59), (60 * 60, 23), (24 * 60 * 60, 7)];

/// A clock that only moves when told to.
///
/// Clones share the same current time, so a handle given to the system under test observes
/// every [TimeShim::advance] and [TimeShim::retreat] made through another handle.
#[derive(Clone, Debug)]
pub struct TimeShim {
    now: Arc<Mutex<SystemTime>>,
    magnitude: WeightedChoice,
}

impl TimeShim {
    /// Create a clock that reads `start` until moved.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
            magnitude: WeightedChoice::new(&MAGNITUDE_WEIGHTS).expect("weights are non-zero"),
        }
    }

    /// Returns the current time.
    pub fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }

    /// Move the clock to `time`.
    pub fn set(&self, time: SystemTime) {
        *self.now.lock().unwrap() = time;
    }

    /// Move the clock forward by a random delta, returning the delta.
    pub fn advance<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let delta = self.delta(rng);
        let mut now = self.now.lock().unwrap();
        *now = now.checked_add(delta).unwrap_or(*now);
        delta
    }

    /// Move the clock backward by a random delta, returning the delta.
    ///
    /// The clock never moves before [UNIX_EPOCH].
    pub fn retreat<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let delta = self.delta(rng);
        let mut now = self.now.lock().unwrap();
        *now = now.checked_sub(delta).unwrap_or(UNIX_EPOCH).max(UNIX_EPOCH);
        delta
    }

    fn delta<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (unit, max) = MAGNITUDE_UNITS[self.magnitude.sample(rng)];
        Duration::from_secs(unit * rng.gen_range(1..=max))
    }
}
