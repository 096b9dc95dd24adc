//! Sample indices from a discrete distribution described by integer weights.

use crate::Error;
use rand::{distributions::Distribution, Rng};

/// A discrete distribution over `0..weights.len()` where index `i` is selected with probability
/// `weights[i] / sum(weights)`.
///
/// Sampling draws a uniform value in `[0, sum(weights))` and returns the smallest index whose
/// cumulative weight exceeds it, so the same random stream always yields the same indices.
#[derive(Clone, Debug)]
pub struct WeightedChoice {
    cumulative: Vec<u64>,
}

impl WeightedChoice {
    /// Build a distribution from `weights`.
    ///
    /// An empty list or any zero weight is a programming error and is rejected.
    pub fn new(weights: &[u32]) -> Result<Self, Error> {
        if weights.is_empty() {
            return Err(Error::EmptyWeights);
        }
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0u64;
        for (index, &weight) in weights.iter().enumerate() {
            if weight == 0 {
                return Err(Error::ZeroWeight(index));
            }
            total += weight as u64;
            cumulative.push(total);
        }
        Ok(Self { cumulative })
    }

    /// Number of indices that can be returned.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.cumulative.len()
    }

    /// Sum of all weights.
    pub fn total(&self) -> u64 {
        // Non-empty by construction
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Select an index.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let draw = rng.gen_range(0..self.total());
        self.cumulative.partition_point(|&bound| bound <= draw)
    }
}

impl Distribution<usize> for WeightedChoice {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        WeightedChoice::sample(self, rng)
    }
}
