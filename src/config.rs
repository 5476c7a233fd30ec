// Copyright (c) 2022. Sebastien Soudan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http:www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::utils::{check_alpha, check_rep};
use crate::Result;

/// Default number of replicates.
pub const DEFAULT_REPLICATES: usize = 1_000;

/// Default significance level (95% intervals).
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Settings shared by the resampling drivers.
///
/// ```rust
/// use resampling::prelude::*;
///
/// let config = Config::default().with_replicates(2_000).with_seed(42);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.replicates(), 2_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    replicates: usize,
    alpha: f64,
    seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            replicates: DEFAULT_REPLICATES,
            alpha: DEFAULT_ALPHA,
            seed: None,
        }
    }
}

impl Config {
    /// Number of bootstrap replicates (B) or permutations (M).
    pub fn with_replicates(mut self, replicates: usize) -> Self {
        self.replicates = replicates;
        self
    }

    /// Significance level of the intervals; `0.05` gives 95% intervals.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Seed for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of replicates.
    pub fn replicates(&self) -> usize {
        self.replicates
    }

    /// Significance level.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Seed, if any.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Checks the replicate count and the significance level.
    pub fn validate(&self) -> Result<()> {
        check_rep(self.replicates)?;
        check_alpha(self.alpha)
    }

    /// Random source for a run: seeded when a seed is set, from OS entropy otherwise.
    pub fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}
