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

//! Bootstrap confidence intervals and permutation tests
//!
//! When we have no idea what the sampling distribution of a statistic is, we can
//! still approximate it, provided we are willing to make the hypothesis that the
//! sample we have is representative of the population.
//!
//! The bootstrap draws many samples of the same size from the observed sample,
//! with replacement, and computes the statistic on each of them. The spread of these
//! replicates gives confidence intervals for the statistic: see [`interval`] for the
//! normal, percentile, basic, BCa and studentized variants.
//!
//! The permutation test answers a different question: could two groups come from
//! the same population? Under that null hypothesis the group labels are
//! exchangeable, so we shuffle the pooled observations, split them back into groups
//! of the original sizes and recompute the test statistic. The p-value is the
//! fraction of relabellings at least as 'extreme' as the observed statistic.
//!
//! # References
//! - [Bootstrapping](https://en.wikipedia.org/wiki/Bootstrapping_(statistics))
//! - [Permutation test](https://en.wikipedia.org/wiki/Permutation_test)
//! - [P-value](https://en.wikipedia.org/wiki/P-value)
//!
//! # Example
//!
//! ```rust
//! use rand::prelude::Distribution;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use rand_distr::StandardNormal;
//! use resampling::prelude::*;
//!
//! let mut rng = &mut ChaCha8Rng::seed_from_u64(42);
//!
//! let a = StandardNormal
//!     .sample_iter(&mut rng)
//!     .take(50)
//!     .collect::<Vec<f64>>();
//! let b = StandardNormal
//!     .sample_iter(&mut rng)
//!     .take(50)
//!     .map(|x: f64| x + 0.1)
//!     .collect::<Vec<f64>>();
//!
//! let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
//!
//! // 95% confidence interval of the mean of `a`
//! let replicates = bootstrap::bootstrap(&mut rng, &a, mean, 2_000).unwrap();
//! let jackknife = bootstrap::jackknife(&a, mean).unwrap();
//! let ci = replicates.bca_interval(&jackknife, 0.05).unwrap();
//! assert!(ci.contains(replicates.original()));
//!
//! // difference of the means
//! let test_statistic_fn = |a: &[f64], b: &[f64]| mean(a) - mean(b);
//!
//! let test = permutation::permutation_test(
//!     &mut rng,
//!     &a,
//!     &b,
//!     test_statistic_fn,
//!     permutation::Alternative::TwoSided,
//!     10_000,
//! )
//! .unwrap();
//! assert_eq!(test.null_distribution.len(), 10_000);
//! ```

pub use crate::config::Config;
pub use crate::interval::{ConfidenceInterval, Method};
pub use crate::{Error, NonFiniteStatistic};

/// bootstrap replicates
pub mod bootstrap {
    #[cfg(feature = "parallel")]
    pub use crate::bootstrap::{par_bootstrap, try_par_bootstrap};
    pub use crate::bootstrap::{
        analyze, bootstrap, bootstrap_multi, jackknife, resample_indices, try_bootstrap,
        try_bootstrap_multi, try_jackknife, Replicates, Summary,
    };
}

/// confidence intervals
pub mod interval {
    pub use crate::interval::{
        acceleration, basic, bca, normal, percentile, studentized, ConfidenceInterval, Method,
    };
}

/// permutation test
pub mod permutation {
    pub use crate::permutation::{
        permutation_test, try_permutation_test, Alternative, PValue, PermutationTest,
    };
}
