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
//! Check the [`prelude`] module for the public API.
use std::sync::Arc;

use thiserror::Error;

/// The prelude module re-exports the most commonly used types and traits.
/// This is the public API. Enjoy!
pub mod prelude;

/// bootstrap replicate generation
pub mod bootstrap;

/// resampling configuration
pub mod config;

/// confidence interval estimators
pub mod interval;

/// permutation test driver
pub mod permutation;

pub(crate) mod utils;

/// The error type for this crate.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The inputs can't be resampled: empty sample, zero replicates, level out of
    /// range...
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The statistic failed on the observed data (`replicate` is `None`) or on the
    /// given replicate.
    #[error("statistic could not be computed on {}: {source}", replicate_label(.replicate))]
    StatisticComputation {
        /// index of the offending replicate
        replicate: Option<usize>,
        /// error raised by the statistic
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
    /// The replicate set has no spread where the estimator needs some.
    #[error("degenerate distribution: {0}")]
    DegenerateDistribution(String),
}

/// Source of an [`Error::StatisticComputation`] raised when the statistic returned
/// NaN or an infinity, e.g. a correlation on a resample where one variable is
/// constant.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("statistic is not finite: {0}")]
pub struct NonFiniteStatistic(pub f64);

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

fn replicate_label(replicate: &Option<usize>) -> String {
    match replicate {
        Some(i) => format!("replicate {i}"),
        None => "the observed data".to_string(),
    }
}
