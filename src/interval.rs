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

//! Confidence intervals from a bootstrap distribution.
//!
//! All estimators take the significance level `alpha` (`0.05` for a 95% interval)
//! and read quantiles of the replicate set by linear interpolation between order
//! statistics.
//!
//! Note the percentile interval is not guaranteed to contain the observed statistic.
//!
//! # References
//! - [Bootstrap confidence intervals](https://en.wikipedia.org/wiki/Bootstrapping_(statistics)#Deriving_confidence_intervals_from_the_bootstrap_distribution)
//! - Efron (1987), "Better Bootstrap Confidence Intervals"

use num_traits::Float;
use tracing::{debug, warn};

use crate::utils::{
    cast, check_alpha, normal_cdf, normal_quantile, quantile_sorted, sorted, std_dev,
};
use crate::{Error, Result};

/// How an interval was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    /// `T ± z(1 - α/2) · sd(T*)`
    Normal,
    /// `α/2` and `1 - α/2` quantiles of `T*`
    Percentile,
    /// `2T - q(1 - α/2)`, `2T - q(α/2)`
    Basic,
    /// bias-corrected and accelerated percentiles
    Bca,
    /// bootstrap-t
    Studentized,
}

/// A confidence interval at level `1 - alpha`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfidenceInterval<F> {
    /// lower bound
    pub lower: F,
    /// upper bound
    pub upper: F,
    /// significance level
    pub alpha: F,
    /// method actually used - BCa reports [`Method::Percentile`] when it had to fall
    /// back
    pub method: Method,
}

impl<F: Float> ConfidenceInterval<F> {
    /// Confidence level: `1 - alpha`.
    pub fn level(&self) -> F {
        F::one() - self.alpha
    }

    /// `upper - lower`.
    pub fn width(&self) -> F {
        self.upper - self.lower
    }

    /// True if `x` is within the bounds (inclusive).
    pub fn contains(&self, x: F) -> bool {
        self.lower <= x && x <= self.upper
    }

    /// True if the interval collapsed to a single value.
    pub fn is_point(&self) -> bool {
        self.lower == self.upper
    }
}

fn check_replicates<F: Float>(replicates: &[F]) -> Result<()> {
    if replicates.is_empty() {
        return Err(Error::InvalidInput("replicate set is empty".to_string()));
    }
    if let Some(i) = replicates.iter().position(|v| !v.is_finite()) {
        return Err(Error::InvalidInput(format!("replicate {i} is not finite")));
    }
    Ok(())
}

fn check_finite<F: Float>(x: F, what: &str) -> Result<()> {
    if !x.is_finite() {
        return Err(Error::InvalidInput(format!("{what} is not finite")));
    }
    Ok(())
}

fn to_f64<F: Float>(x: F) -> f64 {
    x.to_f64().unwrap_or(f64::NAN)
}

/// Normal approximation interval: `T ± z(1 - α/2) · sd(T*)`.
///
/// Only sensible when the statistic is close to normally distributed. A constant
/// replicate set gives the point interval `[T, T]`.
pub fn normal<F: Float>(original: F, replicates: &[F], alpha: F) -> Result<ConfidenceInterval<F>> {
    check_alpha(alpha)?;
    check_replicates(replicates)?;
    check_finite(original, "observed statistic")?;

    let z: F = cast(normal_quantile(1.0 - to_f64(alpha) / 2.0));
    let half_width = z * std_dev(replicates);

    Ok(ConfidenceInterval {
        lower: original - half_width,
        upper: original + half_width,
        alpha,
        method: Method::Normal,
    })
}

fn percentile_sorted<F: Float>(sorted: &[F], alpha: F) -> ConfidenceInterval<F> {
    let two: F = cast(2);
    ConfidenceInterval {
        lower: quantile_sorted(sorted, alpha / two),
        upper: quantile_sorted(sorted, F::one() - alpha / two),
        alpha,
        method: Method::Percentile,
    }
}

/// Percentile interval: the `α/2` and `1 - α/2` quantiles of the replicates.
///
/// Bounds are always ordered. The interval need not contain the observed statistic,
/// but it always contains the median of the replicates.
pub fn percentile<F: Float>(replicates: &[F], alpha: F) -> Result<ConfidenceInterval<F>> {
    check_alpha(alpha)?;
    check_replicates(replicates)?;

    Ok(percentile_sorted(&sorted(replicates), alpha))
}

/// Basic (pivotal) interval: `[2T - q(1 - α/2), 2T - q(α/2)]`.
pub fn basic<F: Float>(original: F, replicates: &[F], alpha: F) -> Result<ConfidenceInterval<F>> {
    let p = percentile(replicates, alpha)?;
    check_finite(original, "observed statistic")?;
    let two: F = cast(2);

    Ok(ConfidenceInterval {
        lower: two * original - p.upper,
        upper: two * original - p.lower,
        alpha,
        method: Method::Basic,
    })
}

/// Acceleration from the leave-one-out values of the statistic:
/// `Σ(m - θᵢ)³ / (6 (Σ(m - θᵢ)²)^(3/2))`.
///
/// Zero when the jackknife values have no spread (or there are fewer than two).
pub fn acceleration<F: Float>(jackknife: &[F]) -> f64 {
    if jackknife.len() < 2 {
        return 0.0;
    }
    let values: Vec<f64> = jackknife.iter().map(|&v| to_f64(v)).collect();
    let m = values.iter().sum::<f64>() / values.len() as f64;

    let (sum2, sum3) = values.iter().fold((0.0, 0.0), |(s2, s3), &v| {
        let d = m - v;
        (s2 + d * d, s3 + d * d * d)
    });

    if !(sum2.is_finite() && sum2 > 0.0) {
        debug!("jackknife values have no spread, acceleration set to 0");
        return 0.0;
    }
    sum3 / (6.0 * sum2.powf(1.5))
}

/// Bias-corrected and accelerated (BCa) interval.
///
/// The `α/2` and `1 - α/2` levels are moved by the bias correction
/// `z0 = Φ⁻¹(#{T* < T} / B)` and the [`acceleration`] computed from the
/// `jackknife` values, then read off the replicates.
///
/// Falls back to the percentile interval (reported as [`Method::Percentile`]) when
/// the replicates are constant or all on one side of `T`, since `z0` is then
/// infinite. Meant for large replicate sets (B ≥ 1000).
pub fn bca<F: Float>(
    original: F,
    replicates: &[F],
    jackknife: &[F],
    alpha: F,
) -> Result<ConfidenceInterval<F>> {
    check_alpha(alpha)?;
    check_replicates(replicates)?;
    check_finite(original, "observed statistic")?;
    if let Some(i) = jackknife.iter().position(|v| !v.is_finite()) {
        return Err(Error::InvalidInput(format!("jackknife value {i} is not finite")));
    }

    let sorted = sorted(replicates);
    let b = sorted.len();

    if sorted[0] == sorted[b - 1] {
        warn!("BCa: constant replicate set, falling back to percentile interval");
        return Ok(percentile_sorted(&sorted, alpha));
    }

    let below = sorted.iter().filter(|&&t| t < original).count();
    if below == 0 || below == b {
        warn!(
            "BCa: {} of {} replicates below the observed value, \
             falling back to percentile interval",
            below, b
        );
        return Ok(percentile_sorted(&sorted, alpha));
    }

    let z0 = normal_quantile(below as f64 / b as f64);
    let a = acceleration(jackknife);
    debug!("BCa parameters: z0={:.4}, a={:.4}", z0, a);

    let adjust = |level: f64| {
        let z = normal_quantile(level);
        let denom = 1.0 - a * (z0 + z);
        if denom > 0.0 {
            normal_cdf(z0 + (z0 + z) / denom)
        } else if z0 + z > 0.0 {
            1.0
        } else {
            0.0
        }
    };

    let half = to_f64(alpha) / 2.0;
    let lower_level = adjust(half);
    let upper_level = adjust(1.0 - half);
    debug!("BCa adjusted levels: {:.4}, {:.4}", lower_level, upper_level);

    let lower = quantile_sorted(&sorted, cast(lower_level));
    let upper = quantile_sorted(&sorted, cast(upper_level));

    Ok(ConfidenceInterval {
        lower: lower.min(upper),
        upper: lower.max(upper),
        alpha,
        method: Method::Bca,
    })
}

/// Studentized (bootstrap-t) interval.
///
/// `replicates` holds, for each resample, the statistic and its standard error
/// estimated on that resample; `original_se` is the standard error on the observed
/// data. With `t* = (T* - T) / se*` the interval is
/// `[T - q_t(1 - α/2) · se, T - q_t(α/2) · se]`.
///
/// A non-positive standard error is an [`Error::DegenerateDistribution`].
pub fn studentized<F: Float>(
    original: F,
    original_se: F,
    replicates: &[(F, F)],
    alpha: F,
) -> Result<ConfidenceInterval<F>> {
    check_alpha(alpha)?;
    if replicates.is_empty() {
        return Err(Error::InvalidInput("replicate set is empty".to_string()));
    }
    check_finite(original, "observed statistic")?;
    check_finite(original_se, "standard error on the observed data")?;

    if !(original_se > F::zero()) {
        return Err(Error::DegenerateDistribution(
            "standard error on the observed data is not positive".to_string(),
        ));
    }

    let mut t = Vec::with_capacity(replicates.len());
    for (i, &(estimate, se)) in replicates.iter().enumerate() {
        if !(estimate.is_finite() && se.is_finite()) {
            return Err(Error::InvalidInput(format!("replicate {i} is not finite")));
        }
        if !(se > F::zero()) {
            return Err(Error::DegenerateDistribution(format!(
                "replicate {i} has a non-positive standard error"
            )));
        }
        t.push((estimate - original) / se);
    }

    let t = sorted(&t);
    let two: F = cast(2);
    let t_low = quantile_sorted(&t, alpha / two);
    let t_high = quantile_sorted(&t, F::one() - alpha / two);

    Ok(ConfidenceInterval {
        lower: original - t_high * original_se,
        upper: original - t_low * original_se,
        alpha,
        method: Method::Studentized,
    })
}
