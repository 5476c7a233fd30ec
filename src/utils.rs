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

use std::sync::Arc;

use num_traits::{Float, ToPrimitive};
use statrs::function::erf::{erfc, erfc_inv};

use crate::{Error, NonFiniteStatistic, Result};

/// Converts a primitive to `F`. NaN if `F` can't hold it.
pub(crate) fn cast<F: Float, T: ToPrimitive>(x: T) -> F {
    F::from(x).unwrap_or_else(F::nan)
}

/// Arithmetic mean. NaN on an empty slice.
pub(crate) fn mean<F: Float>(values: &[F]) -> F {
    let sum = values.iter().fold(F::zero(), |acc, &v| acc + v);
    sum / cast::<F, _>(values.len())
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two values.
pub(crate) fn std_dev<F: Float>(values: &[F]) -> F {
    if values.len() < 2 {
        return F::zero();
    }
    let m = mean(values);
    let ss = values
        .iter()
        .fold(F::zero(), |acc, &v| acc + (v - m) * (v - m));
    (ss / cast::<F, _>(values.len() - 1)).sqrt()
}

/// Sorted copy of `values`. NaNs go last.
pub(crate) fn sorted<F: Float>(values: &[F]) -> Vec<F> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan())));
    v
}

/// Quantile of sorted data, linear interpolation between order statistics.
///
/// `q` is clamped to `[0, 1]`: `q = 0` is the min, `q = 1` the max.
pub(crate) fn quantile_sorted<F: Float>(sorted: &[F], q: F) -> F {
    match sorted.len() {
        0 => F::nan(),
        1 => sorted[0],
        n => {
            let q = q.max(F::zero()).min(F::one());
            let pos = q * cast::<F, _>(n - 1);
            let i = pos.floor().to_usize().unwrap_or(0).min(n - 1);
            let j = pos.ceil().to_usize().unwrap_or(0).min(n - 1);
            if i == j {
                return sorted[i];
            }
            let t = pos - cast::<F, _>(i);
            sorted[i] + t * (sorted[j] - sorted[i])
        }
    }
}

/// Standard normal cdf.
pub(crate) fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Standard normal quantile. Infinite at 0 and 1.
pub(crate) fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

/// Checks that the significance level is in `(0, 1)`.
pub(crate) fn check_alpha<F: Float>(alpha: F) -> Result<()> {
    if alpha > F::zero() && alpha < F::one() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "significance level must be in (0, 1), got {}",
            alpha.to_f64().unwrap_or(f64::NAN)
        )))
    }
}

pub(crate) fn statistic_failure<E>(replicate: Option<usize>, source: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::StatisticComputation {
        replicate,
        source: Arc::new(source),
    }
}

/// Value of a statistic evaluated on the observed data (`replicate` is `None`) or on
/// a replicate. Failures and non-finite values become
/// [`Error::StatisticComputation`].
pub(crate) fn checked_statistic<F, E>(
    replicate: Option<usize>,
    outcome: std::result::Result<F, E>,
) -> Result<F>
where
    F: Float,
    E: std::error::Error + Send + Sync + 'static,
{
    let t = outcome.map_err(|e| statistic_failure(replicate, e))?;
    if !t.is_finite() {
        return Err(statistic_failure(
            replicate,
            NonFiniteStatistic(t.to_f64().unwrap_or(f64::NAN)),
        ));
    }
    Ok(t)
}

/// Same as [`checked_statistic`] for a vector-valued statistic.
pub(crate) fn checked_components<F, E>(
    replicate: Option<usize>,
    outcome: std::result::Result<Vec<F>, E>,
) -> Result<Vec<F>>
where
    F: Float,
    E: std::error::Error + Send + Sync + 'static,
{
    let t = outcome.map_err(|e| statistic_failure(replicate, e))?;
    if let Some(&v) = t.iter().find(|v| !v.is_finite()) {
        return Err(statistic_failure(
            replicate,
            NonFiniteStatistic(v.to_f64().unwrap_or(f64::NAN)),
        ));
    }
    Ok(t)
}

/// Checks that at least one replicate is requested.
pub(crate) fn check_rep(rep: usize) -> Result<()> {
    if rep == 0 {
        return Err(Error::InvalidInput(
            "at least one replicate is required".to_string(),
        ));
    }
    Ok(())
}
