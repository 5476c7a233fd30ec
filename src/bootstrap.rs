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

use std::convert::Infallible;

use num_traits::Float;
use rand::Rng;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::interval::{self, ConfidenceInterval};
use crate::utils::{cast, check_rep, checked_components, checked_statistic, mean, std_dev};
use crate::{Error, Result};

// FUTURE(ssoudan) parametric bootstrap

/// Bootstrap distribution of a statistic: the value on the observed data and one
/// value per resample.
///
/// The order of `values` is the order the resamples were drawn in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Replicates<F> {
    original: F,
    values: Vec<F>,
}

impl<F: Float> Replicates<F> {
    /// Wraps a statistic value and its replicates. Fails if `values` is empty.
    pub fn new(original: F, values: Vec<F>) -> Result<Self> {
        check_rep(values.len())?;
        Ok(Self { original, values })
    }

    /// Statistic on the observed data (T).
    pub fn original(&self) -> F {
        self.original
    }

    /// Statistic on each resample (T*).
    pub fn values(&self) -> &[F] {
        &self.values
    }

    /// Gives back the replicate values.
    pub fn into_values(self) -> Vec<F> {
        self.values
    }

    /// Number of replicates (B).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: a replicate set holds at least one value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean of the replicates.
    pub fn mean(&self) -> F {
        mean(&self.values)
    }

    /// Bootstrap estimate of the bias: `mean(T*) - T`.
    pub fn bias(&self) -> F {
        self.mean() - self.original
    }

    /// Bootstrap estimate of the standard error: standard deviation of the replicates.
    pub fn std_error(&self) -> F {
        std_dev(&self.values)
    }

    /// True when every replicate has the same value.
    pub fn is_degenerate(&self) -> bool {
        match self.values.split_first() {
            Some((first, rest)) => rest.iter().all(|v| v == first),
            None => true,
        }
    }

    /// See [`interval::normal`].
    pub fn normal_interval(&self, alpha: F) -> Result<ConfidenceInterval<F>> {
        interval::normal(self.original, &self.values, alpha)
    }

    /// See [`interval::percentile`].
    pub fn percentile_interval(&self, alpha: F) -> Result<ConfidenceInterval<F>> {
        interval::percentile(&self.values, alpha)
    }

    /// See [`interval::basic`].
    pub fn basic_interval(&self, alpha: F) -> Result<ConfidenceInterval<F>> {
        interval::basic(self.original, &self.values, alpha)
    }

    /// See [`interval::bca`]. `jackknife` holds the leave-one-out values of the
    /// statistic (see [`jackknife`]).
    pub fn bca_interval(&self, jackknife: &[F], alpha: F) -> Result<ConfidenceInterval<F>> {
        interval::bca(self.original, &self.values, jackknife, alpha)
    }
}

/// Draws `n` indices uniformly from `0..n` with replacement.
pub fn resample_indices<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<usize> {
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

/// Overwrites `resample` with draws with replacement from `sample`.
fn fill_resample<R: Rng + ?Sized, S: Clone>(rng: &mut R, sample: &[S], resample: &mut [S]) {
    let n = sample.len();
    for slot in resample.iter_mut() {
        *slot = sample[rng.gen_range(0..n)].clone();
    }
}

fn check_sample<S>(sample: &[S]) -> Result<()> {
    if sample.is_empty() {
        return Err(Error::InvalidInput("sample is empty".to_string()));
    }
    Ok(())
}

/// Non-parametric bootstrap of `statistic` over `sample`.
///
/// # Description
///
/// Each of the `rep` replicates is obtained by drawing `sample.len()` observations
/// with replacement from `sample` and evaluating `statistic` on the result. The
/// sample is never modified.
///
/// With a seeded `rng` the replicate set is reproducible.
///
/// # Example
///
/// ```rust
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use resampling::prelude::*;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(42);
/// let sample = [2.0, 4.0, 4.0, 5.0, 7.0, 9.0, 11.0];
///
/// let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
///
/// let replicates = bootstrap::bootstrap(&mut rng, &sample, mean, 1_000).unwrap();
/// assert_eq!(replicates.len(), 1_000);
///
/// let ci = replicates.percentile_interval(0.05).unwrap();
/// assert!(ci.lower < ci.upper);
/// ```
pub fn bootstrap<R, S, F>(
    rng: &mut R,
    sample: &[S],
    statistic: impl Fn(&[S]) -> F,
    rep: usize,
) -> Result<Replicates<F>>
where
    R: Rng + ?Sized,
    S: Clone,
    F: Float,
{
    try_bootstrap(rng, sample, |s| Ok::<F, Infallible>(statistic(s)), rep)
}

/// Same as [`bootstrap`] for a statistic that can fail, such as a regression on a
/// singular resample.
///
/// The first failure stops the run: it is returned as
/// [`Error::StatisticComputation`] with the index of the offending replicate.
/// Failed replicates are never skipped. A NaN or infinite value counts as a
/// failure (see [`crate::NonFiniteStatistic`]), in [`bootstrap`] too.
#[instrument(skip_all, fields(n = sample.len(), rep = rep))]
pub fn try_bootstrap<R, S, F, E>(
    rng: &mut R,
    sample: &[S],
    statistic: impl Fn(&[S]) -> std::result::Result<F, E>,
    rep: usize,
) -> Result<Replicates<F>>
where
    R: Rng + ?Sized,
    S: Clone,
    F: Float,
    E: std::error::Error + Send + Sync + 'static,
{
    check_sample(sample)?;
    check_rep(rep)?;

    let original = checked_statistic(None, statistic(sample))?;

    let mut values = Vec::with_capacity(rep);
    let mut resample = sample.to_vec();

    for i in 0..rep {
        fill_resample(rng, sample, &mut resample);
        values.push(checked_statistic(Some(i), statistic(&resample))?);
    }

    debug!("bootstrap: {} replicates computed", values.len());

    Ok(Replicates { original, values })
}

/// Bootstrap of a statistic returning a fixed-length vector of values, e.g. the
/// coefficients of a regression.
///
/// Returns one [`Replicates`] per component. A replicate whose length differs from
/// the length on the observed data is an [`Error::InvalidInput`].
pub fn bootstrap_multi<R, S, F>(
    rng: &mut R,
    sample: &[S],
    statistic: impl Fn(&[S]) -> Vec<F>,
    rep: usize,
) -> Result<Vec<Replicates<F>>>
where
    R: Rng + ?Sized,
    S: Clone,
    F: Float,
{
    try_bootstrap_multi(rng, sample, |s| Ok::<Vec<F>, Infallible>(statistic(s)), rep)
}

/// Same as [`bootstrap_multi`] for a statistic that can fail. Failures are reported
/// as in [`try_bootstrap`].
#[instrument(skip_all, fields(n = sample.len(), rep = rep))]
pub fn try_bootstrap_multi<R, S, F, E>(
    rng: &mut R,
    sample: &[S],
    statistic: impl Fn(&[S]) -> std::result::Result<Vec<F>, E>,
    rep: usize,
) -> Result<Vec<Replicates<F>>>
where
    R: Rng + ?Sized,
    S: Clone,
    F: Float,
    E: std::error::Error + Send + Sync + 'static,
{
    check_sample(sample)?;
    check_rep(rep)?;

    let original = checked_components(None, statistic(sample))?;
    let k = original.len();
    if k == 0 {
        return Err(Error::InvalidInput(
            "statistic returned no component".to_string(),
        ));
    }

    let mut columns = vec![Vec::with_capacity(rep); k];
    let mut resample = sample.to_vec();

    for i in 0..rep {
        fill_resample(rng, sample, &mut resample);
        let t = checked_components(Some(i), statistic(&resample))?;
        if t.len() != k {
            return Err(Error::InvalidInput(format!(
                "replicate {i} has {} components, expected {k}",
                t.len()
            )));
        }
        for (column, v) in columns.iter_mut().zip(t) {
            column.push(v);
        }
    }

    debug!("bootstrap: {} replicates of {} components", rep, k);

    Ok(original
        .into_iter()
        .zip(columns)
        .map(|(original, values)| Replicates { original, values })
        .collect())
}

/// Same as [`bootstrap`], spread over the rayon thread pool.
///
/// Replicate `i` draws from stream `i` of a ChaCha8 generator seeded with `seed`,
/// so the replicate set only depends on `seed`, not on the number of threads.
/// It is not the replicate set [`bootstrap`] gives for the same seed.
#[cfg(feature = "parallel")]
pub fn par_bootstrap<S, F>(
    seed: u64,
    sample: &[S],
    statistic: impl Fn(&[S]) -> F + Sync,
    rep: usize,
) -> Result<Replicates<F>>
where
    S: Clone + Send + Sync,
    F: Float + Send,
{
    try_par_bootstrap(seed, sample, |s| Ok::<F, Infallible>(statistic(s)), rep)
}

/// Same as [`par_bootstrap`] for a statistic that can fail.
///
/// Every replicate is computed; when several fail, the one with the lowest index is
/// reported, whatever the scheduling.
#[cfg(feature = "parallel")]
#[instrument(skip_all, fields(n = sample.len(), rep = rep))]
pub fn try_par_bootstrap<S, F, E>(
    seed: u64,
    sample: &[S],
    statistic: impl Fn(&[S]) -> std::result::Result<F, E> + Sync,
    rep: usize,
) -> Result<Replicates<F>>
where
    S: Clone + Send + Sync,
    F: Float + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rayon::prelude::*;

    check_sample(sample)?;
    check_rep(rep)?;

    let original = checked_statistic(None, statistic(sample))?;

    let outcomes: Vec<Result<F>> = (0..rep)
        .into_par_iter()
        .map_init(
            || sample.to_vec(),
            |resample, i| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(i as u64);
                fill_resample(&mut rng, sample, resample);
                checked_statistic(Some(i), statistic(resample.as_slice()))
            },
        )
        .collect();
    let values = outcomes.into_iter().collect::<Result<Vec<F>>>()?;

    debug!("bootstrap: {} replicates computed in parallel", values.len());

    Ok(Replicates { original, values })
}

/// Leave-one-out values of `statistic`: entry `i` is the statistic on `sample`
/// without observation `i`.
///
/// Needs at least two observations.
pub fn jackknife<S, F>(sample: &[S], statistic: impl Fn(&[S]) -> F) -> Result<Vec<F>>
where
    S: Clone,
    F: Float,
{
    try_jackknife(sample, |s| Ok::<F, Infallible>(statistic(s)))
}

/// Same as [`jackknife`] for a statistic that can fail. The replicate index of an
/// [`Error::StatisticComputation`] is the index of the left-out observation.
pub fn try_jackknife<S, F, E>(
    sample: &[S],
    statistic: impl Fn(&[S]) -> std::result::Result<F, E>,
) -> Result<Vec<F>>
where
    S: Clone,
    F: Float,
    E: std::error::Error + Send + Sync + 'static,
{
    let n = sample.len();
    if n < 2 {
        return Err(Error::InvalidInput(format!(
            "jackknife needs at least 2 observations, got {n}"
        )));
    }

    let mut without = Vec::with_capacity(n - 1);
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        without.clear();
        without.extend_from_slice(&sample[..i]);
        without.extend_from_slice(&sample[i + 1..]);
        values.push(checked_statistic(Some(i), statistic(&without))?);
    }
    Ok(values)
}

/// Everything [`analyze`] computes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Summary<F> {
    /// the bootstrap distribution
    pub replicates: Replicates<F>,
    /// normal approximation interval
    pub normal: ConfidenceInterval<F>,
    /// percentile interval
    pub percentile: ConfidenceInterval<F>,
    /// basic (pivotal) interval
    pub basic: ConfidenceInterval<F>,
    /// bias-corrected and accelerated interval
    pub bca: ConfidenceInterval<F>,
}

/// Bootstraps `statistic` with the settings of `config` and derives the normal,
/// percentile, basic and BCa intervals.
///
/// ```rust
/// use resampling::prelude::*;
///
/// let sample = [3.1, 4.7, 2.2, 5.9, 4.4, 3.8, 6.1, 2.9, 4.0, 5.2];
/// let median = |s: &[f64]| {
///     let mut v = s.to_vec();
///     v.sort_by(|a, b| a.partial_cmp(b).unwrap());
///     (v[(v.len() - 1) / 2] + v[v.len() / 2]) / 2.0
/// };
///
/// let config = Config::default().with_replicates(2_000).with_seed(1);
/// let summary = bootstrap::analyze(&config, &sample, median).unwrap();
/// assert_eq!(summary.replicates.len(), 2_000);
/// assert!(summary.percentile.lower <= summary.percentile.upper);
/// ```
#[instrument(skip_all, fields(n = sample.len(), rep = config.replicates()))]
pub fn analyze<S, F>(
    config: &Config,
    sample: &[S],
    statistic: impl Fn(&[S]) -> F,
) -> Result<Summary<F>>
where
    S: Clone,
    F: Float,
{
    config.validate()?;
    let alpha: F = cast(config.alpha());
    let mut rng = config.rng();

    let replicates = bootstrap(&mut rng, sample, &statistic, config.replicates())?;
    // a single observation has no leave-one-out values; BCa then runs without
    // acceleration
    let jackknife_values = if sample.len() > 1 {
        jackknife(sample, &statistic)?
    } else {
        Vec::new()
    };

    Ok(Summary {
        normal: replicates.normal_interval(alpha)?,
        percentile: replicates.percentile_interval(alpha)?,
        basic: replicates.basic_interval(alpha)?,
        bca: replicates.bca_interval(&jackknife_values, alpha)?,
        replicates,
    })
}
