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
use std::fmt;

use num_traits::Float;
use rand::prelude::SliceRandom;
use rand::Rng;
use tracing::{debug, instrument};

use crate::utils::{cast, check_rep, checked_statistic};
use crate::{Error, Result};

/// Part of the null distribution counted as 'more extreme' than the observed
/// statistic.
/// https://en.wikipedia.org/wiki/P-value#Probability_of_obtaining_a_real-valued_test_statistic_at_least_as_extreme_as_the_one_actually_obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Alternative {
    /// Two-sided test, counted directly
    /// Pr(|T| >= |t| | H0)
    TwoSided,
    /// One-sided test (right tail)
    /// Pr(T >= t | H0)
    Greater,
    /// One-sided test (left tail)
    /// Pr(T <= t | H0)
    Less,
    /// Two-sided test from the one-sided tails
    /// min(1, 2 * min(Pr(T >= t | H0), Pr(T <= t | H0)))
    ///
    /// Only valid when the null distribution is symmetric; prefer
    /// [`Alternative::TwoSided`] otherwise.
    TwoSidedSymmetric,
}

/// p-value estimated from `M` permutations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PValue<F> {
    /// `count / M`
    Estimate(F),
    /// No permutation was as extreme as the observed statistic: the p-value is below
    /// the resolution `1 / M` of the test (`2 / M` for
    /// [`Alternative::TwoSidedSymmetric`]).
    LessThan(F),
}

impl<F: Float> PValue<F> {
    /// The estimate, or the bound for [`PValue::LessThan`].
    pub fn value(&self) -> F {
        match *self {
            PValue::Estimate(p) | PValue::LessThan(p) => p,
        }
    }

    /// True if the null hypothesis is rejected at level `alpha`.
    pub fn is_significant(&self, alpha: F) -> bool {
        self.value() <= alpha
    }
}

impl<F: Float + fmt::Display> fmt::Display for PValue<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PValue::Estimate(p) => write!(f, "p = {p}"),
            PValue::LessThan(p) => write!(f, "p < {p}"),
        }
    }
}

/// Outcome of [`permutation_test`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PermutationTest<F> {
    /// statistic on the original groups
    pub observed: F,
    /// statistic on each relabelling, in the order they were drawn
    pub null_distribution: Vec<F>,
    /// number of relabellings at least as extreme as `observed`
    ///
    /// For [`Alternative::TwoSidedSymmetric`] this is the count of the smaller tail,
    /// so the p-value is twice `extreme_count / M`.
    pub extreme_count: usize,
    /// `extreme_count / M`, doubled and capped at 1 for
    /// [`Alternative::TwoSidedSymmetric`]
    pub p_value: PValue<F>,
}

/// Two-sample permutation test of `test_statistic_fn` on groups `a` and `b`.
///
/// # Description
///
/// The null hypothesis is that the group labels are exchangeable, i.e. that both
/// samples are drawn from the same distribution.
///
/// The two groups are pooled and, `rep` times, the pooled observations are shuffled
/// (without replacement) and split back into groups of sizes `a.len()` and
/// `b.len()`; the test statistic is recomputed on each relabelling. The p-value is
/// the fraction of relabellings at least as extreme as the observed statistic
/// (extreme being defined by `alternative` - see [`Alternative`]).
///
/// When none is, the test can't resolve probabilities finer than `1 / rep` and
/// [`PValue::LessThan`] is returned.
///
/// Relabellings equivalent to the observed one rarely give the exact same
/// floating-point statistic, so values within a relative tolerance of
/// `100 · ε · max(|t|, 1)` of the observed statistic `t` count as extreme.
///
/// A NaN or infinite statistic is an [`Error::StatisticComputation`]: `None` for the
/// observed groups, the relabelling index otherwise.
///
/// # Example
///
/// Let's use the difference of the means as the test statistic.
///
/// ```rust
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use resampling::prelude::*;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(42);
///
/// let a = [4.1, 5.3, 4.8, 6.0, 5.5, 4.9, 5.1, 5.8];
/// let b = [6.2, 7.1, 6.8, 5.9, 7.4, 6.6, 7.0, 6.3];
///
/// let diff_means = |a: &[f64], b: &[f64]| {
///     a.iter().sum::<f64>() / a.len() as f64 - b.iter().sum::<f64>() / b.len() as f64
/// };
///
/// let test = permutation::permutation_test(
///     &mut rng,
///     &a,
///     &b,
///     diff_means,
///     permutation::Alternative::TwoSided,
///     10_000,
/// )
/// .unwrap();
/// assert!(test.p_value.is_significant(0.01));
/// ```
pub fn permutation_test<R: Rng + ?Sized, F: Float, S: Clone>(
    rng: &mut R,
    a: &[S],
    b: &[S],
    test_statistic_fn: impl Fn(&[S], &[S]) -> F,
    alternative: Alternative,
    rep: usize,
) -> Result<PermutationTest<F>> {
    try_permutation_test(
        rng,
        a,
        b,
        |a, b| Ok::<F, Infallible>(test_statistic_fn(a, b)),
        alternative,
        rep,
    )
}

/// Same as [`permutation_test`] for a test statistic that can fail.
///
/// The first failure stops the run and is returned as
/// [`Error::StatisticComputation`] with the index of the relabelling (`None` for the
/// observed groups).
#[instrument(skip_all, fields(n_a = a.len(), n_b = b.len(), rep = rep))]
pub fn try_permutation_test<R, F, S, E>(
    rng: &mut R,
    a: &[S],
    b: &[S],
    test_statistic_fn: impl Fn(&[S], &[S]) -> std::result::Result<F, E>,
    alternative: Alternative,
    rep: usize,
) -> Result<PermutationTest<F>>
where
    R: Rng + ?Sized,
    F: Float,
    S: Clone,
    E: std::error::Error + Send + Sync + 'static,
{
    let n_a = a.len();
    if n_a == 0 {
        return Err(Error::InvalidInput("group a is empty".to_string()));
    }
    if b.is_empty() {
        return Err(Error::InvalidInput("group b is empty".to_string()));
    }
    check_rep(rep)?;

    // the test statistic for the observed data
    let t_stat = checked_statistic(None, test_statistic_fn(a, b))?;

    let mut pooled = [a, b].concat();

    // the test statistic distribution under the null hypothesis
    let mut null_distribution: Vec<F> = Vec::with_capacity(rep);
    for i in 0..rep {
        pooled.shuffle(rng);
        let (a_, b_) = pooled.split_at(n_a);
        null_distribution.push(checked_statistic(Some(i), test_statistic_fn(a_, b_))?);
    }

    let tol = tolerance(t_stat);
    let count = |pred: &dyn Fn(F) -> bool| {
        null_distribution.iter().filter(|&&t| pred(t)).count()
    };

    let extreme_count = match alternative {
        Alternative::TwoSided => count(&|t: F| t.abs() >= t_stat.abs() - tol),
        Alternative::Greater => count(&|t: F| t >= t_stat - tol),
        Alternative::Less => count(&|t: F| t <= t_stat + tol),
        Alternative::TwoSidedSymmetric => {
            let right = count(&|t: F| t >= t_stat - tol);
            let left = count(&|t: F| t <= t_stat + tol);
            right.min(left)
        }
    };

    let m: F = cast(rep);
    let p_value = match alternative {
        Alternative::TwoSidedSymmetric => {
            let two: F = cast(2);
            if extreme_count == 0 {
                PValue::LessThan((two / m).min(F::one()))
            } else {
                PValue::Estimate((two * cast::<F, _>(extreme_count) / m).min(F::one()))
            }
        }
        _ if extreme_count == 0 => PValue::LessThan(F::one() / m),
        _ => PValue::Estimate(cast::<F, _>(extreme_count) / m),
    };

    debug!(
        "permutation test: {} of {} relabellings as extreme as the observed statistic",
        extreme_count, rep
    );

    Ok(PermutationTest {
        observed: t_stat,
        null_distribution,
        extreme_count,
        p_value,
    })
}

/// Absolute slack around the observed statistic `t` when counting extreme
/// relabellings.
fn tolerance<F: Float>(t: F) -> F {
    let eps = F::epsilon() * cast::<F, _>(100);
    eps * t.abs().max(F::one())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use itertools::Itertools;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, StandardNormal};

    use super::*;

    // difference of the means
    fn diff_means(a: &[f64], b: &[f64]) -> f64 {
        let a_mean = a.iter().sum::<f64>() / a.len() as f64;
        let b_mean = b.iter().sum::<f64>() / b.len() as f64;
        a_mean - b_mean
    }

    #[test]
    fn test_permutation_separated_groups() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![11.0, 12.0, 13.0, 14.0, 15.0];

        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let test = permutation_test(&mut rng, &a, &b, diff_means, Alternative::TwoSided, 10_000)
            .unwrap();

        assert_eq!(test.observed, -10.0);
        assert_eq!(test.null_distribution.len(), 10_000);
        // only the original split and its mirror image reach |10|: 2 of 252 splits
        let p = test.p_value.value();
        assert!(p > 0.002 && p < 0.015, "p = {p}");
        assert!(test.p_value.is_significant(0.05));
    }

    #[test]
    fn test_permutation_same_distribution() {
        let mut rng = &mut ChaCha8Rng::seed_from_u64(42);
        let a = StandardNormal
            .sample_iter(&mut rng)
            .take(100)
            .collect::<Vec<f64>>();
        let b = StandardNormal
            .sample_iter(&mut rng)
            .take(40)
            .collect::<Vec<f64>>();

        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let test =
            permutation_test(&mut rng, &a, &b, diff_means, Alternative::TwoSided, 2_000).unwrap();

        // the observed statistic is on the same scale as the null distribution
        let max = test
            .null_distribution
            .iter()
            .map(|t| t.abs())
            .fold(0.0, f64::max);
        assert!(test.observed.abs() < max);
        assert!(matches!(test.p_value, PValue::Estimate(_)));
    }

    #[test]
    fn test_permutation_preserves_group_sizes_and_values() {
        let a = [1.0, 2.0, 3.0];
        let b = [10.0, 20.0, 30.0, 40.0];
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        // encodes the sizes and the pooled sum
        let shape = |a: &[f64], b: &[f64]| {
            (a.len() * 10 + b.len()) as f64 * 1_000.0 + a.iter().chain(b).sum::<f64>()
        };

        let test = permutation_test(&mut rng, &a, &b, shape, Alternative::Greater, 500).unwrap();
        assert!(test.null_distribution.iter().all(|&t| t == 34_106.0));
        assert_eq!(test.extreme_count, 500);
        assert_eq!(test.p_value, PValue::Estimate(1.0));
    }

    #[test]
    fn test_permutation_reports_resolution_limit() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        // large on the observed groups only, whatever the relabelling
        let calls = Cell::new(0);
        let first_call_only = |_: &[f64], _: &[f64]| {
            let n = calls.get();
            calls.set(n + 1);
            if n == 0 {
                100.0
            } else {
                0.0
            }
        };

        let test =
            permutation_test(&mut rng, &a, &b, first_call_only, Alternative::Greater, 1_000)
                .unwrap();

        assert_eq!(test.observed, 100.0);
        assert_eq!(test.extreme_count, 0);
        assert_eq!(test.p_value, PValue::LessThan(0.001));
        assert_eq!(test.p_value.to_string(), "p < 0.001");
        assert!(test.p_value.is_significant(0.001));
    }

    #[test]
    fn test_two_sided_symmetric_resolution_limit() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let calls = Cell::new(0);
        let first_call_only = |_: &[f64], _: &[f64]| {
            let n = calls.get();
            calls.set(n + 1);
            if n == 0 {
                100.0
            } else {
                0.0
            }
        };

        let test = permutation_test(
            &mut rng,
            &a,
            &b,
            first_call_only,
            Alternative::TwoSidedSymmetric,
            1_000,
        )
        .unwrap();

        // the left tail holds every relabelling, the right tail none
        assert_eq!(test.extreme_count, 0);
        assert_eq!(test.p_value, PValue::LessThan(0.002));
        assert_eq!(test.p_value.to_string(), "p < 0.002");
    }

    #[test]
    fn test_equivalent_relabellings_count_as_extreme() {
        // every value of a is above every value of b: the only relabellings reaching
        // the observed difference put the same four values in a, in any order
        let a = [0.61, 0.37, 0.93, 0.28];
        let b = [0.11, 0.05, 0.19, 0.23];

        let mut original_a = a.to_vec();
        original_a.sort_by(|x, y| x.partial_cmp(y).unwrap());
        let same_split = |a_: &[f64], _: &[f64]| {
            let mut v = a_.to_vec();
            v.sort_by(|x, y| x.partial_cmp(y).unwrap());
            if v == original_a {
                1.0
            } else {
                0.0
            }
        };

        let by_set = permutation_test(
            &mut ChaCha8Rng::seed_from_u64(11),
            &a,
            &b,
            same_split,
            Alternative::Greater,
            2_000,
        )
        .unwrap();
        let by_means = permutation_test(
            &mut ChaCha8Rng::seed_from_u64(11),
            &a,
            &b,
            diff_means,
            Alternative::Greater,
            2_000,
        )
        .unwrap();

        // 1 split in 70
        assert!(by_set.extreme_count > 0);
        assert_eq!(by_means.extreme_count, by_set.extreme_count);
        assert_eq!(by_means.p_value, by_set.p_value);
    }

    #[test]
    fn test_try_permutation_test_reports_failing_relabelling() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0];
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        // the observed groups are call 0, relabelling i is call i + 1
        let calls = Cell::new(0);
        let fails_on_third_call = |a: &[f64], b: &[f64]| {
            let n = calls.get();
            calls.set(n + 1);
            if n == 3 {
                Err(std::fmt::Error)
            } else {
                Ok(diff_means(a, b))
            }
        };

        let outcome = try_permutation_test(
            &mut rng,
            &a,
            &b,
            fails_on_third_call,
            Alternative::TwoSided,
            100,
        );
        assert!(matches!(
            outcome,
            Err(Error::StatisticComputation {
                replicate: Some(2),
                ..
            })
        ));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_permutation_rejects_non_finite_statistic() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let a = [1.0, 0.0];
        let b = [0.0, 3.0];

        let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
        // infinite once both zeros land in b
        let ratio = |a: &[f64], b: &[f64]| mean(a) / mean(b);
        assert!(matches!(
            permutation_test(&mut rng, &a, &b, ratio, Alternative::Greater, 1_000),
            Err(Error::StatisticComputation {
                replicate: Some(_),
                ..
            })
        ));

        let nan = |_: &[f64], _: &[f64]| f64::NAN;
        assert!(matches!(
            permutation_test(&mut rng, &a, &b, nan, Alternative::Greater, 10),
            Err(Error::StatisticComputation { replicate: None, .. })
        ));
    }

    #[test]
    fn test_permutation_constant_statistic() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for alternative in [Alternative::Less, Alternative::Greater, Alternative::TwoSided] {
            let test = permutation_test(
                &mut rng,
                &[1.0, 2.0],
                &[3.0, 4.0],
                |_: &[f64], _: &[f64]| 0.5,
                alternative,
                1_000,
            )
            .unwrap();
            assert_eq!(test.extreme_count, 1_000);
            assert_eq!(test.p_value, PValue::Estimate(1.0));
            assert_eq!(test.p_value.to_string(), "p = 1");
        }
    }

    #[test]
    fn test_two_sided_symmetric_matches_direct_count() {
        let mut rng = &mut ChaCha8Rng::seed_from_u64(42);
        let a = StandardNormal
            .sample_iter(&mut rng)
            .take(30)
            .collect::<Vec<f64>>();
        let b = StandardNormal
            .sample_iter(&mut rng)
            .take(30)
            .map(|x: f64| x + 0.4)
            .collect::<Vec<f64>>();

        let direct = permutation_test(
            &mut ChaCha8Rng::seed_from_u64(1),
            &a,
            &b,
            diff_means,
            Alternative::TwoSided,
            5_000,
        )
        .unwrap();
        let doubled = permutation_test(
            &mut ChaCha8Rng::seed_from_u64(1),
            &a,
            &b,
            diff_means,
            Alternative::TwoSidedSymmetric,
            5_000,
        )
        .unwrap();

        // same relabellings
        assert_eq!(direct.null_distribution, doubled.null_distribution);
        // the null of a difference of means between equal-size groups is symmetric
        let (p, q) = (direct.p_value.value(), doubled.p_value.value());
        assert!((p - q).abs() < 0.03, "{p} vs {q}");
    }

    #[test]
    fn test_two_sided_counts_both_tails_of_skewed_null() {
        let a = [0.0, 0.0, 0.0, 0.0, 10.0];
        let b = [0.0, 0.0, 0.0, 0.0, 0.0];
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        // the max of group a: 10 in half of the relabellings, 0 otherwise
        let max_a = |a: &[f64], _: &[f64]| a.iter().copied().fold(f64::MIN, f64::max);

        let test = permutation_test(&mut rng, &a, &b, max_a, Alternative::TwoSided, 2_000)
            .unwrap();
        assert_eq!(test.observed, 10.0);
        let sorted = test
            .null_distribution
            .iter()
            .sorted_by(|x, y| x.partial_cmp(y).unwrap())
            .dedup()
            .copied()
            .collect::<Vec<f64>>();
        assert_eq!(sorted, vec![0.0, 10.0]);
        let p = test.p_value.value();
        assert!(p > 0.4 && p < 0.6, "p = {p}");
    }

    #[test]
    fn test_permutation_invalid_input() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let empty: Vec<f64> = vec![];
        let one = vec![1.0];

        for (a, b, rep) in [(&empty, &one, 10), (&one, &empty, 10), (&one, &one, 0)] {
            assert!(matches!(
                permutation_test(&mut rng, a, b, diff_means, Alternative::TwoSided, rep),
                Err(Error::InvalidInput(_))
            ));
        }
    }

    proptest! {
        #[test]
        fn prop_p_value_in_range(
            a in prop::collection::vec(-100f64..100.0, 1..15),
            b in prop::collection::vec(-100f64..100.0, 1..15),
            rep in 1usize..300,
            seed in any::<u64>(),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let m = rep as f64;
            for alternative in [
                Alternative::TwoSided,
                Alternative::Greater,
                Alternative::Less,
                Alternative::TwoSidedSymmetric,
            ] {
                let test =
                    permutation_test(&mut rng, &a, &b, diff_means, alternative, rep).unwrap();
                prop_assert_eq!(test.null_distribution.len(), rep);
                match test.p_value {
                    PValue::Estimate(p) => {
                        prop_assert!(test.extreme_count > 0);
                        prop_assert!(p >= 1.0 / m && p <= 1.0);
                    }
                    PValue::LessThan(bound) => {
                        prop_assert_eq!(test.extreme_count, 0);
                        let resolution = match alternative {
                            Alternative::TwoSidedSymmetric => (2.0 / m).min(1.0),
                            _ => 1.0 / m,
                        };
                        prop_assert_eq!(bound, resolution);
                    }
                }
            }
        }
    }
}
