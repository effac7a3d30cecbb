//! Pairwise and warped (DTW) distance computation, plus the LB-Keogh/DTW
//! cascade used as the preferred warped path for Euclidean queries.
//!
//! Distances operate over plain `&[f64]` slices rather than
//! [`TimeSeries`] views directly, since a group centroid is an owned
//! buffer with no backing dataset row to view into; a `TimeSeries`
//! borrows out its own slice via [`TimeSeries::as_slice`] to use the same
//! functions.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::metric::{Euclidean, InverseNorm, Metric};
use crate::timeseries::TimeSeries;

/// Equal-length pairwise distance with early-abandon dropout.
///
/// Normalizes the running accumulator every step via [`Metric::norm`]. Use
/// [`pairwise_distance_inverse`] instead when `M` implements
/// [`InverseNorm`] to avoid the per-step normalization.
pub fn pairwise_distance<M: Metric>(metric: &M, a: &[f64], b: &[f64], dropout: f64) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::invalid_input(format!(
            "pairwise distance requires equal-length sequences, got {} and {}",
            a.len(),
            b.len()
        )));
    }
    let len = a.len();
    let mut acc = metric.init();
    for i in 0..len {
        acc = metric.reduce(acc, a[i], b[i]);
        if metric.norm(acc, len) >= dropout {
            return Ok(f64::INFINITY);
        }
    }
    Ok(metric.norm(acc, len))
}

/// Equal-length pairwise distance for metrics with an invertible `norm`:
/// the dropout is pre-transformed once so the raw accumulator can be
/// compared directly, skipping a `norm` call at every step.
pub fn pairwise_distance_inverse<M>(metric: &M, a: &[f64], b: &[f64], dropout: f64) -> Result<f64>
where
    M: InverseNorm<Acc = f64>,
{
    if a.len() != b.len() {
        return Err(Error::invalid_input(format!(
            "pairwise distance requires equal-length sequences, got {} and {}",
            a.len(),
            b.len()
        )));
    }
    let len = a.len();
    let threshold = metric.inverse_norm(dropout, len);
    let mut acc = metric.init();
    for i in 0..len {
        acc = metric.reduce(acc, a[i], b[i]);
        if acc >= threshold {
            return Ok(f64::INFINITY);
        }
    }
    Ok(metric.norm(acc, len))
}

/// Warped (DTW) distance between sequences of lengths `m`, `n`, constrained
/// to a Sakoe-Chiba-style band of half-width `band`, with row dropout.
pub fn warped_distance<M: Metric>(metric: &M, a: &[f64], b: &[f64], band: usize, dropout: f64) -> f64 {
    let m = a.len();
    let n = b.len();

    if m == 1 && n == 1 {
        let acc = metric.reduce(metric.init(), a[0], b[0]);
        return metric.norm_dtw(acc, 1, 1);
    }

    let mut cost: Vec<Option<M::Acc>> = vec![None; m * n];
    let mut ncost: Vec<f64> = vec![f64::INFINITY; m * n];
    let band_f = band as f64;

    for i in 0..m {
        let mut row_min = f64::INFINITY;
        for j in 0..n {
            let offset = (i as f64 * n as f64 / m as f64 - j as f64).abs();
            if offset > band_f {
                continue;
            }

            let prev_acc = if i == 0 && j == 0 {
                Some(metric.init())
            } else {
                let mut best: Option<(f64, M::Acc)> = None;
                let mut consider = |idx: usize| {
                    if let Some(c) = cost[idx] {
                        let nc = ncost[idx];
                        if best.map_or(true, |(bnc, _)| nc < bnc) {
                            best = Some((nc, c));
                        }
                    }
                };
                if i > 0 && j > 0 {
                    consider((i - 1) * n + (j - 1));
                }
                if j > 0 {
                    consider(i * n + (j - 1));
                }
                if i > 0 {
                    consider((i - 1) * n + j);
                }
                best.map(|(_, c)| c)
            };

            let Some(prev_acc) = prev_acc else {
                continue;
            };

            let acc_val = metric.reduce(prev_acc, a[i], b[j]);
            let ncost_val = metric.norm_dtw(acc_val, m, n);
            cost[i * n + j] = Some(acc_val);
            ncost[i * n + j] = ncost_val;
            if ncost_val < row_min {
                row_min = ncost_val;
            }
        }
        if row_min > dropout {
            return f64::INFINITY;
        }
    }

    ncost[m * n - 1]
}

/// `relu(x) = max(x, 0)`.
#[inline]
fn relu(x: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        0.0
    }
}

/// LB-Keogh lower bound of `b` against `query`'s envelope. Only meaningful
/// for equal-length sequences; callers skip this stage otherwise.
pub fn lb_keogh(query: &TimeSeries, b: &[f64], cfg: &Config) -> f64 {
    debug_assert_eq!(query.len(), b.len());
    let n = query.len();
    let envelope = query.envelope(cfg);
    let mut sum = 0.0;
    for i in 0..n {
        let v = b[i];
        let over = relu(v - envelope.upper[i]);
        let under = relu(envelope.lower[i] - v);
        sum += over * over + under * under;
    }
    sum.sqrt() / n as f64
}

/// Three-stage cascade for Euclidean-type queries: LB-Keogh, then DTW with
/// row dropout. Falls straight through to DTW when `query`/`b` differ in
/// length, since LB-Keogh is only defined for equal-length sequences.
pub fn cascade_distance(query: &TimeSeries, b: &[f64], cfg: &Config, dropout: f64) -> f64 {
    if query.len() == b.len() && lb_keogh(query, b, cfg) >= dropout {
        return f64::INFINITY;
    }
    let band = cfg.warping_band_size(query.len().min(b.len()));
    warped_distance(&Euclidean, query.as_slice(), b, band, dropout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::metric::{Chebyshev, Manhattan};

    #[test]
    fn scenario_one_euclidean_pairwise() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [11.0, 2.0, 3.0, 4.0, 5.0];
        let dist = pairwise_distance(&Euclidean, &a, &b, f64::INFINITY).unwrap();
        assert!((dist - 2.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_two_manhattan_and_chebyshev_pairwise() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [11.0, 2.0, 3.0, 4.0, 5.0];
        let man = pairwise_distance(&Manhattan, &a, &b, f64::INFINITY).unwrap();
        assert!((man - 2.0).abs() < 1e-9);
        let cheb = pairwise_distance(&Chebyshev, &a, &b, f64::INFINITY).unwrap();
        assert!((cheb - 10.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_three_dtw_perfect_alignment() {
        let a = [2.0, 4.0];
        let b = [2.0, 2.0, 2.0, 4.0, 4.0];
        // Asymmetric lengths (m=2, n=5) need an unconstrained band for the
        // terminal cell to stay admissible, so this test constructs one
        // explicitly instead of relying on Config::default()'s ratio.
        let band = usize::MAX / 4;
        assert!((warped_distance(&Euclidean, &a, &b, band, f64::INFINITY)).abs() < 1e-9);
        assert!((warped_distance(&Manhattan, &a, &b, band, f64::INFINITY)).abs() < 1e-9);
        assert!((warped_distance(&Chebyshev, &a, &b, band, f64::INFINITY)).abs() < 1e-9);
    }

    #[test]
    fn scenario_four_dtw_equal_length() {
        let a = [1.0, 2.0, 2.0, 4.0];
        let b = [1.0, 2.0, 4.0, 5.0];
        let band = 4;
        let eucl = warped_distance(&Euclidean, &a, &b, band, f64::INFINITY);
        assert!((eucl - 0.25).abs() < 1e-9);
        let man = warped_distance(&Manhattan, &a, &b, band, f64::INFINITY);
        assert!((man - 0.25).abs() < 1e-9);
        let cheb = warped_distance(&Chebyshev, &a, &b, band, f64::INFINITY);
        assert!((cheb - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_five_dtw_equal_length_seven() {
        let a = [4.0, 3.0, 5.0, 3.0, 5.0, 3.0, 4.0];
        let b = [4.0, 3.0, 3.0, 1.0, 1.0, 3.0, 4.0];
        let band = 7;
        let eucl = warped_distance(&Euclidean, &a, &b, band, f64::INFINITY);
        assert!((eucl - 12.0_f64.sqrt() / 7.0).abs() < 1e-9);
        let man = warped_distance(&Manhattan, &a, &b, band, f64::INFINITY);
        assert!((man - 8.0 / 7.0).abs() < 1e-9);
        let cheb = warped_distance(&Chebyshev, &a, &b, band, f64::INFINITY);
        assert!((cheb - 2.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_six_dtw_dropout_prunes() {
        let a = [2.0, 2.0, 2.0, 2.0];
        let b = [20.0, 20.0, 20.0, 15.0];
        let dist = warped_distance(&Euclidean, &a, &b, 4, 5.0);
        assert_eq!(dist, f64::INFINITY);
    }

    #[test]
    fn pairwise_distance_rejects_unequal_lengths() {
        let a = [0.0; 5];
        let b = [0.0; 4];
        assert!(pairwise_distance(&Euclidean, &a, &b, f64::INFINITY).is_err());
    }

    #[test]
    fn dropout_pre_transform_matches_plain_path() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [11.0, 2.0, 3.0, 4.0, 5.0];
        let plain = pairwise_distance(&Euclidean, &a, &b, f64::INFINITY).unwrap();
        let inverse = pairwise_distance_inverse(&Euclidean, &a, &b, f64::INFINITY).unwrap();
        assert!((plain - inverse).abs() < 1e-9);
    }

    #[test]
    fn cascade_matches_plain_dtw_for_euclidean() {
        let d = std::sync::Arc::new(Dataset::new(2, 4, vec![1.0, 2.0, 2.0, 4.0, 1.0, 2.0, 4.0, 5.0]).unwrap());
        let query = TimeSeries::new(d, 0, 0, 4).unwrap();
        let b = query.dataset().row(1);
        let cfg = Config::new(1.0);
        let dist = cascade_distance(&query, b, &cfg, f64::INFINITY);
        assert!((dist - 0.25).abs() < 1e-9);
    }
}
