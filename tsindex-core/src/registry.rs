//! Name-based metric registry, mirroring the original's `getDistance(name)`
//! / `getDistance(name + "_dtw")` pair.
//!
//! Rust has no portable way to ask, for an arbitrary `M: Metric`, "does
//! this type also implement `InverseNorm`" — the capability test the
//! original resolves at compile time via SFINAE. Instead the registry
//! picks the pre-transformed-dropout path once, here, by matching on the
//! metric's name, and returns a boxed closure that already embeds the
//! choice. Per-element dispatch cost is therefore one virtual call per
//! pairwise/warped invocation, not per accumulator step.

use std::sync::Arc;

use crate::config::Config;
use crate::distance::{cascade_distance, pairwise_distance, pairwise_distance_inverse, warped_distance};
use crate::error::{Error, Result};
use crate::metric::{Chebyshev, Euclidean, Manhattan};
use crate::timeseries::TimeSeries;

/// A pairwise distance function resolved by name.
pub type DistanceFn = Arc<dyn Fn(&[f64], &[f64], f64) -> Result<f64> + Send + Sync>;

/// A warped (DTW) distance function resolved by name. Takes the query as a
/// [`TimeSeries`] (so the Euclidean cascade can use its memoized envelope)
/// and the candidate as a plain slice, since candidates are sometimes
/// owned centroid buffers with no backing dataset row.
pub type WarpedFn = Arc<dyn Fn(&TimeSeries, &[f64], &Config, f64) -> f64 + Send + Sync>;

/// Resolves the pairwise distance function for a metric name.
pub fn get_distance(name: &str) -> Result<DistanceFn> {
    match name {
        "euclidean" => Ok(Arc::new(|a: &[f64], b: &[f64], dropout: f64| {
            pairwise_distance_inverse(&Euclidean, a, b, dropout)
        })),
        "manhattan" => Ok(Arc::new(|a: &[f64], b: &[f64], dropout: f64| {
            pairwise_distance_inverse(&Manhattan, a, b, dropout)
        })),
        "chebyshev" => Ok(Arc::new(|a: &[f64], b: &[f64], dropout: f64| {
            pairwise_distance(&Chebyshev, a, b, dropout)
        })),
        other => Err(Error::invalid_input(format!("unknown distance name: {other}"))),
    }
}

/// Resolves the warped (DTW) distance function for a metric name. For
/// `"euclidean"` this prefers the LB-Keogh/DTW cascade over plain DTW as
/// the warped path, since the envelope bound is cheap and tight enough to
/// prune most candidates before a full DTW ever runs.
pub fn get_distance_dtw(name: &str) -> Result<WarpedFn> {
    match name {
        "euclidean" => Ok(Arc::new(|query: &TimeSeries, b: &[f64], cfg: &Config, dropout: f64| {
            cascade_distance(query, b, cfg, dropout)
        })),
        "manhattan" => Ok(Arc::new(|query: &TimeSeries, b: &[f64], cfg: &Config, dropout: f64| {
            let band = cfg.warping_band_size(query.len().min(b.len()));
            warped_distance(&Manhattan, query.as_slice(), b, band, dropout)
        })),
        "chebyshev" => Ok(Arc::new(|query: &TimeSeries, b: &[f64], cfg: &Config, dropout: f64| {
            let band = cfg.warping_band_size(query.len().min(b.len()));
            warped_distance(&Chebyshev, query.as_slice(), b, band, dropout)
        })),
        other => Err(Error::invalid_input(format!("unknown distance name: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    #[test]
    fn unknown_name_is_invalid_input() {
        assert!(get_distance("haversine").is_err());
        assert!(get_distance_dtw("haversine").is_err());
    }

    #[test]
    fn euclidean_dtw_resolves_to_cascade() {
        let d = std::sync::Arc::new(Dataset::new(2, 4, vec![1.0, 2.0, 2.0, 4.0, 1.0, 2.0, 4.0, 5.0]).unwrap());
        let a = TimeSeries::new(std::sync::Arc::clone(&d), 0, 0, 4).unwrap();
        let b = d.row(1);
        let warped = get_distance_dtw("euclidean").unwrap();
        let cfg = Config::new(1.0);
        let dist = warped(&a, b, &cfg, f64::INFINITY);
        assert!((dist - 0.25).abs() < 1e-9);
    }

    #[test]
    fn manhattan_pairwise_resolves() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [11.0, 2.0, 3.0, 4.0, 5.0];
        let f = get_distance("manhattan").unwrap();
        let dist = f(&a, &b, f64::INFINITY).unwrap();
        assert!((dist - 2.0).abs() < 1e-9);
    }
}
