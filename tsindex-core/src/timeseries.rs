//! A lightweight view into a [`Dataset`] row, plus its lazily-computed
//! Keogh envelope.

use std::cell::RefCell;
use std::sync::Arc;

use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::{Error, Result};

/// Paired upper/lower running-extrema sequences used for the LB-Keogh lower
/// bound: `upper[i] = max(v[i-r..=i+r])`, `lower[i] = min(v[i-r..=i+r])`,
/// clamped to the view's bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

impl Envelope {
    fn build(values: &[f64], r: usize) -> Self {
        let n = values.len();
        let mut upper = Vec::with_capacity(n);
        let mut lower = Vec::with_capacity(n);
        for i in 0..n {
            let lo = i.saturating_sub(r);
            let hi = (i + r + 1).min(n);
            let window = &values[lo..hi];
            let mut mx = window[0];
            let mut mn = window[0];
            for &v in &window[1..] {
                if v > mx {
                    mx = v;
                }
                if v < mn {
                    mn = v;
                }
            }
            upper.push(mx);
            lower.push(mn);
        }
        Envelope { upper, lower }
    }
}

/// A view `(dataset, row, start, length)` into a dataset's row. Holds a
/// cloned `Arc` handle to the dataset rather than borrowing it, so a view
/// (or anything built from one, like a [`crate::group_space::GroupSpace`])
/// can be stored alongside its dataset in a single owning struct instead
/// of needing a borrow that outlives both.
#[derive(Debug)]
pub struct TimeSeries {
    dataset: Arc<Dataset>,
    row: usize,
    start: usize,
    length: usize,
    envelope: RefCell<Option<(f64, Envelope)>>,
}

impl TimeSeries {
    /// Builds a view, bounds-checking `row`, `start`, and `start + length`
    /// against the dataset immediately.
    pub fn new(dataset: Arc<Dataset>, row: usize, start: usize, length: usize) -> Result<Self> {
        if row >= dataset.rows() {
            return Err(Error::invalid_input(format!(
                "row {} out of bounds (dataset has {} rows)",
                row,
                dataset.rows()
            )));
        }
        if length == 0 || start + length > dataset.cols() {
            return Err(Error::invalid_input(format!(
                "view (start={start}, length={length}) out of bounds for row length {}",
                dataset.cols()
            )));
        }
        Ok(TimeSeries {
            dataset,
            row,
            start,
            length,
            envelope: RefCell::new(None),
        })
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        debug_assert!(i < self.length);
        self.dataset.get(self.row, self.start + i)
    }

    pub fn values(&self) -> Vec<f64> {
        self.as_slice().to_vec()
    }

    /// The view as a contiguous slice. Valid because a view never spans
    /// more than one dataset row.
    pub fn as_slice(&self) -> &[f64] {
        &self.dataset.row(self.row)[self.start..self.start + self.length]
    }

    /// Produces another view over the same dataset row, sharing the
    /// underlying `Arc`. `new_start`/`new_end` are offsets relative to
    /// this view.
    pub fn sub(&self, new_start: usize, new_end: usize) -> Result<TimeSeries> {
        if new_start > new_end || new_end > self.length {
            return Err(Error::invalid_input(format!(
                "sub-view [{new_start}, {new_end}) out of bounds for view of length {}",
                self.length
            )));
        }
        TimeSeries::new(Arc::clone(&self.dataset), self.row, self.start + new_start, new_end - new_start)
    }

    /// Returns the envelope for the warping band implied by `cfg` at this
    /// view's length, computing and memoizing it on first use. A later call
    /// with a different `warping_band_ratio` recomputes and replaces the
    /// cached envelope.
    pub fn envelope(&self, cfg: &Config) -> std::cell::Ref<'_, Envelope> {
        let ratio = cfg.warping_band_ratio;
        let stale = match &*self.envelope.borrow() {
            Some((cached_ratio, _)) => *cached_ratio != ratio,
            None => true,
        };
        if stale {
            let r = cfg.warping_band_size(self.length);
            let envelope = Envelope::build(self.as_slice(), r);
            *self.envelope.borrow_mut() = Some((ratio, envelope));
        }
        std::cell::Ref::map(self.envelope.borrow(), |opt| &opt.as_ref().unwrap().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ds() -> Arc<Dataset> {
        Arc::new(Dataset::new(1, 5, vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap())
    }

    #[test]
    fn view_reads_values() {
        let d = ds();
        let v = TimeSeries::new(d, 0, 1, 3).unwrap();
        assert_eq!(v.values(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn out_of_bounds_view_errors() {
        let d = ds();
        assert!(TimeSeries::new(Arc::clone(&d), 0, 3, 3).is_err());
        assert!(TimeSeries::new(d, 1, 0, 1).is_err());
    }

    #[test]
    fn sub_view_shares_dataset() {
        let d = ds();
        let v = TimeSeries::new(d, 0, 0, 5).unwrap();
        let sub = v.sub(1, 4).unwrap();
        assert_eq!(sub.values(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn envelope_matches_band() {
        let d = ds();
        let v = TimeSeries::new(d, 0, 0, 5).unwrap();
        let cfg = Config::new(1.0);
        let env = v.envelope(&cfg);
        assert_eq!(env.upper, vec![5.0, 5.0, 5.0, 5.0, 5.0]);
        assert_eq!(env.lower, vec![1.0, 1.0, 1.0, 1.0, 1.0]);
    }
}
