//! The metric capability contract and the three shipped concrete metrics.
//!
//! A metric is a zero-sized struct implementing [`Metric`]; `Euclidean` and
//! `Manhattan` additionally implement [`InverseNorm`] since their `norm` is
//! invertible in closed form, letting pairwise distance pre-transform the
//! dropout once per call instead of normalizing the accumulator every step.
//! `Chebyshev`'s `norm` is the identity, so there is nothing to invert.

mod chebyshev;
mod euclidean;
mod manhattan;

pub use chebyshev::Chebyshev;
pub use euclidean::Euclidean;
pub use manhattan::Manhattan;

/// The accumulator/finalization contract a distance metric must supply.
pub trait Metric {
    /// Running accumulator type threaded through `reduce` calls.
    type Acc: Copy;

    /// A fresh accumulator value.
    fn init(&self) -> Self::Acc;

    /// Combines `acc_prev` with the per-element contribution of `x, y`.
    fn reduce(&self, acc_prev: Self::Acc, x: f64, y: f64) -> Self::Acc;

    /// Finalizes an equal-length pairwise accumulator over `len` elements.
    fn norm(&self, acc: Self::Acc, len: usize) -> f64;

    /// Finalizes a DTW cell accumulator for sequences of length `m`, `n`.
    fn norm_dtw(&self, acc: Self::Acc, m: usize, n: usize) -> f64;
}

/// Capability test for metrics whose `norm` is invertible, letting pairwise
/// distance compare the raw accumulator against a pre-transformed dropout
/// instead of calling `norm` at every step.
pub trait InverseNorm: Metric {
    /// The accumulator threshold equivalent to `norm(acc, len) >= dropout`.
    fn inverse_norm(&self, dropout: f64, len: usize) -> f64;
}
