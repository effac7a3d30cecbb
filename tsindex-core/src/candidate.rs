//! Query result types: a single match and its distance, ordered so a
//! max-heap (`BinaryHeap<Candidate>`) keeps the *worst* candidate on top
//! for intra-group k-best maintenance.

use std::cmp::Ordering;

/// A matched subsequence and its distance to the query.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Candidate {
    pub row: usize,
    pub start: usize,
    pub length: usize,
    pub distance: f64,
}

impl Candidate {
    pub fn new(row: usize, start: usize, length: usize, distance: f64) -> Self {
        Candidate {
            row,
            start,
            length,
            distance,
        }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.row == other.row && self.start == other.start && self.length == other.length && self.distance.total_cmp(&other.distance) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered by distance only, so a `BinaryHeap<Candidate>` is a max-heap by
/// distance regardless of which coordinates happen to tie.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn binary_heap_pops_worst_first() {
        let mut heap = BinaryHeap::new();
        heap.push(Candidate::new(0, 0, 3, 1.0));
        heap.push(Candidate::new(0, 1, 3, 5.0));
        heap.push(Candidate::new(0, 2, 3, 2.0));
        assert_eq!(heap.pop().unwrap().distance, 5.0);
        assert_eq!(heap.pop().unwrap().distance, 2.0);
        assert_eq!(heap.pop().unwrap().distance, 1.0);
    }
}
