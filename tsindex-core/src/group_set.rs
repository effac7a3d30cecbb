//! The per-length group set: incremental construction plus the best-group,
//! intra-group best-match, intra-group k-best, and hierarchical k-NN
//! contribution query primitives.

use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::candidate::Candidate;
use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::group::{Group, MemberSlot};
use crate::registry::{DistanceFn, WarpedFn};
use crate::timeseries::TimeSeries;

/// One group selected by [`GroupSet::inter_level_k`], tagged with the
/// length it came from so the caller can locate it again.
#[derive(Debug, Clone, Copy)]
pub struct SelectedGroup {
    pub length: usize,
    pub group_id: usize,
    pub centroid_distance: f64,
    pub size: usize,
    /// The running k-prime budget immediately before this group was
    /// selected. `>= size` for every group fully covered by the budget
    /// (spec.md §4.4 step 3: "include all its members"); `< size` for the
    /// one group, if any, whose selection exhausted the budget
    /// mid-group — the boundary group spec.md §4.4 step 2 resolves by
    /// requesting its "intra-group k′ + group_size best members"
    /// (`remaining_before + size`, a count that always exceeds the
    /// group's actual membership, so every member comes back, sorted by
    /// distance rather than truncated to the budget).
    pub remaining_before: usize,
}

/// Every similarity group covering subsequences of one fixed length,
/// backed by a flat member-chain arena sized `rows * (cols - length + 1)`.
pub struct GroupSet {
    dataset: Arc<Dataset>,
    length: usize,
    per_row: usize,
    groups: Vec<Group>,
    member_table: Vec<Option<MemberSlot>>,
}

impl GroupSet {
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    fn coords(&self, flat_idx: usize) -> (usize, usize) {
        (flat_idx / self.per_row, flat_idx % self.per_row)
    }

    /// Assigns every `(row, start)` subsequence of `length` to the nearest
    /// existing centroid within `threshold`, else opens a new group.
    /// Returns the populated set and the number of groups created.
    pub fn generate(
        dataset: Arc<Dataset>,
        length: usize,
        distance: &DistanceFn,
        threshold: f64,
    ) -> Result<(Self, usize)> {
        if dataset.rows() == 0 {
            return Err(Error::invalid_input("dataset has no rows"));
        }
        if length == 0 || length > dataset.cols() {
            return Err(Error::invalid_input(format!(
                "subsequence length {length} out of range for row length {}",
                dataset.cols()
            )));
        }

        let per_row = dataset.subsequence_count(length);
        let span = tracing::info_span!("group", length);
        let _enter = span.enter();

        let mut groups: Vec<Group> = Vec::new();
        let mut member_table: Vec<Option<MemberSlot>> = vec![None; dataset.rows() * per_row];

        for row in 0..dataset.rows() {
            for start in 0..per_row {
                let idx = row * per_row + start;
                let view = TimeSeries::new(Arc::clone(&dataset), row, start, length)?;
                let values = view.as_slice();

                let mut best: Option<(usize, f64)> = None;
                for (gid, g) in groups.iter().enumerate() {
                    let dist = distance(values, &g.centroid, threshold)?;
                    if best.map_or(true, |(_, bd)| dist < bd) {
                        best = Some((gid, dist));
                    }
                }

                match best {
                    Some((gid, dist)) if dist <= threshold => {
                        let prev = groups[gid].last_member;
                        groups[gid].add_member(values);
                        groups[gid].last_member = Some(idx);
                        member_table[idx] = Some(MemberSlot { group_id: gid, prev });
                    }
                    _ => {
                        let gid = groups.len();
                        let mut g = Group::new(values);
                        g.last_member = Some(idx);
                        groups.push(g);
                        member_table[idx] = Some(MemberSlot { group_id: gid, prev: None });
                    }
                }
            }
        }

        tracing::debug!(groups = groups.len(), "groups created");
        let count = groups.len();
        Ok((
            GroupSet {
                dataset,
                length,
                per_row,
                groups,
                member_table,
            },
            count,
        ))
    }

    /// Rebuilds a set from previously saved groups: each entry is a
    /// centroid plus the `(row, start)` coordinates of its members, in
    /// the order they were written. Used by group-file loading, where the
    /// incremental assignment in [`GroupSet::generate`] never runs again —
    /// the saved centroids and membership are taken as ground truth.
    pub fn from_parts(dataset: Arc<Dataset>, length: usize, groups_data: Vec<(Vec<f64>, Vec<(usize, usize)>)>) -> Result<Self> {
        if length == 0 || length > dataset.cols() {
            return Err(Error::invalid_input(format!(
                "subsequence length {length} out of range for row length {}",
                dataset.cols()
            )));
        }
        let per_row = dataset.subsequence_count(length);
        let mut member_table: Vec<Option<MemberSlot>> = vec![None; dataset.rows() * per_row];
        let mut groups = Vec::with_capacity(groups_data.len());

        for (gid, (centroid, coords)) in groups_data.into_iter().enumerate() {
            let count = coords.len();
            let mut last_member = None;
            for (row, start) in coords {
                if row >= dataset.rows() || start >= per_row {
                    return Err(Error::invalid_input(format!("member coordinate ({row}, {start}) out of range for length {length}")));
                }
                let idx = row * per_row + start;
                member_table[idx] = Some(MemberSlot { group_id: gid, prev: last_member });
                last_member = Some(idx);
            }
            groups.push(Group {
                centroid,
                count,
                last_member,
            });
        }

        Ok(GroupSet {
            dataset,
            length,
            per_row,
            groups,
            member_table,
        })
    }

    fn chain(&self, group_id: usize) -> ChainIter<'_> {
        ChainIter {
            table: &self.member_table,
            current: self.groups[group_id].last_member,
        }
    }

    /// Scans every group's centroid distance to `query` under `dropout`
    /// and returns the minimum, regardless of whether it beats the
    /// caller's own running best — the caller compares.
    pub fn best_group(&self, query: &TimeSeries, warped: &WarpedFn, cfg: &Config, dropout: f64) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (gid, g) in self.groups.iter().enumerate() {
            let dist = warped(query, &g.centroid, cfg, dropout);
            if best.map_or(true, |(_, bd)| dist < bd) {
                best = Some((gid, dist));
            }
        }
        best
    }

    /// Walks `group_id`'s member chain for the closest member to `query`,
    /// tightening the dropout as better matches are found. Returns `None`
    /// if every member is pruned rather than a sentinel "infinitely far"
    /// candidate.
    pub fn intra_group_best(&self, group_id: usize, query: &TimeSeries, warped: &WarpedFn, cfg: &Config, dropout: f64) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        let mut running = dropout;
        for idx in self.chain(group_id) {
            let (row, start) = self.coords(idx);
            let member = TimeSeries::new(Arc::clone(&self.dataset), row, start, self.length).ok()?;
            let dist = warped(query, member.as_slice(), cfg, running);
            if dist.is_finite() && best.as_ref().map_or(true, |b| dist < b.distance) {
                running = dist;
                best = Some(Candidate::new(row, start, self.length, dist));
            }
        }
        best
    }

    /// Maintains a size-`k` max-heap of the closest members in `group_id`,
    /// returning them sorted by ascending distance.
    pub fn intra_group_k_best(&self, group_id: usize, query: &TimeSeries, warped: &WarpedFn, cfg: &Config, k: usize) -> Vec<Candidate> {
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k);
        for idx in self.chain(group_id) {
            let (row, start) = self.coords(idx);
            let Ok(member) = TimeSeries::new(Arc::clone(&self.dataset), row, start, self.length) else {
                continue;
            };
            if heap.len() < k {
                let dist = warped(query, member.as_slice(), cfg, f64::INFINITY);
                heap.push(Candidate::new(row, start, self.length, dist));
            } else {
                let worst = heap.peek().map(|c| c.distance).unwrap_or(f64::INFINITY);
                let dist = warped(query, member.as_slice(), cfg, worst);
                if dist < worst {
                    heap.pop();
                    heap.push(Candidate::new(row, start, self.length, dist));
                }
            }
        }
        let mut result: Vec<Candidate> = heap.into_vec();
        result.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        result
    }

    /// Hierarchical k-NN contribution: scores every group's centroid
    /// distance, greedily selects the closest groups until their combined
    /// size covers `k_prime`, and returns the selection plus the
    /// remaining `k_prime` (never below zero).
    pub fn inter_level_k(&self, query: &TimeSeries, warped: &WarpedFn, cfg: &Config, k_prime: usize) -> (Vec<SelectedGroup>, usize) {
        if k_prime == 0 || self.groups.is_empty() {
            return (Vec::new(), k_prime);
        }
        let mut scored: Vec<(usize, f64, usize)> = self
            .groups
            .iter()
            .enumerate()
            .map(|(gid, g)| (gid, warped(query, &g.centroid, cfg, f64::INFINITY), g.count))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut selected = Vec::new();
        let mut remaining = k_prime;
        for (gid, dist, size) in scored {
            if remaining == 0 {
                break;
            }
            selected.push(SelectedGroup {
                length: self.length,
                group_id: gid,
                centroid_distance: dist,
                size,
                remaining_before: remaining,
            });
            remaining = remaining.saturating_sub(size);
        }
        (selected, remaining)
    }

    /// All `(row, start)` member coordinates of `group_id`, in chain
    /// (reverse-insertion/LIFO) order.
    pub fn member_coords(&self, group_id: usize) -> Vec<(usize, usize)> {
        self.chain(group_id).map(|idx| self.coords(idx)).collect()
    }
}

struct ChainIter<'a> {
    table: &'a [Option<MemberSlot>],
    current: Option<usize>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let idx = self.current?;
        self.current = self.table[idx].and_then(|slot| slot.prev);
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{get_distance, get_distance_dtw};

    fn dataset() -> Arc<Dataset> {
        // Two rows of length 3, both subsequences of length 2.
        Arc::new(Dataset::new(2, 3, vec![1.0, 1.0, 1.0, 1.0, 1.0, 10.0]).unwrap())
    }

    #[test]
    fn every_subsequence_is_assigned_exactly_once() {
        let d = dataset();
        let dist = get_distance("euclidean").unwrap();
        let (set, _) = GroupSet::generate(Arc::clone(&d), 2, &dist, 0.01).unwrap();
        let mut all: Vec<(usize, usize)> = Vec::new();
        for gid in 0..set.groups().len() {
            all.extend(set.member_coords(gid));
        }
        all.sort();
        let mut expected: Vec<(usize, usize)> = Vec::new();
        for row in 0..d.rows() {
            for start in 0..d.subsequence_count(2) {
                expected.push((row, start));
            }
        }
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn close_subsequences_share_a_group() {
        let d = dataset();
        let dist = get_distance("euclidean").unwrap();
        let (set, count) = GroupSet::generate(Arc::clone(&d), 2, &dist, 0.01).unwrap();
        // row0 is [1,1] at both starts, row1's first subsequence [1,1] is
        // identical; only row1's second subsequence [1,10] differs.
        assert_eq!(count, 2);
        assert_eq!(set.groups()[0].count, 3);
    }

    #[test]
    fn intra_group_best_returns_none_when_all_pruned() {
        let d = dataset();
        let dist = get_distance("euclidean").unwrap();
        let warped = get_distance_dtw("euclidean").unwrap();
        let (set, _) = GroupSet::generate(Arc::clone(&d), 2, &dist, 0.01).unwrap();
        let query = TimeSeries::new(d, 0, 0, 2).unwrap();
        let cfg = Config::new(1.0);
        // A negative dropout can never be beaten, even by an exact match.
        let best = set.intra_group_best(0, &query, &warped, &cfg, -1.0);
        assert!(best.is_none());
    }
}
