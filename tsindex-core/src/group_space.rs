//! The global group space: per-length group sets for every admissible
//! subsequence length, plus cross-length traversal for best-match and
//! hierarchical k-NN queries.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::candidate::Candidate;
use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::group_set::GroupSet;
use crate::registry::{get_distance, get_distance_dtw, DistanceFn, WarpedFn};
use crate::timeseries::TimeSeries;

/// Owns every per-length [`GroupSet`] built for one `(dataset, metric,
/// threshold)` triple. Immutable after construction; queries share it
/// without locks.
pub struct GroupSpace {
    dataset: Arc<Dataset>,
    sets: BTreeMap<usize, GroupSet>,
    threshold: f64,
    metric_name: String,
    config: Config,
    #[allow(dead_code)]
    pairwise: DistanceFn,
    warped: WarpedFn,
}

impl GroupSpace {
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_warping_band_ratio(&mut self, ratio: f64) {
        self.config = Config::new(ratio);
    }

    /// Lengths with a populated group set, in ascending order.
    pub fn lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.sets.keys().copied()
    }

    pub fn group_set(&self, length: usize) -> Option<&GroupSet> {
        self.sets.get(&length)
    }

    /// Rebuilds a space directly from previously saved per-length group
    /// sets, bypassing [`GroupSpace::group`]'s incremental assignment
    /// entirely. Used by group-file loading.
    pub fn from_parts(dataset: Arc<Dataset>, name: &str, threshold: f64, config: Config, sets: BTreeMap<usize, GroupSet>) -> Result<Self> {
        let pairwise = get_distance(name)?;
        let warped = get_distance_dtw(name)?;
        Ok(GroupSpace {
            dataset,
            sets,
            threshold,
            metric_name: name.to_string(),
            config,
            pairwise,
            warped,
        })
    }

    /// Builds every length-`ℓ` group set for `ℓ` in `2..=dataset.cols()`.
    /// Distinct lengths build in parallel across `threads` worker threads
    /// (a dedicated pool, not rayon's global one, for `threads <= 1`);
    /// within one length, construction is sequential since group
    /// membership depends on the running centroids. Returns the space and
    /// the total number of groups created across all lengths.
    pub fn group(dataset: Arc<Dataset>, name: &str, threshold: f64, threads: usize, config: Config) -> Result<(Self, usize)> {
        if dataset.rows() == 0 {
            return Err(Error::invalid_input("dataset has no rows"));
        }
        let l = dataset.cols();
        if l < 2 {
            return Err(Error::invalid_input(format!(
                "dataset row length {l} is too short to group (need at least 2)"
            )));
        }

        let pairwise = get_distance(name)?;
        let warped = get_distance_dtw(name)?;
        let lengths: Vec<usize> = (2..=l).collect();

        let build_one = |length: &usize| -> Result<(usize, GroupSet, usize)> {
            let (set, count) = GroupSet::generate(Arc::clone(&dataset), *length, &pairwise, threshold)?;
            Ok((*length, set, count))
        };

        let results: Vec<Result<(usize, GroupSet, usize)>> = if threads <= 1 {
            lengths.iter().map(build_one).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::internal(e.to_string()))?;
            pool.install(|| lengths.par_iter().map(build_one).collect())
        };

        let mut sets = BTreeMap::new();
        let mut total = 0;
        for r in results {
            let (length, set, count) = r?;
            total += count;
            sets.insert(length, set);
        }

        Ok((
            GroupSpace {
                dataset,
                sets,
                threshold,
                metric_name: name.to_string(),
                config,
                pairwise,
                warped,
            },
            total,
        ))
    }

    /// The candidate lengths examined for a query of length `q`: `q`
    /// itself, then expanding outward, stopping in each direction once
    /// `|ℓ − q| > warping_band_size(min(ℓ, q))`. Bounded to lengths this
    /// space actually built a group set for — a query longer than every
    /// built length (`q` beyond the indexed dataset's row length) has no
    /// length-`q` set to probe, so expansion starts from the nearest
    /// built length instead of from `q` itself, and any length without a
    /// set (a gap from a partial group file, or `q` itself out of range)
    /// is silently skipped rather than indexed.
    fn traverse_order(&self, q: usize) -> Vec<usize> {
        let l_max = self.dataset.cols();
        let admissible = |ell: usize| ell.abs_diff(q) <= self.config.warping_band_size(ell.min(q));

        let mut order = Vec::new();
        if self.sets.contains_key(&q) {
            order.push(q);
        }

        let mut ell = q.min(l_max + 1);
        while ell > 2 {
            ell -= 1;
            if !admissible(ell) {
                break;
            }
            if self.sets.contains_key(&ell) {
                order.push(ell);
            }
        }

        let mut ell = q;
        while ell < l_max {
            ell += 1;
            if !admissible(ell) {
                break;
            }
            if self.sets.contains_key(&ell) {
                order.push(ell);
            }
        }

        order
    }

    /// Best match for `query`: probes lengths in traverse order for the
    /// closest centroid, then returns the closest member of the winning
    /// group. `None` if no group was ever grouped or the query length
    /// admits no lengths at all.
    pub fn best_match(&self, query: &TimeSeries) -> Result<Option<Candidate>> {
        let q = query.len();
        if q < 2 {
            return Err(Error::invalid_input("query length must be at least 2"));
        }
        let order = self.traverse_order(q);

        let mut best_so_far = f64::INFINITY;
        let mut winner: Option<(usize, usize)> = None;
        for ell in order {
            let set = &self.sets[&ell];
            tracing::trace!(length = ell, "probing length");
            if let Some((gid, dist)) = set.best_group(query, &self.warped, &self.config, best_so_far) {
                if dist < best_so_far {
                    tracing::trace!(length = ell, group = gid, distance = dist, "running best improved");
                    best_so_far = dist;
                    winner = Some((ell, gid));
                }
            }
        }

        let Some((ell, gid)) = winner else {
            return Ok(None);
        };
        let set = &self.sets[&ell];
        Ok(set.intra_group_best(gid, query, &self.warped, &self.config, f64::INFINITY))
    }

    /// Hierarchical k-NN: gathers the `k` (or more) closest members across
    /// every length, guaranteeing every "better" selected group's members
    /// all precede the boundary group's partial best-k selection.
    pub fn k_nn(&self, query: &TimeSeries, k: usize) -> Result<Vec<Candidate>> {
        let q = query.len();
        if q < 2 {
            return Err(Error::invalid_input("query length must be at least 2"));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut k_prime = k;
        let mut selected = Vec::new();
        for (_, set) in self.sets.iter() {
            if k_prime == 0 {
                break;
            }
            let (sel, remaining) = set.inter_level_k(query, &self.warped, &self.config, k_prime);
            selected.extend(sel);
            k_prime = remaining;
        }

        let mut result = Vec::new();
        for g in &selected {
            let set = &self.sets[&g.length];
            if g.remaining_before >= g.size {
                for (row, start) in set.member_coords(g.group_id) {
                    let member = TimeSeries::new(Arc::clone(&self.dataset), row, start, g.length)?;
                    let dist = (self.warped)(query, member.as_slice(), &self.config, f64::INFINITY);
                    result.push(Candidate::new(row, start, g.length, dist));
                }
            } else {
                // Boundary group: request k' + group_size members, a count
                // that always exceeds its actual membership, so every
                // member comes back rather than only the budget-sized cut.
                let k = g.remaining_before + g.size;
                result.extend(set.intra_group_k_best(g.group_id, query, &self.warped, &self.config, k));
            }
        }

        Ok(result)
    }
}
