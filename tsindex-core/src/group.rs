//! A similarity group: a centroid, a member count, and the head of an
//! intrusive member chain stored in the owning [`crate::group_set::GroupSet`]'s
//! arena.

/// One entry in a per-length member arena: which group a subsequence
/// belongs to, and the flat index of the previous subsequence pushed onto
/// that group's chain (`None` if this entry is the chain's head).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct MemberSlot {
    pub group_id: usize,
    pub prev: Option<usize>,
}

/// A similarity group of equal-length subsequences.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Group {
    /// Arithmetic mean of every member's values, updated incrementally.
    pub centroid: Vec<f64>,
    pub count: usize,
    /// Flat arena index of the most recently added member, or `None` for
    /// an empty group (never observed once `generate` completes, since
    /// every group is created with a founding member).
    pub last_member: Option<usize>,
}

impl Group {
    /// Opens a new group with `values` as its sole founding member.
    pub fn new(values: &[f64]) -> Self {
        Group {
            centroid: values.to_vec(),
            count: 1,
            last_member: None,
        }
    }

    /// Folds `values` into the running centroid mean and bumps the count.
    /// Does not touch `last_member`; the caller links the arena chain and
    /// sets it directly since that requires the member's flat arena index.
    pub fn add_member(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.centroid.len());
        let n = self.count as f64;
        for (c, &v) in self.centroid.iter_mut().zip(values) {
            *c = (*c * n + v) / (n + 1.0);
        }
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_mean_matches_batch_mean() {
        let mut g = Group::new(&[1.0, 1.0]);
        g.add_member(&[3.0, 5.0]);
        g.add_member(&[2.0, 0.0]);
        assert_eq!(g.count, 3);
        assert!((g.centroid[0] - 2.0).abs() < 1e-9);
        assert!((g.centroid[1] - 2.0).abs() < 1e-9);
    }
}
