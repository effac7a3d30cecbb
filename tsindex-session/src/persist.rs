//! Saves and loads a [`GroupSpace`] to the pinned group-file text format.
//!
//! The layout follows `Group::saveGroup`/`loadGroup` in the original C++
//! implementation, generalized from one group to a whole space: a header
//! line identifying the file version, threshold, and dataset shape; a
//! second line naming the length range and distance metric; then, per
//! length, a group count followed by each group's centroid, member count,
//! and `(row, start)` member coordinates. Token-separated throughout
//! (any whitespace, including newlines, splits tokens), matching the
//! original's `ifstream >>` reads rather than a strict line grammar.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use tsindex_core::{Config, Dataset, Error, GroupSet, GroupSpace, Result};

pub const GROUP_FILE_VERSION: u32 = 1;

/// Writes `space` to `path`. When `size_only` is set, each group's member
/// coordinates are omitted (only its centroid and count are kept) — useful
/// for inspecting the size distribution of a grouping without the full
/// membership. A space loaded back from a `size_only` file has correct
/// centroids and counts but empty member chains, so queries against it
/// will never find a match; it is a diagnostic dump, not a full
/// round-trip.
pub fn save_groups(space: &GroupSpace, dataset: &Dataset, path: &Path, size_only: bool) -> Result<()> {
    let lengths: Vec<usize> = space.lengths().collect();
    let length_from = *lengths.first().unwrap_or(&0);
    let length_to = lengths.last().map_or(0, |l| l + 1);

    let mut out = String::new();
    writeln!(out, "{} {} {} {}", GROUP_FILE_VERSION, space.threshold(), dataset.rows(), dataset.cols()).unwrap();
    writeln!(out, "{} {} {} {}", length_from, length_to, space.metric_name(), size_only as u8).unwrap();

    for length in lengths {
        let set = space.group_set(length).expect("length came from space.lengths()");
        writeln!(out, "{}", set.groups().len()).unwrap();
        for (gid, g) in set.groups().iter().enumerate() {
            for (i, v) in g.centroid.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write!(out, "{v}").unwrap();
            }
            out.push('\n');
            writeln!(out, "{}", g.count).unwrap();
            if !size_only {
                for (row, start) in set.member_coords(gid) {
                    write!(out, "{row} {start} ").unwrap();
                }
                out.push('\n');
            }
        }
    }

    std::fs::write(path, out)?;
    tracing::debug!(path = %path.display(), size_only, "saved groups");
    Ok(())
}

/// Loads a group space from `path`, validating it against `dataset`.
/// Returns the space and the total number of groups across all lengths.
pub fn load_groups(dataset: Arc<Dataset>, path: &Path) -> Result<(GroupSpace, usize)> {
    let text = std::fs::read_to_string(path)?;
    let mut toks = Tokens::new(&text);

    let version = toks.next_usize()?;
    if version != GROUP_FILE_VERSION as usize {
        return Err(Error::invalid_state(format!("unsupported group file version {version}, expected {GROUP_FILE_VERSION}")));
    }
    let threshold = toks.next_f64()?;
    let rows = toks.next_usize()?;
    let cols = toks.next_usize()?;
    if rows != dataset.rows() || cols != dataset.cols() {
        return Err(Error::invalid_state(format!(
            "group file shape {rows}x{cols} does not match the loaded dataset's {}x{}",
            dataset.rows(),
            dataset.cols()
        )));
    }

    let length_from = toks.next_usize()?;
    let length_to = toks.next_usize()?;
    let metric_name = toks.next_str()?.to_string();
    let size_only = toks.next_usize()? != 0;

    let mut sets = BTreeMap::new();
    let mut total = 0;
    for length in length_from..length_to {
        let group_count = toks.next_usize()?;
        let mut groups_data = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            let mut centroid = Vec::with_capacity(length);
            for _ in 0..length {
                centroid.push(toks.next_f64()?);
            }
            let count = toks.next_usize()?;
            let mut coords = Vec::new();
            if !size_only {
                coords.reserve(count);
                for _ in 0..count {
                    let row = toks.next_usize()?;
                    let start = toks.next_usize()?;
                    coords.push((row, start));
                }
            }
            groups_data.push((centroid, coords));
        }
        total += groups_data.len();
        let set = GroupSet::from_parts(Arc::clone(&dataset), length, groups_data)?;
        sets.insert(length, set);
    }

    let space = GroupSpace::from_parts(dataset, &metric_name, threshold, Config::default(), sets)?;
    tracing::debug!(path = %path.display(), groups = total, "loaded groups");
    Ok((space, total))
}

struct Tokens<'t> {
    inner: std::str::SplitWhitespace<'t>,
}

impl<'t> Tokens<'t> {
    fn new(text: &'t str) -> Self {
        Tokens { inner: text.split_whitespace() }
    }

    fn next_str(&mut self) -> Result<&'t str> {
        self.inner.next().ok_or_else(|| Error::invalid_state("group file ended unexpectedly"))
    }

    fn next_usize(&mut self) -> Result<usize> {
        self.next_str()?.parse().map_err(|_| Error::invalid_state("expected an integer in group file"))
    }

    fn next_f64(&mut self) -> Result<f64> {
        self.next_str()?.parse().map_err(|_| Error::invalid_state("expected a number in group file"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsindex_core::TimeSeries;

    fn dataset() -> Arc<Dataset> {
        Arc::new(Dataset::new(3, 4, vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.2, 9.0, 9.0, 9.0, 9.0]).unwrap())
    }

    #[test]
    fn save_then_load_round_trips_coordinates_and_centroids() {
        let d = dataset();
        let (space, _) = GroupSpace::group(Arc::clone(&d), "euclidean", 0.5, 1, Config::new(1.0)).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        save_groups(&space, &d, file.path(), false).unwrap();

        let (loaded, count) = load_groups(Arc::clone(&d), file.path()).unwrap();
        assert_eq!(loaded.metric_name(), "euclidean");
        assert_eq!(loaded.threshold(), 0.5);

        let mut original_total = 0;
        for length in space.lengths() {
            original_total += space.group_set(length).unwrap().groups().len();
        }
        assert_eq!(count, original_total);

        for length in space.lengths() {
            let a = space.group_set(length).unwrap();
            let b = loaded.group_set(length).unwrap();
            assert_eq!(a.groups().len(), b.groups().len());
            for gid in 0..a.groups().len() {
                assert_eq!(a.groups()[gid].centroid, b.groups()[gid].centroid);
                let mut coords_a = a.member_coords(gid);
                let mut coords_b = b.member_coords(gid);
                coords_a.sort();
                coords_b.sort();
                assert_eq!(coords_a, coords_b);
            }
        }

        let query = TimeSeries::new(Arc::clone(&d), 2, 0, 4).unwrap();
        let best = loaded.best_match(&query).unwrap().unwrap();
        assert_eq!(best.row, 2);
    }

    #[test]
    fn size_only_omits_member_coordinates() {
        let d = dataset();
        let (space, _) = GroupSpace::group(Arc::clone(&d), "euclidean", 0.5, 1, Config::new(1.0)).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        save_groups(&space, &d, file.path(), true).unwrap();

        let (loaded, _) = load_groups(Arc::clone(&d), file.path()).unwrap();
        for length in loaded.lengths() {
            let set = loaded.group_set(length).unwrap();
            for gid in 0..set.groups().len() {
                assert!(set.member_coords(gid).is_empty());
            }
        }
    }

    #[test]
    fn load_rejects_mismatched_dataset_shape() {
        let d = dataset();
        let (space, _) = GroupSpace::group(Arc::clone(&d), "euclidean", 0.5, 1, Config::new(1.0)).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        save_groups(&space, &d, file.path(), false).unwrap();

        let other = Arc::new(Dataset::new(2, 4, vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]).unwrap());
        assert!(load_groups(other, file.path()).is_err());
    }
}
