//! The integer-handle façade over `tsindex-core`: tracks every loaded
//! dataset, its optional grouping, and a shared warping-band ratio,
//! mirroring `KOnexAPI`'s `loadedDatasets` vector indexed by handle.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tsindex_core::{Candidate, Config, Dataset, GroupSpace, TimeSeries};

use crate::loader;
use crate::persist;

/// Snapshot of one loaded dataset's shape and grouping state.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub cols: usize,
    pub grouped: bool,
    pub group_count: Option<usize>,
    pub metric_name: Option<String>,
    pub threshold: Option<f64>,
}

struct LoadedDataset {
    dataset: Arc<Dataset>,
    group_space: Option<GroupSpace>,
    group_count: Option<usize>,
}

/// Tracks every dataset loaded this session by an opaque integer handle.
pub struct Session {
    datasets: HashMap<u32, LoadedDataset>,
    next_handle: u32,
    config: Config,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            datasets: HashMap::new(),
            next_handle: 0,
            config: Config::default(),
        }
    }

    fn entry(&self, handle: u32) -> Result<&LoadedDataset> {
        self.datasets.get(&handle).ok_or_else(|| anyhow!("no dataset loaded under handle {handle}"))
    }

    fn entry_mut(&mut self, handle: u32) -> Result<&mut LoadedDataset> {
        self.datasets.get_mut(&handle).ok_or_else(|| anyhow!("no dataset loaded under handle {handle}"))
    }

    /// Loads a whitespace/separator-delimited text file as a new dataset
    /// and returns its handle. `max_rows <= 0` means unlimited.
    pub fn load_dataset(&mut self, path: &Path, max_rows: i64, start_col: usize, separators: &str) -> Result<u32> {
        let dataset = loader::load_dataset(path, max_rows, start_col, separators).with_context(|| format!("loading dataset from {}", path.display()))?;
        let handle = self.next_handle;
        self.next_handle += 1;
        self.datasets.insert(
            handle,
            LoadedDataset {
                dataset: Arc::new(dataset),
                group_space: None,
                group_count: None,
            },
        );
        tracing::info!(handle, "loaded dataset");
        Ok(handle)
    }

    pub fn unload_dataset(&mut self, handle: u32) -> Result<()> {
        self.datasets.remove(&handle).ok_or_else(|| anyhow!("no dataset loaded under handle {handle}"))?;
        tracing::info!(handle, "unloaded dataset");
        Ok(())
    }

    pub fn dataset_info(&self, handle: u32) -> Result<DatasetInfo> {
        let entry = self.entry(handle)?;
        Ok(DatasetInfo {
            rows: entry.dataset.rows(),
            cols: entry.dataset.cols(),
            grouped: entry.group_space.is_some(),
            group_count: entry.group_count,
            metric_name: entry.group_space.as_ref().map(|g| g.metric_name().to_string()),
            threshold: entry.group_space.as_ref().map(|g| g.threshold()),
        })
    }

    /// Min-max normalizes `handle`'s dataset in place and returns `(min,
    /// max)`. Invalidates any existing grouping, since group centroids
    /// were computed in the old scale.
    pub fn normalize_dataset(&mut self, handle: u32) -> Result<(f64, f64)> {
        let entry = self.entry_mut(handle)?;
        entry.group_space = None;
        entry.group_count = None;
        let dataset = Arc::get_mut(&mut entry.dataset).ok_or_else(|| anyhow!("dataset {handle} has outstanding references and cannot be normalized"))?;
        let (min, max) = dataset.normalize();
        tracing::info!(handle, min, max, "normalized dataset");
        Ok((min, max))
    }

    /// Groups `handle`'s dataset with `distance_name` and `threshold`
    /// across `threads` worker threads, replacing any existing grouping.
    pub fn group_dataset(&mut self, handle: u32, threshold: f64, distance_name: &str, threads: usize) -> Result<usize> {
        let entry = self.entry_mut(handle)?;
        let (space, count) = GroupSpace::group(Arc::clone(&entry.dataset), distance_name, threshold, threads, self.config)?;
        entry.group_space = Some(space);
        entry.group_count = Some(count);
        tracing::info!(handle, groups = count, distance_name, threshold, "grouped dataset");
        Ok(count)
    }

    pub fn save_groups(&self, handle: u32, path: &Path, size_only: bool) -> Result<()> {
        let entry = self.entry(handle)?;
        let space = entry.group_space.as_ref().ok_or_else(|| anyhow!("dataset {handle} is not grouped"))?;
        persist::save_groups(space, &entry.dataset, path, size_only).with_context(|| format!("saving groups to {}", path.display()))?;
        Ok(())
    }

    pub fn load_groups(&mut self, handle: u32, path: &Path) -> Result<usize> {
        let entry = self.entry_mut(handle)?;
        let (space, count) = persist::load_groups(Arc::clone(&entry.dataset), path).with_context(|| format!("loading groups from {}", path.display()))?;
        entry.group_space = Some(space);
        entry.group_count = Some(count);
        Ok(count)
    }

    /// Sets the warping-band ratio applied to every subsequent grouping and
    /// query, and updates every already-grouped dataset's space in place.
    pub fn set_warping_band_ratio(&mut self, ratio: f64) {
        self.config = Config::new(ratio);
        for entry in self.datasets.values_mut() {
            if let Some(space) = &mut entry.group_space {
                space.set_warping_band_ratio(ratio);
            }
        }
    }

    fn query_view(&self, query_handle: u32, row: usize, start: Option<usize>, end: Option<usize>) -> Result<TimeSeries> {
        let entry = self.entry(query_handle)?;
        let cols = entry.dataset.cols();
        let (s, e) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            (None, None) => (0, cols),
            _ => bail!("start and end must be given together"),
        };
        let view = TimeSeries::new(Arc::clone(&entry.dataset), row, s, e.saturating_sub(s))?;
        Ok(view)
    }

    /// Finds the closest subsequence in `result_handle`'s grouped dataset
    /// to the subsequence `[start, end)` of row `row` in `query_handle`'s
    /// dataset (the whole row if `start`/`end` are omitted).
    pub fn best_match(&self, result_handle: u32, query_handle: u32, row: usize, start: Option<usize>, end: Option<usize>) -> Result<Candidate> {
        let query = self.query_view(query_handle, row, start, end)?;
        let entry = self.entry(result_handle)?;
        let space = entry.group_space.as_ref().ok_or_else(|| anyhow!("dataset {result_handle} is not grouped"))?;
        space.best_match(&query)?.ok_or_else(|| anyhow!("no match found"))
    }

    /// Finds the `k` closest subsequences in `result_handle`'s grouped
    /// dataset to the same kind of query [`Session::best_match`] takes.
    pub fn k_nn(&self, result_handle: u32, query_handle: u32, row: usize, start: Option<usize>, end: Option<usize>, k: usize) -> Result<Vec<Candidate>> {
        let query = self.query_view(query_handle, row, start, end)?;
        let entry = self.entry(result_handle)?;
        let space = entry.group_space.as_ref().ok_or_else(|| anyhow!("dataset {result_handle} is not grouped"))?;
        Ok(space.k_nn(&query, k)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn load_group_and_query_round_trip() {
        let f = write_temp("1 1 1 1\n1 1 1 1.2\n9 9 9 9\n");
        let mut session = Session::new();
        let handle = session.load_dataset(f.path(), -1, 0, "").unwrap();

        let info = session.dataset_info(handle).unwrap();
        assert_eq!((info.rows, info.cols), (3, 4));
        assert!(!info.grouped);

        session.set_warping_band_ratio(1.0);
        let count = session.group_dataset(handle, 0.5, "euclidean", 1).unwrap();
        assert!(count >= 2);

        let best = session.best_match(handle, handle, 2, None, None).unwrap();
        assert_eq!(best.row, 2);

        let knn = session.k_nn(handle, handle, 0, None, None, 2).unwrap();
        assert!(knn.len() >= 2);
    }

    #[test]
    fn queries_on_ungrouped_dataset_fail() {
        let f = write_temp("1 2 3\n4 5 6\n");
        let mut session = Session::new();
        let handle = session.load_dataset(f.path(), -1, 0, "").unwrap();
        assert!(session.best_match(handle, handle, 0, None, None).is_err());
    }

    #[test]
    fn unload_then_use_fails() {
        let f = write_temp("1 2 3\n4 5 6\n");
        let mut session = Session::new();
        let handle = session.load_dataset(f.path(), -1, 0, "").unwrap();
        session.unload_dataset(handle).unwrap();
        assert!(session.dataset_info(handle).is_err());
    }

    #[test]
    fn normalize_invalidates_grouping() {
        let f = write_temp("1 1 1 1\n1 1 1 1.2\n9 9 9 9\n");
        let mut session = Session::new();
        let handle = session.load_dataset(f.path(), -1, 0, "").unwrap();
        session.group_dataset(handle, 0.5, "euclidean", 1).unwrap();
        session.normalize_dataset(handle).unwrap();
        assert!(!session.dataset_info(handle).unwrap().grouped);
    }
}
