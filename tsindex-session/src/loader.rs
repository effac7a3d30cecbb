//! Parses a whitespace/separator-delimited numeric text file into a dense
//! row-major [`tsindex_core::Dataset`].
//!
//! Semantics follow the original `KOnexAPI::loadDataset` contract: split
//! each line on any character in `separators` (empty means "any
//! whitespace"), discard the first `start_col` tokens, read at most
//! `max_num_row` data lines (`<= 0` means unlimited), and fail the whole
//! load on a column-count mismatch between lines.

use std::path::Path;

use tsindex_core::{Dataset, Error, Result};

/// Default separator set: any whitespace.
pub const DEFAULT_SEPARATORS: &str = "";

fn is_separator(c: char, separators: &str) -> bool {
    if separators.is_empty() {
        c.is_whitespace()
    } else {
        separators.contains(c)
    }
}

/// Loads a dataset from `path`. `max_num_row <= 0` means unlimited.
pub fn load_dataset(path: &Path, max_num_row: i64, start_col: usize, separators: &str) -> Result<Dataset> {
    let text = std::fs::read_to_string(path)?;

    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut expected_cols: Option<usize> = None;

    for line in text.lines() {
        if max_num_row > 0 && rows.len() as i64 >= max_num_row {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = trimmed
            .split(|c: char| is_separator(c, separators))
            .filter(|s| !s.is_empty())
            .collect();
        if tokens.len() <= start_col {
            return Err(Error::invalid_input(format!(
                "line has only {} tokens, fewer than start_col={start_col}",
                tokens.len()
            )));
        }

        let mut parsed = Vec::with_capacity(tokens.len() - start_col);
        for tok in &tokens[start_col..] {
            let v: f64 = tok
                .parse()
                .map_err(|_| Error::invalid_input(format!("could not parse '{tok}' as a number")))?;
            parsed.push(v);
        }

        match expected_cols {
            None => expected_cols = Some(parsed.len()),
            Some(cols) if cols != parsed.len() => {
                return Err(Error::invalid_input(format!(
                    "mismatched column count: expected {cols}, got {} on a later line",
                    parsed.len()
                )));
            }
            _ => {}
        }
        rows.push(parsed);
    }

    let cols = expected_cols.ok_or_else(|| Error::invalid_input("dataset file has no rows"))?;
    if cols == 0 {
        return Err(Error::invalid_input("dataset file's first retained row has no columns"));
    }

    let row_count = rows.len();
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    tracing::debug!(rows = row_count, cols, path = %path.display(), "loaded dataset");
    Dataset::new(row_count, cols, flat)
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
    fn loads_whitespace_delimited_rows() {
        let f = write_temp("1 2 3\n4 5 6\n");
        let d = load_dataset(f.path(), -1, 0, DEFAULT_SEPARATORS).unwrap();
        assert_eq!((d.rows(), d.cols()), (2, 3));
        assert_eq!(d.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn discards_leading_columns() {
        let f = write_temp("id1 1 2 3\nid2 4 5 6\n");
        let d = load_dataset(f.path(), -1, 1, DEFAULT_SEPARATORS).unwrap();
        assert_eq!((d.rows(), d.cols()), (2, 3));
    }

    #[test]
    fn respects_max_num_row() {
        let f = write_temp("1 2\n3 4\n5 6\n");
        let d = load_dataset(f.path(), 2, 0, DEFAULT_SEPARATORS).unwrap();
        assert_eq!(d.rows(), 2);
    }

    #[test]
    fn rejects_mismatched_column_counts() {
        let f = write_temp("1 2 3\n4 5\n");
        assert!(load_dataset(f.path(), -1, 0, DEFAULT_SEPARATORS).is_err());
    }

    #[test]
    fn rejects_empty_file() {
        let f = write_temp("");
        assert!(load_dataset(f.path(), -1, 0, DEFAULT_SEPARATORS).is_err());
    }

    #[test]
    fn custom_separators_split_on_commas() {
        let f = write_temp("1,2,3\n4,5,6\n");
        let d = load_dataset(f.path(), -1, 0, ",").unwrap();
        assert_eq!(d.row(0), &[1.0, 2.0, 3.0]);
    }
}
