//! Command-line front end over the session API: one subcommand per
//! operation, each a standalone process invocation that loads whatever
//! datasets and group files it needs before acting.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tsindex_session::Session;

#[derive(Parser, Debug)]
#[command(author, version, about = "Time-series similarity index: group, save, and query datasets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a dataset and print its shape.
    Load(LoadArgs),
    /// Load a dataset, min-max normalize it in place, and print the
    /// observed (min, max).
    Normalize(LoadArgs),
    /// Load a dataset, group every admissible subsequence length, and
    /// save the result to a group file.
    Group {
        #[command(flatten)]
        load: LoadArgs,
        /// Distance metric: euclidean, manhattan, or chebyshev.
        #[arg(long, default_value = "euclidean")]
        metric: String,
        /// Similarity threshold: the maximum distance for a subsequence
        /// to join an existing group's centroid.
        #[arg(long)]
        threshold: f64,
        /// Worker threads used across subsequence lengths.
        #[arg(long, default_value_t = 1)]
        threads: usize,
        /// Fraction of the shorter sequence's length used as the DTW
        /// warping band.
        #[arg(long, default_value_t = 0.1)]
        warping_band_ratio: f64,
        /// Where to write the group file.
        #[arg(long)]
        output: PathBuf,
        /// Omit member coordinates from the saved file, keeping only
        /// centroids and counts.
        #[arg(long, default_value_t = false)]
        size_only: bool,
    },
    /// Re-save an already-built group file under a new path (mainly for
    /// converting between `size_only` and full member detail).
    SaveGroups {
        #[command(flatten)]
        load: LoadArgs,
        /// Existing group file to load before re-saving.
        #[arg(long)]
        groups: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = false)]
        size_only: bool,
    },
    /// Load a dataset and a group file built over it, then print the
    /// dataset's grouping summary.
    LoadGroups {
        #[command(flatten)]
        load: LoadArgs,
        #[arg(long)]
        groups: PathBuf,
    },
    /// Find the closest subsequence in a grouped dataset to a query row
    /// (or sub-range of a row) drawn from the same or another dataset.
    BestMatch(QueryArgs),
    /// Find the `k` closest subsequences in a grouped dataset to a query
    /// row (or sub-range of a row).
    Knn {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        k: usize,
    },
}

#[derive(clap::Args, Debug)]
struct LoadArgs {
    /// Path to a whitespace/separator-delimited numeric text file.
    #[arg(long)]
    input: PathBuf,
    /// Maximum number of rows to read; <= 0 means unlimited.
    #[arg(long, default_value_t = -1)]
    max_rows: i64,
    /// Number of leading tokens per line to discard before the reading.
    #[arg(long, default_value_t = 0)]
    start_col: usize,
    /// Separator characters; empty means any whitespace.
    #[arg(long, default_value = "")]
    separators: String,
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Dataset to search (must already be grouped via `--groups`).
    #[command(flatten)]
    index: LoadArgs,
    /// Group file built over the indexed dataset.
    #[arg(long)]
    groups: PathBuf,
    /// Dataset the query row is drawn from. Defaults to the indexed
    /// dataset's own file when omitted.
    #[arg(long)]
    query_input: Option<PathBuf>,
    /// Row in the query dataset to search for.
    #[arg(long)]
    row: usize,
    /// Start of the query sub-range within the row. Must be given with
    /// `--end`; omit both to use the whole row.
    #[arg(long)]
    start: Option<usize>,
    #[arg(long)]
    end: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut session = Session::new();

    match cli.command {
        Command::Load(load) => {
            let handle = load_with(&mut session, &load)?;
            let info = session.dataset_info(handle)?;
            println!("rows={} cols={}", info.rows, info.cols);
        }
        Command::Normalize(load) => {
            let handle = load_with(&mut session, &load)?;
            let (min, max) = session.normalize_dataset(handle)?;
            println!("min={min} max={max}");
        }
        Command::Group {
            load,
            metric,
            threshold,
            threads,
            warping_band_ratio,
            output,
            size_only,
        } => {
            let handle = load_with(&mut session, &load)?;
            session.set_warping_band_ratio(warping_band_ratio);
            let count = session.group_dataset(handle, threshold, &metric, threads)?;
            session.save_groups(handle, &output, size_only)?;
            println!("groups={count} saved_to={}", output.display());
        }
        Command::SaveGroups {
            load,
            groups,
            output,
            size_only,
        } => {
            let handle = load_with(&mut session, &load)?;
            session.load_groups(handle, &groups)?;
            session.save_groups(handle, &output, size_only)?;
            println!("saved_to={}", output.display());
        }
        Command::LoadGroups { load, groups } => {
            let handle = load_with(&mut session, &load)?;
            let count = session.load_groups(handle, &groups)?;
            let info = session.dataset_info(handle)?;
            println!(
                "groups={count} metric={} threshold={}",
                info.metric_name.unwrap_or_default(),
                info.threshold.unwrap_or_default()
            );
        }
        Command::BestMatch(query) => {
            let (result_handle, query_handle) = load_query(&mut session, &query)?;
            let best = session.best_match(result_handle, query_handle, query.row, query.start, query.end)?;
            println!("row={} start={} length={} distance={}", best.row, best.start, best.length, best.distance);
        }
        Command::Knn { query, k } => {
            let (result_handle, query_handle) = load_query(&mut session, &query)?;
            let results = session.k_nn(result_handle, query_handle, query.row, query.start, query.end, k)?;
            for c in results {
                println!("row={} start={} length={} distance={}", c.row, c.start, c.length, c.distance);
            }
        }
    }

    Ok(())
}

fn load_with(session: &mut Session, load: &LoadArgs) -> Result<u32> {
    session.load_dataset(&load.input, load.max_rows, load.start_col, &load.separators)
}

fn load_query(session: &mut Session, query: &QueryArgs) -> Result<(u32, u32)> {
    if query.start.is_some() != query.end.is_some() {
        bail!("--start and --end must be given together");
    }
    let result_handle = load_with(session, &query.index)?;
    session.load_groups(result_handle, &query.groups)?;

    let query_handle = match &query.query_input {
        Some(path) => {
            let args = LoadArgs {
                input: path.clone(),
                max_rows: query.index.max_rows,
                start_col: query.index.start_col,
                separators: query.index.separators.clone(),
            };
            load_with(session, &args)?
        }
        None => result_handle,
    };

    Ok((result_handle, query_handle))
}
