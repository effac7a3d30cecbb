//! Similarity index for numeric time-series subsequences.
//!
//! Offline, `group` clusters every subsequence of every admissible length
//! into threshold-bounded similarity groups; online, `best_match`/`k_nn`
//! traverse those groups across lengths under Euclidean, Manhattan, or
//! Chebyshev distance, with Dynamic Time Warping as the warped path.

pub mod candidate;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod group;
pub mod group_set;
pub mod group_space;
pub mod metric;
pub mod registry;
pub mod timeseries;

pub use candidate::Candidate;
pub use config::Config;
pub use dataset::Dataset;
pub use error::{Error, Result};
pub use group::{Group, MemberSlot};
pub use group_set::{GroupSet, SelectedGroup};
pub use group_space::GroupSpace;
pub use registry::{get_distance, get_distance_dtw, DistanceFn, WarpedFn};
pub use timeseries::{Envelope, TimeSeries};
