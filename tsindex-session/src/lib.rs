//! The session façade: tracks multiple loaded datasets by integer handle,
//! and exposes the dataset loader, min-max normalization, group
//! persistence, and query operations on top of `tsindex-core`.

pub mod loader;
pub mod persist;
pub mod session;

pub use session::{DatasetInfo, Session};
