//! Host side of the proxy source contract: the registry that enumerates
//! source implementations, validates configuration, constructs instances
//! and dispatches fetches, plus the built-in reference sources.

use thiserror::Error;

pub mod config;
pub mod registry;
pub mod sources;

pub use registry::{SourceEntry, SourceRegistry};

#[derive(Error, Debug)]
pub enum Error {
    #[error("duplicate source id: {0}")]
    DuplicateSource(String),
    #[error("unknown source id: {0}")]
    UnknownSource(String),
    /// A source implementing neither fetch discipline; refused at
    /// registration so it can never be dispatched to.
    #[error("source {0} implements no fetch discipline")]
    NotFetchable(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Source(#[from] proxpool_sdk::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
