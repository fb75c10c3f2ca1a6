//! Contract between proxy source implementations and their host: the data
//! model, the declarative discovery metadata, and the lifecycle every
//! source is driven through.

use thiserror::Error;

pub mod metadata;
pub mod models;
pub mod source;

mod handle;

pub use handle::SourceHandle;

use crate::source::FetchMode;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed metadata or endpoint value. Raised by the contract layer
    /// before any provider code runs.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Required parameters absent from the supplied mapping. Carries every
    /// missing name so callers get the full picture in one pass.
    #[error("missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),
    /// Provider specific setup failure, after schema validation passed.
    #[error("initialization failed: {0}")]
    Initialization(String),
    #[error("source not initialized")]
    NotInitialized,
    #[error("source already initialized")]
    AlreadyInitialized,
    #[error("source disposed")]
    Disposed,
    /// Fetch discipline the source does not implement.
    #[error("source does not support {0} fetch")]
    UnsupportedMode(FetchMode),
    /// Caller requested abort. Not a provider failure.
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Provider specific fetch error, surfaced unchanged.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True for the validation family: malformed metadata or a parameter
    /// mapping that failed the declared schema.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::MissingParameters(_))
    }

    /// True for out-of-order lifecycle calls rejected by the contract
    /// layer.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Error::NotInitialized | Error::AlreadyInitialized | Error::Disposed
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
