use crate::cid::Cid;

/// Shared error type used across all exchange crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The requested block could not be resolved within the call's lifetime.
    #[error("block not found: {0}")]
    NotFound(Cid),

    #[error("canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A `has_block` publish could not be completed.  Says nothing about
    /// the validity of the block itself.
    #[error("announcement failed: {0}")]
    AnnouncementFailed(String),

    #[error("exchange closed")]
    Closed,

    #[error("invalid cid: {0}")]
    InvalidCid(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    /// A config file could not be read or parsed.
    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors caused by the caller's scope ending (cancel or
    /// deadline) rather than by the exchange.
    pub fn is_scope_termination(&self) -> bool {
        matches!(self, Error::Canceled | Error::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
