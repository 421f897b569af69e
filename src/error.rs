//! Error types surfaced to the command line.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors produced by taskline operations
#[derive(Error, Debug)]
pub enum TasklineError {
    /// An id that does not exist in the target collection, or is not a number
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// A range like `4-2` or `1-b`
    #[error("Invalid id range: {0}")]
    InvalidIdRange(String),

    #[error("Invalid priority: {0}. Valid values are 1 (normal), 2 (medium) and 3 (high)")]
    InvalidPriority(String),

    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    #[error("No description was given")]
    MissingDescription,

    #[error("No boards were given")]
    MissingBoards,

    /// Unreadable config file, unsupported language and similar
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TasklineError {
    /// Whether the error came from user input rather than the environment
    pub fn is_user_error(&self) -> bool {
        !matches!(self, TasklineError::Config(_) | TasklineError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, TasklineError>;
