//! Error types for binding domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing binding domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindingDomainError {
    /// The repository name does not follow `owner/repo` format.
    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// The branch name is empty, too long, or contains reserved characters.
    #[error("invalid branch name '{0}'")]
    InvalidBranchName(String),

    /// The commit identifier is not a hexadecimal object name.
    #[error("invalid commit sha '{0}'")]
    InvalidCommitSha(String),

    /// The installation identifier is not a positive `BIGINT`.
    #[error("invalid installation id {0}, expected a positive integer")]
    InvalidInstallationId(u64),

    /// A fallback route is not of the form `owner/repo=<workspace uuid>`.
    #[error("invalid fallback route '{0}', expected owner/repo=<uuid>")]
    InvalidFallbackRoute(String),
}

/// Error returned while parsing binding enums from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseBindingEnumError {
    /// Unknown sync mode.
    #[error("unknown sync mode: {0}")]
    SyncMode(String),
    /// Unknown conflict state.
    #[error("unknown conflict state: {0}")]
    ConflictState(String),
}
