//! Identifier and validated scalar types for repository bindings.

use super::BindingDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length for a validated branch name.
const MAX_BRANCH_NAME_LENGTH: usize = 200;

/// Prefix carried by branch refs in push payloads.
const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Identifier of the workspace (organisation) that owns projects and jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(Uuid);

impl OrgId {
    /// Creates a new random workspace identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a workspace identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for OrgId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an internal project bound to a remote repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Creates a new random project identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a project identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Positive installation identifier assigned by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationId(u64);

impl InstallationId {
    /// Largest installation identifier representable in a `BIGINT` column.
    const MAX_PERSISTED_VALUE: u64 = i64::MAX as u64;

    /// Creates a validated installation identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BindingDomainError::InvalidInstallationId`] when the value is
    /// zero or exceeds `i64::MAX`.
    pub const fn new(value: u64) -> Result<Self, BindingDomainError> {
        if value == 0 || value > Self::MAX_PERSISTED_VALUE {
            return Err(BindingDomainError::InvalidInstallationId(value));
        }
        Ok(Self(value))
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized remote repository identifier in `owner/repo` format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryFullName(String);

impl RepositoryFullName {
    /// Creates a validated repository name.
    ///
    /// # Errors
    ///
    /// Returns [`BindingDomainError::InvalidRepository`] if the value does not
    /// contain exactly one slash-delimited owner and repository segment.
    pub fn new(value: impl Into<String>) -> Result<Self, BindingDomainError> {
        let raw = value.into();
        let normalized = raw.trim();
        let mut segments = normalized.split('/');
        let owner = segments.next().unwrap_or_default();
        let repo = segments.next().unwrap_or_default();
        let has_more_segments = segments.next().is_some();
        let is_valid = !owner.is_empty()
            && !repo.is_empty()
            && !has_more_segments
            && !normalized.chars().any(char::is_whitespace);

        if !is_valid {
            return Err(BindingDomainError::InvalidRepository(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Returns the repository name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RepositoryFullName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RepositoryFullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated Git branch name.
///
/// Branch names must be non-empty after trimming, must not contain colon
/// characters or whitespace, and must not exceed 200 characters.
///
/// # Examples
///
///     use reposync::binding::domain::BranchName;
///
///     let name = BranchName::new("feature/login").expect("valid");
///     assert_eq!(name.as_str(), "feature/login");
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Creates a validated branch name.
    ///
    /// # Errors
    ///
    /// Returns [`BindingDomainError::InvalidBranchName`] when the value is
    /// empty, contains a colon or whitespace, or exceeds the length limit.
    pub fn new(value: impl Into<String>) -> Result<Self, BindingDomainError> {
        let raw = value.into();
        let normalized = raw.trim();

        let is_invalid = normalized.is_empty()
            || normalized.contains(':')
            || normalized.chars().any(char::is_whitespace)
            || normalized.len() > MAX_BRANCH_NAME_LENGTH;
        if is_invalid {
            return Err(BindingDomainError::InvalidBranchName(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Extracts the branch name from a fully qualified `refs/heads/<branch>`
    /// ref.
    ///
    /// Returns `None` for tags, notes, and any other non-branch ref.
    #[must_use]
    pub fn from_ref(git_ref: &str) -> Option<Self> {
        git_ref
            .strip_prefix(BRANCH_REF_PREFIX)
            .and_then(|branch| Self::new(branch).ok())
    }

    /// Returns the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lower-case hexadecimal commit identifier (SHA-1 or SHA-256 object name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitSha(String);

impl CommitSha {
    /// Creates a validated commit SHA.
    ///
    /// # Errors
    ///
    /// Returns [`BindingDomainError::InvalidCommitSha`] unless the value is
    /// 40 or 64 hexadecimal characters.
    pub fn new(value: impl Into<String>) -> Result<Self, BindingDomainError> {
        let raw = value.into();
        let normalized = raw.trim().to_ascii_lowercase();
        let has_valid_length = matches!(normalized.len(), 40 | 64);
        if !has_valid_length || !normalized.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(BindingDomainError::InvalidCommitSha(raw));
        }
        Ok(Self(normalized))
    }

    /// Returns `true` for the all-zero object name used by branch deletions.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.chars().all(|ch| ch == '0')
    }

    /// Returns the SHA as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
