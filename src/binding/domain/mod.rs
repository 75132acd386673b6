//! Domain model for repository bindings.
//!
//! Bindings connect an internal project to a remote repository and name the
//! branches whose heads the sync pipeline follows.

mod binding;
mod error;
mod fallback;
mod ids;

pub use binding::{ConflictState, RepoBinding, SyncMode, TrackedBranch};
pub use error::{BindingDomainError, ParseBindingEnumError};
pub use fallback::FallbackRoutes;
pub use ids::{BranchName, CommitSha, InstallationId, OrgId, ProjectId, RepositoryFullName};
