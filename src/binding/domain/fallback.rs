//! Static repository-to-workspace routes used when the directory has no
//! answer.

use super::{BindingDomainError, OrgId, RepositoryFullName};
use std::collections::HashMap;
use uuid::Uuid;

/// Operator-configured routes from repository to owning workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackRoutes {
    routes: HashMap<RepositoryFullName, OrgId>,
}

impl FallbackRoutes {
    /// Creates an empty route table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-separated list of `owner/repo=<workspace uuid>` pairs.
    ///
    /// Blank entries are skipped. A repository listed twice keeps its last
    /// workspace.
    ///
    /// # Errors
    ///
    /// Returns [`BindingDomainError::InvalidFallbackRoute`] for entries
    /// without `=` or with an unparsable workspace id, and
    /// [`BindingDomainError::InvalidRepository`] for malformed repositories.
    ///
    /// # Examples
    ///
    /// ```
    /// use reposync::binding::domain::{FallbackRoutes, RepositoryFullName};
    ///
    /// let routes = FallbackRoutes::parse(
    ///     "octo/widgets=7b0c1f52-3a4e-4f57-9d1c-0f5e3b7a9c21, ",
    /// )
    /// .expect("valid routes");
    /// let repo = RepositoryFullName::new("octo/widgets").expect("valid repo");
    /// assert!(routes.workspace_for(&repo).is_some());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, BindingDomainError> {
        let mut routes = HashMap::new();
        for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let (repository, org) = entry
                .split_once('=')
                .ok_or_else(|| BindingDomainError::InvalidFallbackRoute(entry.to_owned()))?;
            let org_id = Uuid::parse_str(org.trim())
                .map(OrgId::from_uuid)
                .map_err(|_| BindingDomainError::InvalidFallbackRoute(entry.to_owned()))?;
            routes.insert(RepositoryFullName::new(repository)?, org_id);
        }
        Ok(Self { routes })
    }

    /// Adds or replaces a route.
    #[must_use]
    pub fn with_route(mut self, repository: RepositoryFullName, org_id: OrgId) -> Self {
        self.routes.insert(repository, org_id);
        self
    }

    /// Returns the workspace routed for `repository`.
    #[must_use]
    pub fn workspace_for(&self, repository: &RepositoryFullName) -> Option<OrgId> {
        self.routes.get(repository).copied()
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` when no routes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
