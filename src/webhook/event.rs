//! Event allow-list and prioritized field extraction from webhook payloads.
//!
//! Payload shapes differ between event types, so each field is read through
//! an ordered list of JSON paths and the first non-empty value wins. The
//! orders below are part of the contract:
//!
//! | Field          | Lookup order                                                 |
//! |----------------|--------------------------------------------------------------|
//! | installation   | `installation.id`                                            |
//! | repository     | `repository.full_name`, then `repository.owner.login` + `/` + `repository.name` |
//! | branch         | `ref`, only when it starts with `refs/heads/`                |
//! | head commit    | `after`, then `head_commit.id`                               |

use crate::binding::domain::{BranchName, CommitSha, InstallationId, RepositoryFullName};
use serde_json::Value;
use std::fmt;

/// Event types the pipeline acts on. Everything else is acknowledged and
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookEventKind {
    /// Commits pushed to a ref.
    Push,
    /// Issue opened, edited, closed, and so on.
    Issues,
    /// Comment on an issue or pull request.
    IssueComment,
    /// Pull request lifecycle change.
    PullRequest,
}

impl WebhookEventKind {
    /// Resolves an `X-GitHub-Event` header value against the allow-list.
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim() {
            "push" => Some(Self::Push),
            "issues" => Some(Self::Issues),
            "issue_comment" => Some(Self::IssueComment),
            "pull_request" => Some(Self::PullRequest),
            _ => None,
        }
    }

    /// Returns the header spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Issues => "issues",
            Self::IssueComment => "issue_comment",
            Self::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the first non-empty string found at any of `paths`, in order.
///
/// # Examples
///
/// ```
/// use reposync::webhook::first_non_empty;
/// use serde_json::json;
///
/// let payload = json!({ "after": "", "head_commit": { "id": "abc" } });
/// let found = first_non_empty(&payload, &[&["after"], &["head_commit", "id"]]);
/// assert_eq!(found, Some("abc"));
/// ```
#[must_use]
pub fn first_non_empty<'a>(payload: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    paths.iter().find_map(|path| {
        path.iter()
            .try_fold(payload, |node, segment| node.get(segment))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    })
}

/// Fields the pipeline routes on, extracted from a decoded payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFields {
    /// Installation that delivered the event.
    pub installation_id: Option<InstallationId>,
    /// Repository the event concerns.
    pub repository: Option<RepositoryFullName>,
    /// Pushed branch, for branch pushes only.
    pub branch: Option<BranchName>,
    /// Pushed head commit.
    pub head_sha: Option<CommitSha>,
}

impl EventFields {
    /// Extracts routing fields; malformed values are treated as absent.
    #[must_use]
    pub fn extract(payload: &Value) -> Self {
        Self {
            installation_id: installation_id(payload),
            repository: repository_full_name(payload),
            branch: first_non_empty(payload, &[&["ref"]]).and_then(BranchName::from_ref),
            head_sha: first_non_empty(payload, &[&["after"], &["head_commit", "id"]])
                .and_then(|sha| CommitSha::new(sha).ok()),
        }
    }

    /// Returns `true` when the push removed its branch (all-zero head).
    #[must_use]
    pub fn is_branch_deletion(&self) -> bool {
        self.head_sha.as_ref().is_some_and(CommitSha::is_null)
    }
}

fn installation_id(payload: &Value) -> Option<InstallationId> {
    payload
        .get("installation")
        .and_then(|installation| installation.get("id"))
        .and_then(Value::as_u64)
        .and_then(|id| InstallationId::new(id).ok())
}

fn repository_full_name(payload: &Value) -> Option<RepositoryFullName> {
    if let Some(full_name) = first_non_empty(payload, &[&["repository", "full_name"]]) {
        return RepositoryFullName::new(full_name).ok();
    }
    let owner = first_non_empty(payload, &[&["repository", "owner", "login"]])?;
    let name = first_non_empty(payload, &[&["repository", "name"]])?;
    RepositoryFullName::new(format!("{owner}/{name}")).ok()
}
