use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::errors::Error;
use shared::types::{Page, PageMetadata, UserId};

/// A user row from the platform directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
}

/// Client contract for the external users directory.
///
/// The directory owns user records; this core only resolves emails to ids
/// and back. A NotFound signal from the directory maps to the core's
/// `NotFound`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersDirectory: Send + Sync {
    /// Resolve emails to users. Emails without a directory entry are simply
    /// absent from the result.
    async fn users_by_emails(&self, emails: &[String]) -> Result<Vec<User>, Error>;

    /// Resolve ids to users. `pm` carries the email substring filter and
    /// sort direction; the id set is expected to be paged already, so the
    /// directory does not re-apply offset and limit.
    async fn users_by_ids(&self, ids: &[UserId], pm: &PageMetadata) -> Result<Page<User>, Error>;
}
