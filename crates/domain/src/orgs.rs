use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{OrgId, UserId};
use sqlx::FromRow;

/// Free-form metadata attached to an org.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A tenant boundary grouping users and resources.
///
/// The owner is the creating user and is immutable through updates; only
/// deleting the org removes the ownership.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Org {
    pub id: OrgId,
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub metadata: sqlx::types::Json<Metadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The full cross-tenant state, as exported by backup and consumed by
/// restore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Backup {
    pub orgs: Vec<Org>,
    pub memberships: Vec<crate::memberships::Membership>,
}
