use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{OrgId, UserId};
use sqlx::FromRow;

use crate::roles::OrgRole;

/// The association between a user and an org. Primary key
/// `(member_id, org_id)`: exactly one membership per user per org.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Membership {
    pub member_id: UserId,
    pub org_id: OrgId,
    pub role: OrgRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(member_id: UserId, org_id: OrgId, role: OrgRole) -> Self {
        let now = Utc::now();
        Self {
            member_id,
            org_id,
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A membership enriched with the member's email from the directory, for
/// listing and viewing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMember {
    pub member_id: UserId,
    pub org_id: OrgId,
    pub email: String,
    pub role: OrgRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrgMember {
    pub fn from_membership(m: Membership, email: String) -> Self {
        Self {
            member_id: m.member_id,
            org_id: m.org_id,
            email,
            role: m.role,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
