use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::errors::Error;
use shared::types::{InviteId, OrgId, UserId};
use sqlx::FromRow;

use crate::roles::OrgRole;

/// Invite lifecycle state. Pending is the only non-terminal state; every
/// transition out of it is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invite_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InviteState {
    Pending,
    Accepted,
    Declined,
    Revoked,
    Expired,
}

impl InviteState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InviteState::Pending)
    }

    /// Whether the state machine admits `from -> to`.
    pub fn can_transition_to(&self, to: InviteState) -> bool {
        matches!(self, InviteState::Pending) && to != InviteState::Pending
    }
}

impl std::fmt::Display for InviteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InviteState::Pending => write!(f, "pending"),
            InviteState::Accepted => write!(f, "accepted"),
            InviteState::Declined => write!(f, "declined"),
            InviteState::Revoked => write!(f, "revoked"),
            InviteState::Expired => write!(f, "expired"),
        }
    }
}

/// Which side of an invite a user listing targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteUserType {
    Invitee,
    Inviter,
}

/// A time-bounded record authorizing one user to join one org at a given
/// role.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Invite {
    pub id: InviteId,
    pub invitee_id: UserId,
    pub inviter_id: UserId,
    pub org_id: OrgId,
    pub invitee_role: OrgRole,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: InviteState,
}

impl Invite {
    /// A pending invite past its deadline, not yet reconciled to Expired.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.state == InviteState::Pending && now >= self.expires_at
    }

    /// Reconcile a stale pending row against the clock. Reads and writes
    /// apply this before acting on the row.
    pub fn swept(mut self, now: DateTime<Utc>) -> Self {
        if self.is_stale(now) {
            self.state = InviteState::Expired;
        }
        self
    }

    /// Guard for responding to or revoking an invite; expects the sweep to
    /// have been applied already.
    pub fn ensure_pending(&self) -> Result<(), Error> {
        match self.state {
            InviteState::Pending => Ok(()),
            InviteState::Expired => Err(Error::InviteExpired),
            _ => Err(Error::InvalidInviteState),
        }
    }
}
