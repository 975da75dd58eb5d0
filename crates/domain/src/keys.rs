use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{KeyId, UserId};
use sqlx::FromRow;

/// Kind of an issued key.
///
/// Login and Recovery keys live entirely inside their signed token; Api keys
/// are persisted so they can be revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "key_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Login,
    Recovery,
    Api,
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Login => write!(f, "login"),
            KeyKind::Recovery => write!(f, "recovery"),
            KeyKind::Api => write!(f, "api"),
        }
    }
}

/// A credential record. The signed, transportable form is the token.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Key {
    pub id: KeyId,
    pub kind: KeyKind,
    pub issuer_id: UserId,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Key {
    /// An Api key without an expiry never expires; every other key with a
    /// missing expiry is treated as already past it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.kind, self.expires_at) {
            (KeyKind::Api, None) => false,
            (_, None) => true,
            (_, Some(expires_at)) => now >= expires_at,
        }
    }
}

/// The principal derived from a validated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
}
