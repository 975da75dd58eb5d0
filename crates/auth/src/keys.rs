use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domain::keys::{Identity, Key, KeyKind};
use shared::errors::Error;
use shared::types::{KeyId, UserId};

use crate::config::Config;
use crate::token::{TokenError, Tokenizer};

/// Persistence contract for API keys. Login and Recovery keys never reach
/// the store.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn save(&self, key: &Key) -> Result<KeyId, Error>;

    /// Retrieve a key scoped to its issuer. Absent keys are `NotFound`.
    async fn retrieve(&self, issuer_id: UserId, id: KeyId) -> Result<Key, Error>;

    /// Remove a key scoped to its issuer. Removing an absent key succeeds.
    async fn remove(&self, issuer_id: UserId, id: KeyId) -> Result<(), Error>;
}

/// Issues, revokes and validates keys, and turns tokens into principals.
pub struct KeysService {
    tokenizer: Arc<dyn Tokenizer>,
    keys: Arc<dyn KeyStore>,
    login_duration: Duration,
    recovery_duration: Duration,
}

impl KeysService {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, keys: Arc<dyn KeyStore>, config: &Config) -> Self {
        Self {
            tokenizer,
            keys,
            login_duration: config.login_duration,
            recovery_duration: config.recovery_duration,
        }
    }

    /// Issue a new key and its signed token.
    ///
    /// Login and Recovery keys get a synthesized expiry and are returned
    /// without being persisted. Api keys require `caller_token` to be a
    /// valid Login token; they are persisted before signing.
    pub async fn issue(&self, caller_token: &str, key: Key) -> Result<(Key, String), Error> {
        if key.issued_at.timestamp() == 0 {
            return Err(Error::InvalidKeyIssuedAt);
        }
        match key.kind {
            KeyKind::Api => self.issue_api_key(caller_token, key).await,
            KeyKind::Login | KeyKind::Recovery => self.issue_temporary_key(key),
        }
    }

    fn issue_temporary_key(&self, mut key: Key) -> Result<(Key, String), Error> {
        let lifetime = match key.kind {
            KeyKind::Login => self.login_duration,
            _ => self.recovery_duration,
        };
        key.expires_at = Some(key.issued_at + lifetime);
        let token = self.tokenizer.issue(&key)?;
        Ok((key, token))
    }

    async fn issue_api_key(&self, caller_token: &str, mut key: Key) -> Result<(Key, String), Error> {
        let caller = self.login_key(caller_token)?;
        key.id = KeyId::new();
        key.issuer_id = caller.issuer_id;
        if key.subject.is_empty() {
            key.subject = caller.subject;
        }
        self.keys.save(&key).await?;
        let token = self.tokenizer.issue(&key)?;
        Ok((key, token))
    }

    /// Revoke an API key owned by the caller. Succeeds whether or not the
    /// key is still present.
    pub async fn revoke(&self, caller_token: &str, id: KeyId) -> Result<(), Error> {
        let caller = self.login_key(caller_token)?;
        self.keys.remove(caller.issuer_id, id).await
    }

    /// Retrieve an API key scoped to the caller's issuer.
    pub async fn retrieve(&self, caller_token: &str, id: KeyId) -> Result<Key, Error> {
        let caller = self.login_key(caller_token)?;
        self.keys.retrieve(caller.issuer_id, id).await
    }

    /// Turn a token into a principal.
    ///
    /// For Login/Recovery tokens the embedded issuer and subject are
    /// authoritative. For Api tokens the key must still be present in the
    /// store; a revoked key authenticates as nobody.
    pub async fn identify(&self, token: &str) -> Result<Identity, Error> {
        match self.tokenizer.parse(token) {
            Ok(key) => match key.kind {
                KeyKind::Login | KeyKind::Recovery => Ok(identity_of(key)),
                KeyKind::Api => {
                    self.keys
                        .retrieve(key.issuer_id, key.id)
                        .await
                        .map_err(|err| match err {
                            Error::NotFound => Error::Authentication,
                            other => other,
                        })?;
                    Ok(identity_of(key))
                }
            },
            Err(TokenError::ApiKeyExpired(key)) => {
                // Best-effort purge of the stored record.
                if let Err(err) = self.keys.remove(key.issuer_id, key.id).await {
                    tracing::warn!(
                        key_id = %key.id,
                        error = %err,
                        "failed to purge expired api key"
                    );
                }
                Err(Error::ApiKeyExpired)
            }
            Err(TokenError::Invalid) => Err(Error::Authentication),
        }
    }

    fn login_key(&self, token: &str) -> Result<Key, Error> {
        let key = self.tokenizer.parse(token).map_err(|err| match err {
            TokenError::ApiKeyExpired(_) => Error::ApiKeyExpired,
            TokenError::Invalid => Error::Authentication,
        })?;
        if key.kind != KeyKind::Login {
            return Err(Error::Authentication);
        }
        Ok(key)
    }
}

fn identity_of(key: Key) -> Identity {
    Identity {
        id: key.issuer_id,
        email: key.subject,
    }
}

/// Build a Login key for a known principal, ready for [`KeysService::issue`].
pub fn login_key(id: UserId, email: &str, issued_at: DateTime<Utc>) -> Key {
    Key {
        id: KeyId::new(),
        kind: KeyKind::Login,
        issuer_id: id,
        subject: email.to_string(),
        issued_at,
        expires_at: None,
    }
}
