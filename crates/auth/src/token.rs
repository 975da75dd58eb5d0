use chrono::{DateTime, TimeZone, Utc};
use domain::keys::{Key, KeyKind};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::types::{KeyId, UserId};

/// Codec-level parse failure.
///
/// `ApiKeyExpired` carries the decoded key so the key subsystem can purge
/// the corresponding stored record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    #[error("api key expired")]
    ApiKeyExpired(Key),

    #[error("failed to authenticate credentials")]
    Invalid,
}

/// Signs keys into opaque bearer tokens and parses them back.
///
/// Pluggable: the services depend only on this contract.
pub trait Tokenizer: Send + Sync {
    fn issue(&self, key: &Key) -> Result<String, shared::Error>;
    fn parse(&self, token: &str) -> Result<Key, TokenError>;
}

/// JWT claims embedded in every issued token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    jti: String,
    iss: String,
    sub: String,
    iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    kind: KeyKind,
}

impl Claims {
    fn from_key(key: &Key) -> Self {
        Self {
            jti: key.id.to_string(),
            iss: key.issuer_id.to_string(),
            sub: key.subject.clone(),
            iat: key.issued_at.timestamp(),
            exp: key.expires_at.map(|t| t.timestamp()),
            kind: key.kind,
        }
    }

    fn into_key(self) -> Result<Key, TokenError> {
        let id: KeyId = self.jti.parse().map_err(|_| TokenError::Invalid)?;
        let issuer_id: UserId = self.iss.parse().map_err(|_| TokenError::Invalid)?;
        let issued_at = timestamp(self.iat)?;
        let expires_at = self.exp.map(timestamp).transpose()?;
        Ok(Key {
            id,
            kind: self.kind,
            issuer_id,
            subject: self.sub,
            issued_at,
            expires_at,
        })
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(secs, 0).single().ok_or(TokenError::Invalid)
}

/// Default token codec: HS256 JWT over a symmetric secret.
pub struct JwtTokenizer {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtTokenizer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl Tokenizer for JwtTokenizer {
    fn issue(&self, key: &Key) -> Result<String, shared::Error> {
        encode(&Header::default(), &Claims::from_key(key), &self.encoding)
            .map_err(shared::Error::create_entity)
    }

    fn parse(&self, token: &str) -> Result<Key, TokenError> {
        // Expiry is judged below from the embedded claims so an expired API
        // key can be told apart from a merely invalid token.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(|_| TokenError::Invalid)?;
        let key = data.claims.into_key()?;

        if key.is_expired(Utc::now()) {
            return match key.kind {
                KeyKind::Api => Err(TokenError::ApiKeyExpired(key)),
                _ => Err(TokenError::Invalid),
            };
        }

        Ok(key)
    }
}
