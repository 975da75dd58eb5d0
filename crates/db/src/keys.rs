use async_trait::async_trait;
use auth::keys::KeyStore;
use domain::keys::Key;
use shared::errors::Error;
use shared::types::{KeyId, UserId};
use sqlx::PgPool;

use crate::{create_err, remove_err, retrieve_err};

/// Postgres-backed store for API keys.
pub struct PostgresKeyStore {
    pool: PgPool,
}

impl PostgresKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyStore for PostgresKeyStore {
    async fn save(&self, key: &Key) -> Result<KeyId, Error> {
        sqlx::query(
            r#"
            INSERT INTO keys (id, issuer_id, kind, subject, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(key.id)
        .bind(key.issuer_id)
        .bind(key.kind)
        .bind(&key.subject)
        .bind(key.issued_at)
        .bind(key.expires_at)
        .execute(&self.pool)
        .await
        .map_err(create_err)?;
        Ok(key.id)
    }

    async fn retrieve(&self, issuer_id: UserId, id: KeyId) -> Result<Key, Error> {
        sqlx::query_as::<_, Key>(
            r#"
            SELECT id, kind, issuer_id, subject, issued_at, expires_at
            FROM keys
            WHERE issuer_id = $1 AND id = $2
            "#,
        )
        .bind(issuer_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(retrieve_err)?
        .ok_or(Error::NotFound)
    }

    async fn remove(&self, issuer_id: UserId, id: KeyId) -> Result<(), Error> {
        sqlx::query("DELETE FROM keys WHERE issuer_id = $1 AND id = $2")
            .bind(issuer_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(remove_err)?;
        Ok(())
    }
}
