use async_trait::async_trait;
use auth::access::RoleStore;
use domain::roles::PlatformRole;
use shared::errors::Error;
use shared::types::UserId;
use sqlx::PgPool;

use crate::{create_err, remove_err, retrieve_err, update_err};

/// Postgres-backed store for platform-wide role assignments.
pub struct PostgresRoleStore {
    pool: PgPool,
}

impl PostgresRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for PostgresRoleStore {
    async fn save_role(&self, user_id: UserId, role: PlatformRole) -> Result<(), Error> {
        sqlx::query("INSERT INTO roles (user_id, role) VALUES ($1, $2)")
            .bind(user_id)
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(create_err)?;
        Ok(())
    }

    async fn retrieve_role(&self, user_id: UserId) -> Result<Option<PlatformRole>, Error> {
        sqlx::query_scalar::<_, PlatformRole>("SELECT role FROM roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(retrieve_err)
    }

    async fn update_role(&self, user_id: UserId, role: PlatformRole) -> Result<(), Error> {
        let result = sqlx::query("UPDATE roles SET role = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(update_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn remove_role(&self, user_id: UserId) -> Result<(), Error> {
        sqlx::query("DELETE FROM roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(remove_err)?;
        Ok(())
    }
}
