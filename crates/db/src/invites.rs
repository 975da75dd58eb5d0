use async_trait::async_trait;
use auth::invites::InviteStore;
use domain::invites::{Invite, InviteState, InviteUserType};
use shared::errors::Error;
use shared::types::{InviteId, OrgId, Page, PageMetadata, UserId};
use sqlx::PgPool;

use crate::{create_err, remove_err, retrieve_err, update_err};

const INVITE_COLUMNS: &str =
    "id, invitee_id, inviter_id, org_id, invitee_role, created_at, expires_at, state";

/// Postgres-backed store for invites.
///
/// Every read or update first reconciles touched rows past their deadline
/// from pending to expired, so no caller observes a stale pending invite.
pub struct PostgresInviteStore {
    pool: PgPool,
}

impl PostgresInviteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn sweep_by_id(&self, id: InviteId) {
        let result = sqlx::query(
            r#"
            UPDATE invites SET state = 'expired'
            WHERE id = $1 AND state = 'pending' AND expires_at < now()
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        if let Err(err) = result {
            tracing::warn!(invite_id = %id, error = %err, "invite expiry sweep failed");
        }
    }

    async fn sweep_by_org(&self, org_id: OrgId) {
        let result = sqlx::query(
            r#"
            UPDATE invites SET state = 'expired'
            WHERE org_id = $1 AND state = 'pending' AND expires_at < now()
            "#,
        )
        .bind(org_id)
        .execute(&self.pool)
        .await;
        if let Err(err) = result {
            tracing::warn!(org_id = %org_id, error = %err, "invite expiry sweep failed");
        }
    }

    async fn sweep_by_user(&self, column: &str, user_id: UserId) {
        let sql = format!(
            "UPDATE invites SET state = 'expired' \
             WHERE {column} = $1 AND state = 'pending' AND expires_at < now()"
        );
        if let Err(err) = sqlx::query(&sql).bind(user_id).execute(&self.pool).await {
            tracing::warn!(user_id = %user_id, error = %err, "invite expiry sweep failed");
        }
    }

    async fn sweep_by_pair(&self, org_id: OrgId, invitee_id: UserId) {
        let result = sqlx::query(
            r#"
            UPDATE invites SET state = 'expired'
            WHERE org_id = $1 AND invitee_id = $2 AND state = 'pending' AND expires_at < now()
            "#,
        )
        .bind(org_id)
        .bind(invitee_id)
        .execute(&self.pool)
        .await;
        if let Err(err) = result {
            tracing::warn!(org_id = %org_id, error = %err, "invite expiry sweep failed");
        }
    }
}

#[async_trait]
impl InviteStore for PostgresInviteStore {
    async fn save(&self, invite: &Invite) -> Result<(), Error> {
        // Expire any stale pending row first so the partial unique index
        // only rejects genuinely live duplicates.
        self.sweep_by_pair(invite.org_id, invite.invitee_id).await;
        sqlx::query(
            r#"
            INSERT INTO invites
                (id, invitee_id, inviter_id, org_id, invitee_role, created_at, expires_at, state)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invite.id)
        .bind(invite.invitee_id)
        .bind(invite.inviter_id)
        .bind(invite.org_id)
        .bind(invite.invitee_role)
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .bind(invite.state)
        .execute(&self.pool)
        .await
        .map_err(create_err)?;
        Ok(())
    }

    async fn retrieve_by_id(&self, id: InviteId) -> Result<Invite, Error> {
        self.sweep_by_id(id).await;
        sqlx::query_as::<_, Invite>(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(retrieve_err)?
        .ok_or(Error::NotFound)
    }

    async fn remove(&self, id: InviteId) -> Result<(), Error> {
        sqlx::query("DELETE FROM invites WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(remove_err)?;
        Ok(())
    }

    async fn retrieve_pending(
        &self,
        org_id: OrgId,
        invitee_id: UserId,
    ) -> Result<Option<Invite>, Error> {
        self.sweep_by_pair(org_id, invitee_id).await;
        sqlx::query_as::<_, Invite>(&format!(
            r#"
            SELECT {INVITE_COLUMNS}
            FROM invites
            WHERE org_id = $1 AND invitee_id = $2 AND state = 'pending' AND expires_at > now()
            LIMIT 1
            "#
        ))
        .bind(org_id)
        .bind(invitee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(retrieve_err)
    }

    async fn retrieve_by_org(
        &self,
        org_id: OrgId,
        pm: &PageMetadata,
    ) -> Result<Page<Invite>, Error> {
        self.sweep_by_org(org_id).await;
        let items = sqlx::query_as::<_, Invite>(&format!(
            r#"
            SELECT {INVITE_COLUMNS}
            FROM invites
            WHERE org_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(org_id)
        .bind(pm.limit as i64)
        .bind(pm.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(retrieve_err)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invites WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(&self.pool)
            .await
            .map_err(retrieve_err)?;

        Ok(Page::new(total as u64, pm, items))
    }

    async fn retrieve_by_user(
        &self,
        user_type: InviteUserType,
        user_id: UserId,
        pm: &PageMetadata,
    ) -> Result<Page<Invite>, Error> {
        let column = match user_type {
            InviteUserType::Invitee => "invitee_id",
            InviteUserType::Inviter => "inviter_id",
        };
        self.sweep_by_user(column, user_id).await;

        let items = sqlx::query_as::<_, Invite>(&format!(
            r#"
            SELECT {INVITE_COLUMNS}
            FROM invites
            WHERE {column} = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(pm.limit as i64)
        .bind(pm.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(retrieve_err)?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM invites WHERE {column} = $1"))
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(retrieve_err)?;

        Ok(Page::new(total as u64, pm, items))
    }

    async fn update_state(&self, id: InviteId, state: InviteState) -> Result<(), Error> {
        self.sweep_by_id(id).await;
        let result = sqlx::query("UPDATE invites SET state = $2 WHERE id = $1 AND state = 'pending'")
            .bind(id)
            .bind(state)
            .execute(&self.pool)
            .await
            .map_err(update_err)?;
        if result.rows_affected() == 0 {
            // Either the row is gone or it already left pending.
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM invites WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(retrieve_err)?;
            return Err(if exists {
                Error::InvalidInviteState
            } else {
                Error::NotFound
            });
        }
        Ok(())
    }
}
