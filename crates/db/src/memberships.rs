use async_trait::async_trait;
use auth::memberships::MembershipStore;
use domain::memberships::Membership;
use domain::roles::OrgRole;
use shared::errors::Error;
use shared::types::{OrgId, Page, PageMetadata, UserId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{create_err, remove_err, retrieve_err, update_err};

const MEMBERSHIP_COLUMNS: &str = "member_id, org_id, role, created_at, updated_at";

/// Postgres-backed store for (member, org, role) triples.
pub struct PostgresMembershipStore {
    pool: PgPool,
}

impl PostgresMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PostgresMembershipStore {
    async fn save(&self, memberships: &[Membership]) -> Result<(), Error> {
        let mut tx = self.pool.begin().await.map_err(create_err)?;
        for membership in memberships {
            sqlx::query(
                r#"
                INSERT INTO memberships (member_id, org_id, role, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(membership.member_id)
            .bind(membership.org_id)
            .bind(membership.role)
            .bind(membership.created_at)
            .bind(membership.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(create_err)?;
        }
        tx.commit().await.map_err(create_err)
    }

    async fn update(&self, memberships: &[Membership]) -> Result<(), Error> {
        let mut tx = self.pool.begin().await.map_err(update_err)?;
        for membership in memberships {
            let result = sqlx::query(
                r#"
                UPDATE memberships
                SET role = $3, updated_at = $4
                WHERE member_id = $1 AND org_id = $2
                "#,
            )
            .bind(membership.member_id)
            .bind(membership.org_id)
            .bind(membership.role)
            .bind(membership.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(update_err)?;
            if result.rows_affected() == 0 {
                return Err(Error::NotFound);
            }
        }
        tx.commit().await.map_err(update_err)
    }

    async fn remove(&self, org_id: OrgId, member_ids: &[UserId]) -> Result<(), Error> {
        let ids: Vec<Uuid> = member_ids.iter().map(|id| *id.as_uuid()).collect();
        sqlx::query("DELETE FROM memberships WHERE org_id = $1 AND member_id = ANY($2)")
            .bind(org_id)
            .bind(&ids)
            .execute(&self.pool)
            .await
            .map_err(remove_err)?;
        Ok(())
    }

    async fn retrieve(
        &self,
        member_id: UserId,
        org_id: OrgId,
    ) -> Result<Option<Membership>, Error> {
        sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE member_id = $1 AND org_id = $2"
        ))
        .bind(member_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(retrieve_err)
    }

    async fn retrieve_role(
        &self,
        member_id: UserId,
        org_id: OrgId,
    ) -> Result<Option<OrgRole>, Error> {
        sqlx::query_scalar::<_, OrgRole>(
            "SELECT role FROM memberships WHERE member_id = $1 AND org_id = $2",
        )
        .bind(member_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(retrieve_err)
    }

    async fn retrieve_by_org(
        &self,
        org_id: OrgId,
        pm: &PageMetadata,
    ) -> Result<Page<Membership>, Error> {
        // Email ordering happens in the directory; the store pages with a
        // stable key.
        let items = sqlx::query_as::<_, Membership>(&format!(
            r#"
            SELECT {MEMBERSHIP_COLUMNS}
            FROM memberships
            WHERE org_id = $1
            ORDER BY created_at, member_id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(org_id)
        .bind(pm.limit as i64)
        .bind(pm.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(retrieve_err)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memberships WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(&self.pool)
            .await
            .map_err(retrieve_err)?;

        Ok(Page::new(total as u64, pm, items))
    }

    async fn backup_all(&self) -> Result<Vec<Membership>, Error> {
        sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships ORDER BY org_id, member_id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(retrieve_err)
    }

    async fn backup_by_org(&self, org_id: OrgId) -> Result<Vec<Membership>, Error> {
        sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE org_id = $1 ORDER BY member_id"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(retrieve_err)
    }
}
