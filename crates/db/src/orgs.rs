use async_trait::async_trait;
use auth::orgs::OrgStore;
use domain::memberships::Membership;
use domain::orgs::Org;
use shared::errors::Error;
use shared::types::{OrgId, Page, PageMetadata, UserId};
use sqlx::PgPool;

use crate::{create_err, remove_err, retrieve_err, update_err};

const ORG_COLUMNS: &str = "id, owner_id, name, description, metadata, created_at, updated_at";

/// Postgres-backed store for orgs. Creation and restore cover their
/// membership rows in the same transaction.
pub struct PostgresOrgStore {
    pool: PgPool,
}

impl PostgresOrgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list(
        &self,
        where_sql: &str,
        scope: Option<UserId>,
        pm: &PageMetadata,
    ) -> Result<Page<Org>, Error> {
        let pattern = pm.name.as_ref().map(|n| format!("%{n}%"));
        let column = match pm.order.as_deref() {
            Some("name") => "name",
            _ => "created_at",
        };
        let dir = pm.dir.as_sql();

        let sql = format!(
            r#"
            SELECT {ORG_COLUMNS}
            FROM orgs
            WHERE {where_sql} AND ($2::text IS NULL OR name ILIKE $2)
            ORDER BY {column} {dir}, id {dir}
            LIMIT $3 OFFSET $4
            "#
        );
        let items = sqlx::query_as::<_, Org>(&sql)
            .bind(scope)
            .bind(&pattern)
            .bind(pm.limit as i64)
            .bind(pm.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(retrieve_err)?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM orgs WHERE {where_sql} AND ($2::text IS NULL OR name ILIKE $2)"
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(scope)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(retrieve_err)?;

        Ok(Page::new(total as u64, pm, items))
    }
}

#[async_trait]
impl OrgStore for PostgresOrgStore {
    async fn save(&self, org: &Org, owner: &Membership) -> Result<(), Error> {
        let mut tx = self.pool.begin().await.map_err(create_err)?;
        sqlx::query(
            r#"
            INSERT INTO orgs (id, owner_id, name, description, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(org.id)
        .bind(org.owner_id)
        .bind(&org.name)
        .bind(&org.description)
        .bind(&org.metadata)
        .bind(org.created_at)
        .bind(org.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(create_err)?;

        sqlx::query(
            r#"
            INSERT INTO memberships (member_id, org_id, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(owner.member_id)
        .bind(owner.org_id)
        .bind(owner.role)
        .bind(owner.created_at)
        .bind(owner.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(create_err)?;

        tx.commit().await.map_err(create_err)
    }

    async fn update(&self, org: &Org) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE orgs
            SET name = $2, description = $3, metadata = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(&org.description)
        .bind(&org.metadata)
        .bind(org.updated_at)
        .execute(&self.pool)
        .await
        .map_err(update_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn remove(&self, owner_id: UserId, org_id: OrgId) -> Result<(), Error> {
        // Memberships and invites cascade through their foreign keys.
        let result = sqlx::query("DELETE FROM orgs WHERE id = $1 AND owner_id = $2")
            .bind(org_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(remove_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn retrieve_by_id(&self, org_id: OrgId) -> Result<Org, Error> {
        sqlx::query_as::<_, Org>(&format!("SELECT {ORG_COLUMNS} FROM orgs WHERE id = $1"))
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(retrieve_err)?
            .ok_or(Error::NotFound)
    }

    async fn retrieve_by_owner(
        &self,
        owner_id: UserId,
        pm: &PageMetadata,
    ) -> Result<Page<Org>, Error> {
        self.list("owner_id = $1", Some(owner_id), pm).await
    }

    async fn retrieve_by_member(
        &self,
        member_id: UserId,
        pm: &PageMetadata,
    ) -> Result<Page<Org>, Error> {
        self.list(
            "id IN (SELECT org_id FROM memberships WHERE member_id = $1)",
            Some(member_id),
            pm,
        )
        .await
    }

    async fn retrieve_all(&self, pm: &PageMetadata) -> Result<Page<Org>, Error> {
        self.list("$1::uuid IS NULL", None, pm).await
    }

    async fn backup_all(&self) -> Result<Vec<Org>, Error> {
        sqlx::query_as::<_, Org>(&format!("SELECT {ORG_COLUMNS} FROM orgs ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(retrieve_err)
    }

    async fn restore(&self, orgs: &[Org], memberships: &[Membership]) -> Result<(), Error> {
        let mut tx = self.pool.begin().await.map_err(create_err)?;
        for org in orgs {
            sqlx::query(
                r#"
                INSERT INTO orgs (id, owner_id, name, description, metadata, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(org.id)
            .bind(org.owner_id)
            .bind(&org.name)
            .bind(&org.description)
            .bind(&org.metadata)
            .bind(org.created_at)
            .bind(org.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(create_err)?;
        }
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
}
