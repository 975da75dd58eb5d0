pub mod invites;
pub mod keys;
pub mod memberships;
pub mod orgs;
pub mod roles;

pub use invites::PostgresInviteStore;
pub use keys::PostgresKeyStore;
pub use memberships::PostgresMembershipStore;
pub use orgs::PostgresOrgStore;
pub use roles::PostgresRoleStore;

use shared::errors::Error;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a database connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Run the SQL migrations under `migrations/` at the workspace root.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// Postgres unique-violation class, surfaced as `Conflict`.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

pub(crate) fn create_err(err: sqlx::Error) -> Error {
    if is_unique_violation(&err) {
        return Error::Conflict;
    }
    tracing::error!(error = %err, "create failed");
    Error::create_entity(err)
}

pub(crate) fn retrieve_err(err: sqlx::Error) -> Error {
    tracing::error!(error = %err, "retrieve failed");
    Error::retrieve_entity(err)
}

pub(crate) fn update_err(err: sqlx::Error) -> Error {
    tracing::error!(error = %err, "update failed");
    Error::update_entity(err)
}

pub(crate) fn remove_err(err: sqlx::Error) -> Error {
    tracing::error!(error = %err, "remove failed");
    Error::remove_entity(err)
}
