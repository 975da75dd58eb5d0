use std::sync::Arc;

use domain::orgs::Backup;
use shared::errors::Error;

use crate::access::Authorizer;
use crate::memberships::MembershipStore;
use crate::orgs::OrgStore;

/// Bulk export and import of orgs and memberships across all tenants.
/// Both directions are platform-admin only; transport of the payload is the
/// caller's problem.
pub struct BackupService {
    authz: Arc<Authorizer>,
    orgs: Arc<dyn OrgStore>,
    memberships: Arc<dyn MembershipStore>,
}

impl BackupService {
    pub fn new(
        authz: Arc<Authorizer>,
        orgs: Arc<dyn OrgStore>,
        memberships: Arc<dyn MembershipStore>,
    ) -> Self {
        Self {
            authz,
            orgs,
            memberships,
        }
    }

    pub async fn backup(&self, token: &str) -> Result<Backup, Error> {
        self.authz.ensure_platform_admin(token).await?;
        Ok(Backup {
            orgs: self.orgs.backup_all().await?,
            memberships: self.memberships.backup_all().await?,
        })
    }

    /// Restore a backup. Existing ids conflict rather than being
    /// overwritten.
    pub async fn restore(&self, token: &str, backup: &Backup) -> Result<(), Error> {
        self.authz.ensure_platform_admin(token).await?;
        self.orgs
            .restore(&backup.orgs, &backup.memberships)
            .await
    }
}
