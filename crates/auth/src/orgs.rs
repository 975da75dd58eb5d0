use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use domain::memberships::Membership;
use domain::orgs::{Metadata, Org};
use domain::roles::OrgRole;
use serde::Deserialize;
use shared::errors::Error;
use shared::types::{OrgId, Page, PageMetadata, UserId};
use validator::Validate;

use crate::access::Authorizer;

/// Persistence contract for orgs.
///
/// `save` covers the org row and the initial Owner membership in one
/// transaction; `restore` covers a full backup the same way.
#[async_trait]
pub trait OrgStore: Send + Sync {
    async fn save(&self, org: &Org, owner: &Membership) -> Result<(), Error>;

    /// Update name, description, metadata and `updated_at`. Owner and
    /// creation time are left untouched. Absent orgs are `NotFound`.
    async fn update(&self, org: &Org) -> Result<(), Error>;

    /// Remove the org owned by `owner_id`. Absent orgs are `NotFound`.
    /// Memberships and invites cascade at the store level.
    async fn remove(&self, owner_id: UserId, org_id: OrgId) -> Result<(), Error>;

    async fn retrieve_by_id(&self, org_id: OrgId) -> Result<Org, Error>;

    async fn retrieve_by_owner(&self, owner_id: UserId, pm: &PageMetadata)
        -> Result<Page<Org>, Error>;

    async fn retrieve_by_member(
        &self,
        member_id: UserId,
        pm: &PageMetadata,
    ) -> Result<Page<Org>, Error>;

    async fn retrieve_all(&self, pm: &PageMetadata) -> Result<Page<Org>, Error>;

    async fn backup_all(&self) -> Result<Vec<Org>, Error>;

    /// Persist a backup, orgs then memberships, in one transaction.
    /// Existing ids are a `Conflict`, never overwritten.
    async fn restore(&self, orgs: &[Org], memberships: &[Membership]) -> Result<(), Error>;
}

/// Input for creating an org.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewOrg {
    #[validate(length(min = 1, max = 254))]
    pub name: String,
    #[validate(length(max = 1024))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Partial update for an org; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct OrgUpdate {
    #[validate(length(min = 1, max = 254))]
    pub name: Option<String>,
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Org CRUD with ownership rules and admin/owner/member listings.
pub struct OrgService {
    authz: Arc<Authorizer>,
    orgs: Arc<dyn OrgStore>,
}

impl OrgService {
    pub fn new(authz: Arc<Authorizer>, orgs: Arc<dyn OrgStore>) -> Self {
        Self { authz, orgs }
    }

    /// Create an org owned by the caller, together with its Owner
    /// membership.
    pub async fn create_org(&self, token: &str, new_org: NewOrg) -> Result<Org, Error> {
        let caller = self.authz.identify(token).await?;
        new_org
            .validate()
            .map_err(|err| Error::MalformedEntity(err.to_string()))?;

        let now = Utc::now();
        let org = Org {
            id: OrgId::new(),
            owner_id: caller.id,
            name: new_org.name,
            description: new_org.description,
            metadata: sqlx::types::Json(new_org.metadata.unwrap_or_default()),
            created_at: now,
            updated_at: now,
        };
        let owner = Membership::new(caller.id, org.id, OrgRole::Owner);
        self.orgs.save(&org, &owner).await?;
        Ok(org)
    }

    /// Update an org's mutable fields. Requires at least Admin on the org.
    pub async fn update_org(
        &self,
        token: &str,
        org_id: OrgId,
        update: OrgUpdate,
    ) -> Result<Org, Error> {
        self.authz
            .can_access_org(token, org_id, OrgRole::Admin)
            .await?;
        update
            .validate()
            .map_err(|err| Error::MalformedEntity(err.to_string()))?;

        let mut org = self.orgs.retrieve_by_id(org_id).await?;
        if let Some(name) = update.name {
            org.name = name;
        }
        if let Some(description) = update.description {
            org.description = description;
        }
        if let Some(metadata) = update.metadata {
            org.metadata = sqlx::types::Json(metadata);
        }
        org.updated_at = Utc::now();
        self.orgs.update(&org).await?;
        Ok(org)
    }

    /// Remove an org. Requires Owner on the org; removing an org that is
    /// already gone is `NotFound`.
    pub async fn remove_org(&self, token: &str, org_id: OrgId) -> Result<(), Error> {
        match self
            .authz
            .can_access_org(token, org_id, OrgRole::Owner)
            .await
        {
            Ok(_) => {}
            // A denial on a vanished org reads as NotFound so a second
            // remove by the former owner reports the right thing.
            Err(Error::Authorization) => {
                self.orgs.retrieve_by_id(org_id).await?;
                return Err(Error::Authorization);
            }
            Err(err) => return Err(err),
        }
        let org = self.orgs.retrieve_by_id(org_id).await?;
        self.orgs.remove(org.owner_id, org.id).await
    }

    /// View one org. Requires at least Viewer on the org.
    pub async fn view_org(&self, token: &str, org_id: OrgId) -> Result<Org, Error> {
        self.authz
            .can_access_org(token, org_id, OrgRole::Viewer)
            .await?;
        self.orgs.retrieve_by_id(org_id).await
    }

    /// List orgs: platform admins see all of them, everyone else the orgs
    /// they own.
    pub async fn list_orgs(&self, token: &str, pm: &PageMetadata) -> Result<Page<Org>, Error> {
        let caller = self.authz.identify(token).await?;
        if self.authz.is_platform_admin(caller.id).await? {
            self.orgs.retrieve_all(pm).await
        } else {
            self.orgs.retrieve_by_owner(caller.id, pm).await
        }
    }

    /// List orgs a user is a member of. Platform admins may target anyone;
    /// everyone else only themselves.
    pub async fn list_orgs_by_member(
        &self,
        token: &str,
        member_id: UserId,
        pm: &PageMetadata,
    ) -> Result<Page<Org>, Error> {
        let caller = self.authz.identify(token).await?;
        if caller.id != member_id && !self.authz.is_platform_admin(caller.id).await? {
            return Err(Error::Authorization);
        }
        self.orgs.retrieve_by_member(member_id, pm).await
    }
}
