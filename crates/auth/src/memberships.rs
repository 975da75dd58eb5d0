use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use domain::memberships::{Membership, OrgMember};
use domain::roles::OrgRole;
use serde::Deserialize;
use shared::errors::Error;
use shared::types::{OrgId, Page, PageMetadata, UserId};
use validator::Validate;

use crate::access::Authorizer;
use crate::directory::UsersDirectory;

/// Persistence contract for (member, org, role) triples.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Insert memberships. A duplicate `(member, org)` pair is a
    /// `Conflict`.
    async fn save(&self, memberships: &[Membership]) -> Result<(), Error>;

    /// Update roles, refreshing `updated_at`. Absent rows are `NotFound`.
    async fn update(&self, memberships: &[Membership]) -> Result<(), Error>;

    /// Remove the given members from an org. Absent rows are skipped.
    async fn remove(&self, org_id: OrgId, member_ids: &[UserId]) -> Result<(), Error>;

    async fn retrieve(&self, member_id: UserId, org_id: OrgId) -> Result<Option<Membership>, Error>;

    /// The member's role on the org, if any.
    async fn retrieve_role(&self, member_id: UserId, org_id: OrgId)
        -> Result<Option<OrgRole>, Error>;

    async fn retrieve_by_org(&self, org_id: OrgId, pm: &PageMetadata)
        -> Result<Page<Membership>, Error>;

    async fn backup_all(&self) -> Result<Vec<Membership>, Error>;

    async fn backup_by_org(&self, org_id: OrgId) -> Result<Vec<Membership>, Error>;
}

/// One member assignment in a create or update batch, addressed by email.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrgMembershipReq {
    #[validate(email)]
    pub email: String,
    pub role: OrgRole,
}

/// Assign, update, remove and list org memberships behind role gates.
pub struct MembershipService {
    authz: Arc<Authorizer>,
    memberships: Arc<dyn MembershipStore>,
    directory: Arc<dyn UsersDirectory>,
}

impl MembershipService {
    pub fn new(
        authz: Arc<Authorizer>,
        memberships: Arc<dyn MembershipStore>,
        directory: Arc<dyn UsersDirectory>,
    ) -> Self {
        Self {
            authz,
            memberships,
            directory,
        }
    }

    /// Assign members to an org. Requires at least Admin on the org; every
    /// email must resolve through the directory.
    pub async fn create_org_memberships(
        &self,
        token: &str,
        org_id: OrgId,
        reqs: &[OrgMembershipReq],
    ) -> Result<(), Error> {
        self.authz
            .can_access_org(token, org_id, OrgRole::Admin)
            .await?;
        let users = self.resolve(reqs).await?;

        let memberships: Vec<Membership> = reqs
            .iter()
            .map(|req| Membership::new(users[&req.email], org_id, req.role))
            .collect();
        self.memberships
            .save(&memberships)
            .await
            .map_err(|err| match err {
                Error::Conflict => Error::OrgMembershipExists,
                other => other,
            })
    }

    /// Update member roles. Requires at least Admin on the org; the owner's
    /// role is immutable.
    pub async fn update_org_memberships(
        &self,
        token: &str,
        org_id: OrgId,
        reqs: &[OrgMembershipReq],
    ) -> Result<(), Error> {
        self.authz
            .can_access_org(token, org_id, OrgRole::Admin)
            .await?;
        let users = self.resolve(reqs).await?;

        let mut memberships = Vec::with_capacity(reqs.len());
        for req in reqs {
            let member_id = users[&req.email];
            if self.memberships.retrieve_role(member_id, org_id).await? == Some(OrgRole::Owner) {
                return Err(Error::Authorization);
            }
            let mut membership = Membership::new(member_id, org_id, req.role);
            membership.updated_at = Utc::now();
            memberships.push(membership);
        }
        self.memberships.update(&memberships).await
    }

    /// Remove members from an org. Requires at least Admin on the org; the
    /// whole batch is rejected if any target is the owner.
    pub async fn remove_org_memberships(
        &self,
        token: &str,
        org_id: OrgId,
        member_ids: &[UserId],
    ) -> Result<(), Error> {
        self.authz
            .can_access_org(token, org_id, OrgRole::Admin)
            .await?;
        for member_id in member_ids {
            if self.memberships.retrieve_role(*member_id, org_id).await? == Some(OrgRole::Owner) {
                return Err(Error::Authorization);
            }
        }
        self.memberships.remove(org_id, member_ids).await
    }

    /// List an org's members enriched with emails. Requires at least
    /// Viewer; pagination and sort are forwarded to the directory so the
    /// listing can be ordered and filtered by email.
    pub async fn list_org_memberships(
        &self,
        token: &str,
        org_id: OrgId,
        pm: &PageMetadata,
    ) -> Result<Page<OrgMember>, Error> {
        self.authz
            .can_access_org(token, org_id, OrgRole::Viewer)
            .await?;
        let page = self.memberships.retrieve_by_org(org_id, pm).await?;
        if page.items.is_empty() {
            return Ok(Page::new(page.total, pm, Vec::new()));
        }

        let ids: Vec<UserId> = page.items.iter().map(|m| m.member_id).collect();
        let users = self.directory.users_by_ids(&ids, pm).await?;

        let by_id: HashMap<UserId, Membership> =
            page.items.into_iter().map(|m| (m.member_id, m)).collect();
        let members = users
            .items
            .into_iter()
            .filter_map(|user| {
                by_id
                    .get(&user.id)
                    .cloned()
                    .map(|m| OrgMember::from_membership(m, user.email))
            })
            .collect();
        Ok(Page::new(page.total, pm, members))
    }

    /// View a single membership enriched with the member's email. Requires
    /// at least Viewer on the org.
    pub async fn view_org_membership(
        &self,
        token: &str,
        org_id: OrgId,
        member_id: UserId,
    ) -> Result<OrgMember, Error> {
        self.authz
            .can_access_org(token, org_id, OrgRole::Viewer)
            .await?;
        let membership = self
            .memberships
            .retrieve(member_id, org_id)
            .await?
            .ok_or(Error::NotFound)?;
        let users = self
            .directory
            .users_by_ids(&[member_id], &PageMetadata::default())
            .await?;
        let user = users.items.into_iter().next().ok_or(Error::NotFound)?;
        Ok(OrgMember::from_membership(membership, user.email))
    }

    /// Resolve every request email through the directory; any unknown
    /// email fails the batch with `NotFound`.
    async fn resolve(&self, reqs: &[OrgMembershipReq]) -> Result<HashMap<String, UserId>, Error> {
        for req in reqs {
            req.validate()
                .map_err(|err| Error::MalformedEntity(err.to_string()))?;
        }
        let emails: Vec<String> = reqs.iter().map(|r| r.email.clone()).collect();
        let users = self.directory.users_by_emails(&emails).await?;
        let resolved: HashMap<String, UserId> =
            users.into_iter().map(|u| (u.email, u.id)).collect();
        if emails.iter().any(|email| !resolved.contains_key(email)) {
            return Err(Error::NotFound);
        }
        Ok(resolved)
    }
}
