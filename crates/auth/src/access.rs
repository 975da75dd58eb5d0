use std::sync::Arc;

use async_trait::async_trait;
use domain::keys::Identity;
use domain::roles::{OrgRole, PlatformRole};
use shared::errors::Error;
use shared::types::{OrgId, UserId};

use crate::directory::UsersDirectory;
use crate::keys::KeysService;
use crate::memberships::MembershipStore;

/// Authorization target selecting the platform-wide check.
pub const ROOT_SUBJECT: &str = "root";
/// Authorization target selecting the per-org check.
pub const ORGS_SUBJECT: &str = "orgs";

/// Persistence contract for platform-wide role assignments, keyed by user.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn save_role(&self, user_id: UserId, role: PlatformRole) -> Result<(), Error>;

    /// Absent assignment means no platform role.
    async fn retrieve_role(&self, user_id: UserId) -> Result<Option<PlatformRole>, Error>;

    async fn update_role(&self, user_id: UserId, role: PlatformRole) -> Result<(), Error>;

    async fn remove_role(&self, user_id: UserId) -> Result<(), Error>;
}

/// A transport-shaped access question: may `token` perform `action` on
/// `object` under `subject`?
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub token: String,
    pub subject: String,
    pub object: String,
    pub action: OrgRole,
}

/// Decides access by combining platform roles with per-org membership
/// roles.
pub struct Authorizer {
    keys: Arc<KeysService>,
    roles: Arc<dyn RoleStore>,
    memberships: Arc<dyn MembershipStore>,
}

impl Authorizer {
    pub fn new(
        keys: Arc<KeysService>,
        roles: Arc<dyn RoleStore>,
        memberships: Arc<dyn MembershipStore>,
    ) -> Self {
        Self {
            keys,
            roles,
            memberships,
        }
    }

    /// Turn a token into a principal.
    pub async fn identify(&self, token: &str) -> Result<Identity, Error> {
        self.keys.identify(token).await
    }

    /// Whether the user holds any platform role. RootAdmin and Admin are
    /// both sufficient for every platform-admin gate in the core.
    pub async fn is_platform_admin(&self, user_id: UserId) -> Result<bool, Error> {
        Ok(self.roles.retrieve_role(user_id).await?.is_some())
    }

    /// Identify the caller and require a platform role.
    pub async fn ensure_platform_admin(&self, token: &str) -> Result<Identity, Error> {
        let caller = self.identify(token).await?;
        if !self.is_platform_admin(caller.id).await? {
            return Err(Error::Authorization);
        }
        Ok(caller)
    }

    /// Answer a transport-shaped access question.
    pub async fn authorize(&self, req: &AccessRequest) -> Result<(), Error> {
        match req.subject.as_str() {
            ROOT_SUBJECT => self.ensure_platform_admin(&req.token).await.map(|_| ()),
            ORGS_SUBJECT => {
                let org_id: OrgId = req
                    .object
                    .parse()
                    .map_err(|_| Error::MalformedEntity(format!("invalid org id: {}", req.object)))?;
                self.can_access_org(&req.token, org_id, req.action)
                    .await
                    .map(|_| ())
            }
            _ => Err(Error::UnknownSubject),
        }
    }

    /// The role gate: platform admins pass outright; everyone else needs a
    /// membership role on the org dominating `required`.
    ///
    /// Returns the caller identity so services can act on it without a
    /// second identification.
    pub async fn can_access_org(
        &self,
        token: &str,
        org_id: OrgId,
        required: OrgRole,
    ) -> Result<Identity, Error> {
        let caller = self.identify(token).await?;
        if self.is_platform_admin(caller.id).await? {
            return Ok(caller);
        }
        let role = self
            .memberships
            .retrieve_role(caller.id, org_id)
            .await?
            .ok_or(Error::Authorization)?;
        if !role.dominates(required) {
            return Err(Error::Authorization);
        }
        Ok(caller)
    }

    /// Grant RootAdmin to the configured bootstrap user, resolving the
    /// email through the directory. Missing directory entries are logged
    /// and skipped so a fresh deployment without the user provisioned yet
    /// still starts.
    pub async fn ensure_root_admin(
        &self,
        directory: &dyn UsersDirectory,
        email: &str,
    ) -> Result<(), Error> {
        let users = match directory.users_by_emails(&[email.to_string()]).await {
            Ok(users) => users,
            Err(Error::NotFound) => Vec::new(),
            Err(err) => return Err(err),
        };
        let Some(user) = users.first() else {
            tracing::warn!(email, "root admin user not found in directory, skipping bootstrap");
            return Ok(());
        };
        match self.roles.retrieve_role(user.id).await? {
            Some(PlatformRole::RootAdmin) => Ok(()),
            Some(_) => self.roles.update_role(user.id, PlatformRole::RootAdmin).await,
            None => self.roles.save_role(user.id, PlatformRole::RootAdmin).await,
        }
    }
}
