use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use domain::invites::{Invite, InviteState, InviteUserType};
use domain::memberships::Membership;
use domain::roles::OrgRole;
use serde::Deserialize;
use shared::errors::Error;
use shared::types::{InviteId, OrgId, Page, PageMetadata, UserId};
use validator::Validate;

use crate::access::Authorizer;
use crate::directory::UsersDirectory;
use crate::email::InviteEmailer;
use crate::memberships::MembershipStore;
use crate::orgs::OrgStore;

/// Persistence contract for invites.
///
/// Every read or update first reconciles touched rows that are Pending and
/// past their deadline to Expired, so callers never observe a stale
/// Pending.
#[async_trait]
pub trait InviteStore: Send + Sync {
    /// Insert an invite. A second live pending invite for the same
    /// `(org, invitee)` is a `Conflict`.
    async fn save(&self, invite: &Invite) -> Result<(), Error>;

    async fn retrieve_by_id(&self, id: InviteId) -> Result<Invite, Error>;

    /// Administrative cleanup; not reachable through the services.
    async fn remove(&self, id: InviteId) -> Result<(), Error>;

    /// The live pending invite for `(org, invitee)`, if one exists.
    async fn retrieve_pending(
        &self,
        org_id: OrgId,
        invitee_id: UserId,
    ) -> Result<Option<Invite>, Error>;

    async fn retrieve_by_org(&self, org_id: OrgId, pm: &PageMetadata)
        -> Result<Page<Invite>, Error>;

    async fn retrieve_by_user(
        &self,
        user_type: InviteUserType,
        user_id: UserId,
        pm: &PageMetadata,
    ) -> Result<Page<Invite>, Error>;

    async fn update_state(&self, id: InviteId, state: InviteState) -> Result<(), Error>;
}

/// Input for creating an invite.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewInvite {
    #[validate(email)]
    pub email: String,
    pub role: OrgRole,
    pub org_id: OrgId,
    #[serde(default)]
    pub redirect_path: String,
}

/// Create, view, respond to, revoke and list invites.
pub struct InviteService {
    authz: Arc<Authorizer>,
    invites: Arc<dyn InviteStore>,
    memberships: Arc<dyn MembershipStore>,
    orgs: Arc<dyn OrgStore>,
    directory: Arc<dyn UsersDirectory>,
    emailer: Arc<dyn InviteEmailer>,
    invite_duration: Duration,
}

impl InviteService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        authz: Arc<Authorizer>,
        invites: Arc<dyn InviteStore>,
        memberships: Arc<dyn MembershipStore>,
        orgs: Arc<dyn OrgStore>,
        directory: Arc<dyn UsersDirectory>,
        emailer: Arc<dyn InviteEmailer>,
        invite_duration: Duration,
    ) -> Self {
        Self {
            authz,
            invites,
            memberships,
            orgs,
            directory,
            emailer,
            invite_duration,
        }
    }

    /// Invite a user to an org. Requires at least Admin on the org; the
    /// invitee must resolve through the directory, must not already be a
    /// member, and must not already hold a live pending invite. The email
    /// notification goes out on a detached task so delivery latency never
    /// blocks the caller.
    pub async fn create_org_invite(&self, token: &str, req: NewInvite) -> Result<Invite, Error> {
        req.validate()
            .map_err(|err| Error::MalformedEntity(err.to_string()))?;
        if req.role == OrgRole::Owner {
            return Err(Error::MalformedEntity(
                "an org has exactly one owner".to_string(),
            ));
        }
        let caller = self
            .authz
            .can_access_org(token, req.org_id, OrgRole::Admin)
            .await?;

        let users = self
            .directory
            .users_by_emails(std::slice::from_ref(&req.email))
            .await?;
        let invitee = users.into_iter().next().ok_or(Error::NotFound)?;

        if self
            .memberships
            .retrieve_role(invitee.id, req.org_id)
            .await?
            .is_some()
        {
            return Err(Error::OrgMembershipExists);
        }
        if self
            .invites
            .retrieve_pending(req.org_id, invitee.id)
            .await?
            .is_some()
        {
            return Err(Error::UserAlreadyInvited);
        }

        let now = Utc::now();
        let invite = Invite {
            id: InviteId::new(),
            invitee_id: invitee.id,
            inviter_id: caller.id,
            org_id: req.org_id,
            invitee_role: req.role,
            created_at: now,
            expires_at: now + self.invite_duration,
            state: InviteState::Pending,
        };
        self.invites.save(&invite).await.map_err(|err| match err {
            Error::Conflict => Error::UserAlreadyInvited,
            other => other,
        })?;

        let org = self.orgs.retrieve_by_id(req.org_id).await?;
        self.dispatch_email(invite.clone(), invitee.email, org.name, req.redirect_path);
        Ok(invite)
    }

    /// Accept or decline an invite. Only the invitee may respond, and only
    /// while the invite is pending. Accepting persists the membership
    /// before the state flips, so a failed membership write leaves the
    /// invite pending.
    pub async fn respond_org_invite(
        &self,
        token: &str,
        invite_id: InviteId,
        accept: bool,
    ) -> Result<(), Error> {
        let caller = self.authz.identify(token).await?;
        let invite = self.invites.retrieve_by_id(invite_id).await?;
        invite.ensure_pending()?;
        if caller.id != invite.invitee_id {
            return Err(Error::Authorization);
        }

        if accept {
            let membership =
                Membership::new(invite.invitee_id, invite.org_id, invite.invitee_role);
            self.memberships
                .save(&[membership])
                .await
                .map_err(|err| match err {
                    Error::Conflict => Error::OrgMembershipExists,
                    other => other,
                })?;
            self.invites
                .update_state(invite_id, InviteState::Accepted)
                .await
        } else {
            self.invites
                .update_state(invite_id, InviteState::Declined)
                .await
        }
    }

    /// Revoke a pending invite. Only the inviter may revoke.
    pub async fn revoke_org_invite(&self, token: &str, invite_id: InviteId) -> Result<(), Error> {
        let caller = self.authz.identify(token).await?;
        let invite = self.invites.retrieve_by_id(invite_id).await?;
        if caller.id != invite.inviter_id {
            return Err(Error::Authorization);
        }
        invite.ensure_pending()?;
        self.invites
            .update_state(invite_id, InviteState::Revoked)
            .await
    }

    /// View one invite. Permitted for platform admins, any at-least-Admin
    /// member of the invite's org, and the invitee.
    pub async fn view_org_invite(&self, token: &str, invite_id: InviteId) -> Result<Invite, Error> {
        let caller = self.authz.identify(token).await?;
        let invite = self.invites.retrieve_by_id(invite_id).await?;

        if caller.id == invite.invitee_id || self.authz.is_platform_admin(caller.id).await? {
            return Ok(invite);
        }
        let role = self
            .memberships
            .retrieve_role(caller.id, invite.org_id)
            .await?
            .ok_or(Error::Authorization)?;
        if !role.dominates(OrgRole::Admin) {
            return Err(Error::Authorization);
        }
        Ok(invite)
    }

    /// List invites by invitee or inviter. Platform admins may target
    /// anyone; everyone else only themselves.
    pub async fn list_org_invites_by_user(
        &self,
        token: &str,
        user_type: InviteUserType,
        user_id: UserId,
        pm: &PageMetadata,
    ) -> Result<Page<Invite>, Error> {
        let caller = self.authz.identify(token).await?;
        if caller.id != user_id && !self.authz.is_platform_admin(caller.id).await? {
            return Err(Error::Authorization);
        }
        self.invites.retrieve_by_user(user_type, user_id, pm).await
    }

    /// List an org's invites. Requires at least Admin on the org.
    pub async fn list_org_invites_by_org(
        &self,
        token: &str,
        org_id: OrgId,
        pm: &PageMetadata,
    ) -> Result<Page<Invite>, Error> {
        self.authz
            .can_access_org(token, org_id, OrgRole::Admin)
            .await?;
        self.invites.retrieve_by_org(org_id, pm).await
    }

    fn dispatch_email(&self, invite: Invite, to: String, org_name: String, redirect_path: String) {
        let emailer = Arc::clone(&self.emailer);
        tokio::spawn(async move {
            if let Err(err) = emailer
                .send_org_invite(&[to], &invite, &org_name, &redirect_path)
                .await
            {
                tracing::warn!(
                    invite_id = %invite.id,
                    error = %err,
                    "failed to send org invite email"
                );
            }
        });
    }
}
