//! In-memory store implementations and a wired-up service harness for the
//! unit tests. The stores mirror the Postgres semantics: uniqueness on the
//! membership primary key, one live pending invite per (org, invitee), and
//! the lazy expiry sweep on every touched invite row.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use domain::invites::{Invite, InviteState, InviteUserType};
use domain::keys::Key;
use domain::memberships::Membership;
use domain::orgs::Org;
use domain::roles::{OrgRole, PlatformRole};
use shared::errors::Error;
use shared::types::{Direction, InviteId, KeyId, OrgId, Page, PageMetadata, UserId};

use crate::access::{Authorizer, RoleStore};
use crate::backup::BackupService;
use crate::config::Config;
use crate::directory::{User, UsersDirectory};
use crate::email::InviteEmailer;
use crate::invites::{InviteService, InviteStore};
use crate::keys::{KeyStore, KeysService};
use crate::memberships::{MembershipService, MembershipStore};
use crate::orgs::{NewOrg, OrgService, OrgStore};
use crate::token::JwtTokenizer;

fn paginate<T>(mut items: Vec<T>, pm: &PageMetadata) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .drain(..)
        .skip(pm.offset as usize)
        .take(pm.limit as usize)
        .collect();
    Page::new(total, pm, items)
}

#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: Mutex<HashMap<(UserId, KeyId), Key>>,
}

impl InMemoryKeyStore {
    pub fn contains(&self, issuer_id: UserId, id: KeyId) -> bool {
        self.keys.lock().unwrap().contains_key(&(issuer_id, id))
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn save(&self, key: &Key) -> Result<KeyId, Error> {
        self.keys
            .lock()
            .unwrap()
            .insert((key.issuer_id, key.id), key.clone());
        Ok(key.id)
    }

    async fn retrieve(&self, issuer_id: UserId, id: KeyId) -> Result<Key, Error> {
        self.keys
            .lock()
            .unwrap()
            .get(&(issuer_id, id))
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn remove(&self, issuer_id: UserId, id: KeyId) -> Result<(), Error> {
        self.keys.lock().unwrap().remove(&(issuer_id, id));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRoleStore {
    roles: Mutex<HashMap<UserId, PlatformRole>>,
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn save_role(&self, user_id: UserId, role: PlatformRole) -> Result<(), Error> {
        let mut roles = self.roles.lock().unwrap();
        if roles.contains_key(&user_id) {
            return Err(Error::Conflict);
        }
        roles.insert(user_id, role);
        Ok(())
    }

    async fn retrieve_role(&self, user_id: UserId) -> Result<Option<PlatformRole>, Error> {
        Ok(self.roles.lock().unwrap().get(&user_id).copied())
    }

    async fn update_role(&self, user_id: UserId, role: PlatformRole) -> Result<(), Error> {
        match self.roles.lock().unwrap().get_mut(&user_id) {
            Some(existing) => {
                *existing = role;
                Ok(())
            }
            None => Err(Error::NotFound),
        }
    }

    async fn remove_role(&self, user_id: UserId) -> Result<(), Error> {
        self.roles.lock().unwrap().remove(&user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMembershipStore {
    rows: Mutex<HashMap<(UserId, OrgId), Membership>>,
}

impl InMemoryMembershipStore {
    fn remove_by_org(&self, org_id: OrgId) {
        self.rows.lock().unwrap().retain(|_, m| m.org_id != org_id);
    }

    fn insert_all(&self, memberships: &[Membership]) -> Result<(), Error> {
        let mut rows = self.rows.lock().unwrap();
        if memberships
            .iter()
            .any(|m| rows.contains_key(&(m.member_id, m.org_id)))
        {
            return Err(Error::Conflict);
        }
        for m in memberships {
            rows.insert((m.member_id, m.org_id), m.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn save(&self, memberships: &[Membership]) -> Result<(), Error> {
        self.insert_all(memberships)
    }

    async fn update(&self, memberships: &[Membership]) -> Result<(), Error> {
        let mut rows = self.rows.lock().unwrap();
        for m in memberships {
            let row = rows
                .get_mut(&(m.member_id, m.org_id))
                .ok_or(Error::NotFound)?;
            row.role = m.role;
            row.updated_at = m.updated_at;
        }
        Ok(())
    }

    async fn remove(&self, org_id: OrgId, member_ids: &[UserId]) -> Result<(), Error> {
        let mut rows = self.rows.lock().unwrap();
        for member_id in member_ids {
            rows.remove(&(*member_id, org_id));
        }
        Ok(())
    }

    async fn retrieve(&self, member_id: UserId, org_id: OrgId) -> Result<Option<Membership>, Error> {
        Ok(self.rows.lock().unwrap().get(&(member_id, org_id)).cloned())
    }

    async fn retrieve_role(
        &self,
        member_id: UserId,
        org_id: OrgId,
    ) -> Result<Option<OrgRole>, Error> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&(member_id, org_id))
            .map(|m| m.role))
    }

    async fn retrieve_by_org(
        &self,
        org_id: OrgId,
        pm: &PageMetadata,
    ) -> Result<Page<Membership>, Error> {
        let mut items: Vec<Membership> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.org_id == org_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            (a.created_at, a.member_id.to_string()).cmp(&(b.created_at, b.member_id.to_string()))
        });
        Ok(paginate(items, pm))
    }

    async fn backup_all(&self) -> Result<Vec<Membership>, Error> {
        let mut items: Vec<Membership> = self.rows.lock().unwrap().values().cloned().collect();
        items.sort_by_key(|m| (m.org_id.to_string(), m.member_id.to_string()));
        Ok(items)
    }

    async fn backup_by_org(&self, org_id: OrgId) -> Result<Vec<Membership>, Error> {
        Ok(self
            .backup_all()
            .await?
            .into_iter()
            .filter(|m| m.org_id == org_id)
            .collect())
    }
}

pub struct InMemoryOrgStore {
    orgs: Mutex<HashMap<OrgId, Org>>,
    memberships: Arc<InMemoryMembershipStore>,
    invites: Arc<InMemoryInviteStore>,
}

impl InMemoryOrgStore {
    pub fn new(
        memberships: Arc<InMemoryMembershipStore>,
        invites: Arc<InMemoryInviteStore>,
    ) -> Self {
        Self {
            orgs: Mutex::new(HashMap::new()),
            memberships,
            invites,
        }
    }

    fn list(&self, filter: impl Fn(&Org) -> bool, pm: &PageMetadata) -> Page<Org> {
        let needle = pm.name.as_deref().map(str::to_lowercase);
        let mut items: Vec<Org> = self
            .orgs
            .lock()
            .unwrap()
            .values()
            .filter(|org| filter(org))
            .filter(|org| match &needle {
                Some(needle) => org.name.to_lowercase().contains(needle),
                None => true,
            })
            .cloned()
            .collect();
        match pm.order.as_deref() {
            Some("name") => {
                items.sort_by(|a, b| (a.name.clone(), a.id.to_string()).cmp(&(b.name.clone(), b.id.to_string())))
            }
            _ => items.sort_by(|a, b| (a.created_at, a.id.to_string()).cmp(&(b.created_at, b.id.to_string()))),
        }
        if pm.dir == Direction::Desc {
            items.reverse();
        }
        paginate(items, pm)
    }
}

#[async_trait]
impl OrgStore for InMemoryOrgStore {
    async fn save(&self, org: &Org, owner: &Membership) -> Result<(), Error> {
        {
            let mut orgs = self.orgs.lock().unwrap();
            if orgs.contains_key(&org.id) {
                return Err(Error::Conflict);
            }
            orgs.insert(org.id, org.clone());
        }
        self.memberships.insert_all(std::slice::from_ref(owner))
    }

    async fn update(&self, org: &Org) -> Result<(), Error> {
        let mut orgs = self.orgs.lock().unwrap();
        let row = orgs.get_mut(&org.id).ok_or(Error::NotFound)?;
        row.name = org.name.clone();
        row.description = org.description.clone();
        row.metadata = org.metadata.clone();
        row.updated_at = org.updated_at;
        Ok(())
    }

    async fn remove(&self, owner_id: UserId, org_id: OrgId) -> Result<(), Error> {
        {
            let mut orgs = self.orgs.lock().unwrap();
            match orgs.get(&org_id) {
                Some(org) if org.owner_id == owner_id => {
                    orgs.remove(&org_id);
                }
                _ => return Err(Error::NotFound),
            }
        }
        self.memberships.remove_by_org(org_id);
        self.invites.remove_by_org(org_id);
        Ok(())
    }

    async fn retrieve_by_id(&self, org_id: OrgId) -> Result<Org, Error> {
        self.orgs
            .lock()
            .unwrap()
            .get(&org_id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn retrieve_by_owner(
        &self,
        owner_id: UserId,
        pm: &PageMetadata,
    ) -> Result<Page<Org>, Error> {
        Ok(self.list(|org| org.owner_id == owner_id, pm))
    }

    async fn retrieve_by_member(
        &self,
        member_id: UserId,
        pm: &PageMetadata,
    ) -> Result<Page<Org>, Error> {
        let org_ids: Vec<OrgId> = {
            let rows = self.memberships.rows.lock().unwrap();
            rows.values()
                .filter(|m| m.member_id == member_id)
                .map(|m| m.org_id)
                .collect()
        };
        Ok(self.list(|org| org_ids.contains(&org.id), pm))
    }

    async fn retrieve_all(&self, pm: &PageMetadata) -> Result<Page<Org>, Error> {
        Ok(self.list(|_| true, pm))
    }

    async fn backup_all(&self) -> Result<Vec<Org>, Error> {
        let mut items: Vec<Org> = self.orgs.lock().unwrap().values().cloned().collect();
        items.sort_by_key(|org| org.id.to_string());
        Ok(items)
    }

    async fn restore(&self, orgs: &[Org], memberships: &[Membership]) -> Result<(), Error> {
        {
            let existing = self.orgs.lock().unwrap();
            if orgs.iter().any(|org| existing.contains_key(&org.id)) {
                return Err(Error::Conflict);
            }
        }
        {
            let rows = self.memberships.rows.lock().unwrap();
            if memberships
                .iter()
                .any(|m| rows.contains_key(&(m.member_id, m.org_id)))
            {
                return Err(Error::Conflict);
            }
        }
        let mut store = self.orgs.lock().unwrap();
        for org in orgs {
            store.insert(org.id, org.clone());
        }
        drop(store);
        self.memberships.insert_all(memberships)
    }
}

#[derive(Default)]
pub struct InMemoryInviteStore {
    rows: Mutex<HashMap<InviteId, Invite>>,
}

impl InMemoryInviteStore {
    fn remove_by_org(&self, org_id: OrgId) {
        self.rows.lock().unwrap().retain(|_, inv| inv.org_id != org_id);
    }

    /// Sweep every row matching the filter, persisting the reconciled
    /// state, and return the swept copies.
    fn sweep(&self, filter: impl Fn(&Invite) -> bool) -> Vec<Invite> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        let mut touched = Vec::new();
        for invite in rows.values_mut() {
            if filter(invite) {
                *invite = invite.clone().swept(now);
                touched.push(invite.clone());
            }
        }
        touched
    }

    /// Test helper: push a pending invite's deadline into the past.
    pub async fn force_expiry(&self, id: InviteId) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(invite) = rows.get_mut(&id) {
            invite.expires_at = Utc::now() - chrono::Duration::hours(1);
        }
    }
}

#[async_trait]
impl InviteStore for InMemoryInviteStore {
    async fn save(&self, invite: &Invite) -> Result<(), Error> {
        let live_pending = self
            .sweep(|inv| inv.org_id == invite.org_id && inv.invitee_id == invite.invitee_id)
            .into_iter()
            .any(|inv| inv.state == InviteState::Pending);
        if live_pending {
            return Err(Error::Conflict);
        }
        self.rows.lock().unwrap().insert(invite.id, invite.clone());
        Ok(())
    }

    async fn retrieve_by_id(&self, id: InviteId) -> Result<Invite, Error> {
        self.sweep(|inv| inv.id == id)
            .into_iter()
            .next()
            .ok_or(Error::NotFound)
    }

    async fn remove(&self, id: InviteId) -> Result<(), Error> {
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn retrieve_pending(
        &self,
        org_id: OrgId,
        invitee_id: UserId,
    ) -> Result<Option<Invite>, Error> {
        Ok(self
            .sweep(|inv| inv.org_id == org_id && inv.invitee_id == invitee_id)
            .into_iter()
            .find(|inv| inv.state == InviteState::Pending))
    }

    async fn retrieve_by_org(
        &self,
        org_id: OrgId,
        pm: &PageMetadata,
    ) -> Result<Page<Invite>, Error> {
        let mut items = self.sweep(|inv| inv.org_id == org_id);
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(items, pm))
    }

    async fn retrieve_by_user(
        &self,
        user_type: InviteUserType,
        user_id: UserId,
        pm: &PageMetadata,
    ) -> Result<Page<Invite>, Error> {
        let mut items = self.sweep(|inv| match user_type {
            InviteUserType::Invitee => inv.invitee_id == user_id,
            InviteUserType::Inviter => inv.inviter_id == user_id,
        });
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(items, pm))
    }

    async fn update_state(&self, id: InviteId, state: InviteState) -> Result<(), Error> {
        let swept = self
            .sweep(|inv| inv.id == id)
            .into_iter()
            .next()
            .ok_or(Error::NotFound)?;
        if !swept.state.can_transition_to(state) {
            return Err(Error::InvalidInviteState);
        }
        self.rows
            .lock()
            .unwrap()
            .get_mut(&id)
            .ok_or(Error::NotFound)?
            .state = state;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    users: Mutex<Vec<User>>,
}

impl InMemoryDirectory {
    pub fn register(&self, email: &str) -> UserId {
        let id = UserId::new();
        self.users.lock().unwrap().push(User {
            id,
            email: email.to_string(),
        });
        id
    }

    pub fn email_of(&self, id: UserId) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.email.clone())
    }
}

#[async_trait]
impl UsersDirectory for InMemoryDirectory {
    async fn users_by_emails(&self, emails: &[String]) -> Result<Vec<User>, Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| emails.contains(&u.email))
            .cloned()
            .collect())
    }

    async fn users_by_ids(&self, ids: &[UserId], pm: &PageMetadata) -> Result<Page<User>, Error> {
        let needle = pm.name.as_deref().map(str::to_lowercase);
        let mut items: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| ids.contains(&u.id))
            .filter(|u| match &needle {
                Some(needle) => u.email.to_lowercase().contains(needle),
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| (a.email.clone(), a.id.to_string()).cmp(&(b.email.clone(), b.id.to_string())));
        if pm.dir == Direction::Desc {
            items.reverse();
        }
        let total = items.len() as u64;
        Ok(Page::new(total, pm, items))
    }
}

/// What a [`RecordingEmailer`] saw go out.
#[derive(Debug, Clone)]
pub struct SentInvite {
    pub to: Vec<String>,
    pub invite: Invite,
    pub org_name: String,
    pub redirect_path: String,
}

/// Emailer double that records every send on a channel, so tests can await
/// the detached dispatch deterministically.
pub struct RecordingEmailer {
    tx: tokio::sync::mpsc::UnboundedSender<SentInvite>,
    rx: tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<SentInvite>>,
}

impl Default for RecordingEmailer {
    fn default() -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }
}

impl RecordingEmailer {
    pub async fn next_sent(&self) -> SentInvite {
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            self.rx.lock().await.recv().await
        })
        .await
        .expect("timed out waiting for invite email")
        .expect("emailer channel closed")
    }
}

#[async_trait]
impl InviteEmailer for RecordingEmailer {
    async fn send_org_invite(
        &self,
        to: &[String],
        invite: &Invite,
        org_name: &str,
        redirect_path: &str,
    ) -> Result<(), Error> {
        let _ = self.tx.send(SentInvite {
            to: to.to_vec(),
            invite: invite.clone(),
            org_name: org_name.to_string(),
            redirect_path: redirect_path.to_string(),
        });
        Ok(())
    }
}

/// Every service wired over the in-memory stores.
pub struct Harness {
    pub keys: Arc<InMemoryKeyStore>,
    pub roles: Arc<InMemoryRoleStore>,
    pub memberships: Arc<InMemoryMembershipStore>,
    pub orgs: Arc<InMemoryOrgStore>,
    pub invites: Arc<InMemoryInviteStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub emailer: Arc<RecordingEmailer>,
    pub keys_svc: Arc<KeysService>,
    pub authz: Arc<Authorizer>,
    pub org_svc: OrgService,
    pub membership_svc: MembershipService,
    pub invite_svc: InviteService,
    pub backup_svc: BackupService,
}

impl Harness {
    pub fn new() -> Self {
        let config = Config::for_tests();
        let keys = Arc::new(InMemoryKeyStore::default());
        let roles = Arc::new(InMemoryRoleStore::default());
        let memberships = Arc::new(InMemoryMembershipStore::default());
        let invites = Arc::new(InMemoryInviteStore::default());
        let orgs = Arc::new(InMemoryOrgStore::new(memberships.clone(), invites.clone()));
        let directory = Arc::new(InMemoryDirectory::default());
        let emailer = Arc::new(RecordingEmailer::default());

        let tokenizer = Arc::new(JwtTokenizer::new(&config.token_secret));
        let keys_svc = Arc::new(KeysService::new(tokenizer, keys.clone(), &config));
        let authz = Arc::new(Authorizer::new(
            keys_svc.clone(),
            roles.clone(),
            memberships.clone(),
        ));

        let org_svc = OrgService::new(authz.clone(), orgs.clone());
        let membership_svc =
            MembershipService::new(authz.clone(), memberships.clone(), directory.clone());
        let invite_svc = InviteService::new(
            authz.clone(),
            invites.clone(),
            memberships.clone(),
            orgs.clone(),
            directory.clone(),
            emailer.clone(),
            config.invite_duration,
        );
        let backup_svc = BackupService::new(authz.clone(), orgs.clone(), memberships.clone());

        Self {
            keys,
            roles,
            memberships,
            orgs,
            invites,
            directory,
            emailer,
            keys_svc,
            authz,
            org_svc,
            membership_svc,
            invite_svc,
            backup_svc,
        }
    }

    /// Register a directory user and mint a Login token for them.
    pub async fn seed_user(&self, email: &str) -> (UserId, String) {
        let id = self.directory.register(email);
        let key = crate::keys::login_key(id, email, Utc::now());
        let (_, token) = self.keys_svc.issue("", key).await.unwrap();
        (id, token)
    }

    /// Create an org owned by a fresh user; returns the org and the owner's
    /// token.
    pub async fn seed_org(&self, name: &str) -> (Org, String) {
        let (_, token) = self.seed_user(&format!("{name}-owner@example.com")).await;
        let org = self
            .org_svc
            .create_org(
                &token,
                NewOrg {
                    name: name.to_string(),
                    ..NewOrg::default()
                },
            )
            .await
            .unwrap();
        (org, token)
    }

    /// Register a fresh user and add them to the org at the given role.
    pub async fn seed_member(&self, org: &Org, role: OrgRole, email: &str) -> (UserId, String) {
        let (id, token) = self.seed_user(email).await;
        self.memberships
            .save(&[Membership::new(id, org.id, role)])
            .await
            .unwrap();
        (id, token)
    }

    pub async fn owner_email(&self, org: &Org) -> String {
        self.directory
            .email_of(org.owner_id)
            .expect("org owner not in directory")
    }
}
