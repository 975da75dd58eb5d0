pub mod access;
pub mod backup;
pub mod config;
pub mod directory;
pub mod email;
pub mod invites;
pub mod keys;
pub mod memberships;
pub mod orgs;
pub mod token;

#[cfg(test)]
pub(crate) mod testutil;

pub use access::{AccessRequest, Authorizer, RoleStore, ORGS_SUBJECT, ROOT_SUBJECT};
pub use backup::BackupService;
pub use config::{Config, ConfigError};
pub use directory::{User, UsersDirectory};
pub use email::InviteEmailer;
pub use invites::{InviteService, InviteStore, NewInvite};
pub use keys::{KeyStore, KeysService};
pub use memberships::{MembershipService, MembershipStore, OrgMembershipReq};
pub use orgs::{NewOrg, OrgService, OrgStore, OrgUpdate};
pub use token::{JwtTokenizer, TokenError, Tokenizer};
