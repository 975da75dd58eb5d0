pub mod invites;
pub mod keys;
pub mod memberships;
pub mod orgs;
pub mod roles;

pub use invites::*;
pub use keys::*;
pub use memberships::*;
pub use orgs::*;
pub use roles::*;
