pub mod directory;
pub mod email;

pub use directory::HttpUsersDirectory;
pub use email::{EmailConfig, SmtpInviteEmailer};
