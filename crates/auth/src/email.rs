use async_trait::async_trait;
use domain::invites::Invite;
use shared::errors::Error;

/// Contract for the external invite notification agent.
///
/// Failures are logged by the caller, never surfaced to the request path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InviteEmailer: Send + Sync {
    async fn send_org_invite(
        &self,
        to: &[String],
        invite: &Invite,
        org_name: &str,
        redirect_path: &str,
    ) -> Result<(), Error>;
}
