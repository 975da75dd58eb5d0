use async_trait::async_trait;
use auth::email::InviteEmailer;
use domain::invites::Invite;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use shared::errors::Error;
use std::env;

/// Configuration for the SMTP invite emailer.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_tls: bool,
    pub from_email: String,
    pub from_name: String,
    pub app_base_url: String,
}

impl EmailConfig {
    /// Load email configuration from environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self {
            smtp_host: require("SMTP_HOST")?,
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|_| Error::MalformedEntity("SMTP_PORT must be a port".to_string()))?,
            smtp_username: require("SMTP_USERNAME")?,
            smtp_password: require("SMTP_PASSWORD")?,
            smtp_tls: env::var("SMTP_TLS").map(|v| v == "true").unwrap_or(true),
            from_email: require("SMTP_FROM_EMAIL")?,
            from_name: env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "IoT Platform".to_string()),
            app_base_url: require("APP_BASE_URL")?,
        })
    }
}

fn require(name: &str) -> Result<String, Error> {
    env::var(name).map_err(|_| Error::MalformedEntity(format!("{name} must be set")))
}

/// Email template with simple variable substitution.
struct EmailTemplate {
    content: &'static str,
}

impl EmailTemplate {
    const fn new(content: &'static str) -> Self {
        Self { content }
    }

    fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut result = self.content.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }
}

const ORG_INVITE_TEMPLATE: EmailTemplate =
    EmailTemplate::new(include_str!("../templates/emails/org_invite.txt"));

/// SMTP delivery agent for invite notifications.
pub struct SmtpInviteEmailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_mailbox: Mailbox,
    config: EmailConfig,
}

impl SmtpInviteEmailer {
    pub fn new(config: EmailConfig) -> Result<Self, Error> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let transport = if config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(Error::create_entity)?
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        };

        let from_mailbox: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|_| Error::MalformedEntity("invalid from email address".to_string()))?;

        Ok(Self {
            transport,
            from_mailbox,
            config,
        })
    }
}

#[async_trait]
impl InviteEmailer for SmtpInviteEmailer {
    async fn send_org_invite(
        &self,
        to: &[String],
        invite: &Invite,
        org_name: &str,
        redirect_path: &str,
    ) -> Result<(), Error> {
        let invite_link = format!(
            "{}{}?invite={}",
            self.config.app_base_url, redirect_path, invite.id
        );
        let body = ORG_INVITE_TEMPLATE.render(&[
            ("org_name", org_name),
            ("role", &invite.invitee_role.to_string()),
            ("invite_link", &invite_link),
            ("expires_at", &invite.expires_at.to_rfc3339()),
        ]);

        let mut builder = Message::builder()
            .from(self.from_mailbox.clone())
            .subject(format!("You have been invited to join {org_name}"));
        for recipient in to {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|_| Error::MalformedEntity("invalid recipient email".to_string()))?;
            builder = builder.to(mailbox);
        }
        let message = builder.body(body).map_err(Error::create_entity)?;

        self.transport
            .send(message)
            .await
            .map_err(Error::create_entity)?;
        Ok(())
    }
}
