use chrono::Duration;
use std::env;

/// Configuration load failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {0}: {1}")]
    Invalid(&'static str, String),
}

/// Service configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Lifetime of Login keys.
    pub login_duration: Duration,
    /// Lifetime of Recovery keys.
    pub recovery_duration: Duration,
    /// Lifetime of newly created invites.
    pub invite_duration: Duration,
    /// Symmetric secret the token codec signs with.
    pub token_secret: String,
    /// When set, this directory user is granted RootAdmin at bootstrap.
    pub root_admin_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            login_duration: duration_var("LOGIN_DURATION", "10h")?,
            recovery_duration: duration_var("RECOVERY_DURATION", "5m")?,
            invite_duration: duration_var("INVITE_DURATION", "7d")?,
            token_secret: env::var("TOKEN_SECRET")
                .map_err(|_| ConfigError::Missing("TOKEN_SECRET"))?,
            root_admin_email: env::var("ROOT_ADMIN_EMAIL").ok(),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            login_duration: Duration::hours(10),
            recovery_duration: Duration::minutes(5),
            invite_duration: Duration::days(7),
            token_secret: "test-secret".to_string(),
            root_admin_email: None,
        }
    }
}

fn duration_var(name: &'static str, default: &str) -> Result<Duration, ConfigError> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_duration(&value).map_err(|err| ConfigError::Invalid(name, err))
}

/// Parse durations like `90d`, `12h`, `30m`, `45s`, or bare seconds.
fn parse_duration(value: &str) -> Result<Duration, String> {
    if value.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(seconds) = value.parse::<i64>() {
        return Ok(Duration::seconds(seconds));
    }

    let (number, unit) = value.split_at(value.len() - 1);
    let quantity: i64 = number
        .parse()
        .map_err(|err| format!("invalid duration '{value}': {err}"))?;

    match unit {
        "d" | "D" => Ok(Duration::days(quantity)),
        "h" | "H" => Ok(Duration::hours(quantity)),
        "m" | "M" => Ok(Duration::minutes(quantity)),
        "s" | "S" => Ok(Duration::seconds(quantity)),
        _ => Err(format!(
            "invalid duration unit '{unit}': expected one of d, h, m, s"
        )),
    }
}
