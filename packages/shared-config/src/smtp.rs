//! SMTP configuration for export mail delivery

use std::str::FromStr;

use crate::{get_env_or_default, get_required_env, parse_env, ConfigError, ConfigResult};

/// Transport security for the SMTP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS
    #[default]
    StartTls,
    /// Implicit TLS (usually port 465)
    Tls,
    /// No encryption, for local relays such as MailHog
    None,
}

impl FromStr for SmtpTls {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "starttls" => Ok(Self::StartTls),
            "tls" | "ssl" => Ok(Self::Tls),
            "none" | "plain" => Ok(Self::None),
            other => Err(ConfigError::InvalidValue(
                "SMTP_TLS".to_string(),
                format!("expected starttls, tls or none, got '{}'", other),
            )),
        }
    }
}

/// SMTP relay configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname
    pub host: String,

    /// SMTP server port
    pub port: u16,

    /// Username for authentication (optional)
    pub user: Option<String>,

    /// Password for authentication (optional)
    pub password: Option<String>,

    /// Sender address used in the From header
    pub from: String,

    /// Transport security mode
    pub tls: SmtpTls,
}

impl SmtpConfig {
    /// Load SMTP configuration from environment variables
    ///
    /// `SMTP_HOST` and `SMTP_FROM` are required; everything else has a default.
    pub fn from_env() -> ConfigResult<Self> {
        let host = get_required_env("SMTP_HOST")?;
        if host.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "SMTP_HOST".to_string(),
                "host cannot be empty".to_string(),
            ));
        }

        let from = get_required_env("SMTP_FROM")?;
        if !from.contains('@') {
            return Err(ConfigError::InvalidValue(
                "SMTP_FROM".to_string(),
                format!("'{}' is not an email address", from),
            ));
        }

        Ok(Self {
            host,
            port: parse_env("SMTP_PORT", 587)?,
            user: std::env::var("SMTP_USER").ok().filter(|s| !s.is_empty()),
            password: std::env::var("SMTP_PASSWORD").ok().filter(|s| !s.is_empty()),
            from,
            tls: get_env_or_default("SMTP_TLS", "starttls").parse()?,
        })
    }

    /// Create a configuration for a local unauthenticated relay (useful for testing)
    pub fn local(host: impl Into<String>, port: u16, from: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: None,
            password: None,
            from: from.into(),
            tls: SmtpTls::None,
        }
    }

    /// Whether both username and password are configured
    pub fn has_credentials(&self) -> bool {
        self.user.is_some() && self.password.is_some()
    }
}
