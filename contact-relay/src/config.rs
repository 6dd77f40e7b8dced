use crate::secrets::SecretRepository;
use lettre::message::Mailbox;
use serde::Deserialize;
use std::{fmt::Display, time::Duration};

pub const RECAPTCHA_CREDENTIALS_NAME: &str = "recaptcha-credentials";
pub const SMTP_CREDENTIALS_NAME: &str = "smtp-credentials";

const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
const SMTP_URL: &str = "smtps://smtp.gmail.com";
const PORT: u16 = 3001;
const RECAPTCHA_TIMEOUT_SECS: u64 = 10;
const SMTP_TIMEOUT_SECS: u64 = 30;

/// Everything the relay reads from its environment, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    pub recaptcha_secret: String,
    pub recaptcha_verify_url: String,
    pub recaptcha_timeout: Duration,
    pub smtp_url: String,
    pub smtp_credentials: SmtpCredentials,
    pub smtp_timeout: Duration,
    /// Where notifications are delivered. This is the SMTP account's own address.
    pub operator_mailbox: Mailbox,
    /// Enables permissive CORS for a front end served from `localhost`.
    pub is_local: bool,
    pub port: u16,
}

#[derive(Deserialize)]
struct RecaptchaCredentials {
    #[serde(rename = "GOOGLE_RECAPTCHA_SECRET")]
    secret: String,
}

#[derive(Deserialize, Clone)]
pub struct SmtpCredentials {
    #[serde(rename = "EMAIL_USER")]
    pub username: String,
    #[serde(rename = "EMAIL_PASS")]
    pub password: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("recaptcha_verify_url", &self.recaptcha_verify_url)
            .field("recaptcha_timeout", &self.recaptcha_timeout)
            .field("smtp_url", &self.smtp_url)
            .field("smtp_username", &self.smtp_credentials.username)
            .field("smtp_timeout", &self.smtp_timeout)
            .field("operator_mailbox", &self.operator_mailbox)
            .field("is_local", &self.is_local)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Loads secrets from `secrets` and the remaining settings from the process environment.
    pub async fn load<SecretRepositoryT: SecretRepository + Sync>(
        secrets: &SecretRepositoryT,
    ) -> Result<Self, ConfigError> {
        let recaptcha: RecaptchaCredentials =
            secrets.get_secret(RECAPTCHA_CREDENTIALS_NAME).await?;
        let smtp_credentials: SmtpCredentials = secrets.get_secret(SMTP_CREDENTIALS_NAME).await?;
        Self::from_parts(recaptcha.secret, smtp_credentials, |name| {
            dotenvy::var(name).ok()
        })
    }

    fn from_parts(
        recaptcha_secret: String,
        smtp_credentials: SmtpCredentials,
        setting: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let operator_mailbox = smtp_credentials.username.trim().parse().map_err(|_| {
            ConfigError::InvalidSetting {
                name: "EMAIL_USER",
                reason: format!("{} is not an email address", smtp_credentials.username),
            }
        })?;
        Ok(Self {
            recaptcha_secret,
            recaptcha_verify_url: setting("RECAPTCHA_VERIFY_URL")
                .unwrap_or_else(|| RECAPTCHA_VERIFY_URL.into()),
            recaptcha_timeout: Duration::from_secs(parse_setting(
                &setting,
                "RECAPTCHA_TIMEOUT_SECS",
                RECAPTCHA_TIMEOUT_SECS,
            )?),
            smtp_url: setting("SMTP_URL").unwrap_or_else(|| SMTP_URL.into()),
            smtp_credentials,
            smtp_timeout: Duration::from_secs(parse_setting(
                &setting,
                "SMTP_TIMEOUT_SECS",
                SMTP_TIMEOUT_SECS,
            )?),
            operator_mailbox,
            is_local: setting("IS_LOCAL").as_deref() == Some("true"),
            port: parse_setting(&setting, "PORT", PORT)?,
        })
    }
}

fn parse_setting<T: std::str::FromStr>(
    setting: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    match setting(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|error| ConfigError::InvalidSetting {
                name,
                reason: format!("{value:?}: {error}"),
            }),
        None => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSecret(&'static str),
    InvalidSecret {
        name: &'static str,
        error: serde_json::Error,
    },
    SecretBackend {
        name: &'static str,
        description: String,
    },
    InvalidSetting {
        name: &'static str,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingSecret(name) => write!(f, "Missing secret {name}"),
            ConfigError::InvalidSecret { name, error } => {
                write!(f, "Unable to read secret {name}: {error}")
            }
            ConfigError::SecretBackend { name, description } => {
                write!(f, "Unable to retrieve secret {name}: {description}")
            }
            ConfigError::InvalidSetting { name, reason } => {
                write!(f, "Invalid setting {name}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
pub mod test_support {
    use super::{Config, SmtpCredentials};
    use crate::secrets::test_support::{FAKE_OPERATOR_ADDRESS, FAKE_RECAPTCHA_SECRET};
    use std::time::Duration;

    /// An address on which nothing listens.
    pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9/siteverify";

    pub fn config_for(verify_url: impl Into<String>, smtp_url: impl Into<String>) -> Config {
        Config {
            recaptcha_secret: FAKE_RECAPTCHA_SECRET.into(),
            recaptcha_verify_url: verify_url.into(),
            recaptcha_timeout: Duration::from_secs(2),
            smtp_url: smtp_url.into(),
            smtp_credentials: SmtpCredentials {
                username: FAKE_OPERATOR_ADDRESS.into(),
                password: "fake SMTP password".into(),
            },
            smtp_timeout: Duration::from_secs(2),
            operator_mailbox: format!("Operator <{FAKE_OPERATOR_ADDRESS}>").parse().unwrap(),
            is_local: false,
            port: 0,
        }
    }
}
