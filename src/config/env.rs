// src/config/env.rs
use std::fmt;

use crate::error::ConfigError;

pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const AI_API_KEY: &str = "AI_API_KEY";
pub const SMTP_SERVER: &str = "SMTP_SERVER";
pub const SMTP_PORT: &str = "SMTP_PORT";
pub const EMAIL_FROM: &str = "EMAIL_FROM";
pub const EMAIL_TO: &str = "EMAIL_TO";
pub const EMAIL_PASSWORD: &str = "EMAIL_PASSWORD";

/// Everything needed to submit mail over SMTP with STARTTLS.
#[derive(Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub from: String,
    pub to: String,
    pub password: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials and channel settings read once at startup.
#[derive(Clone)]
pub struct MonitorEnv {
    pub telegram_token: String,
    pub telegram_chat_id: String,
    pub ai_api_key: String,
    /// `None` disables the email channel.
    pub email: Option<EmailConfig>,
}

impl fmt::Debug for MonitorEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorEnv")
            .field("telegram_token", &"<redacted>")
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("ai_api_key", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

impl MonitorEnv {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MonitorEnv::from_env`] over an arbitrary key lookup.
    /// Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let telegram_token = get(TELEGRAM_BOT_TOKEN);
        let telegram_chat_id = get(TELEGRAM_CHAT_ID);
        let ai_api_key = get(AI_API_KEY);

        let missing: Vec<&'static str> = [
            (TELEGRAM_BOT_TOKEN, telegram_token.is_none()),
            (TELEGRAM_CHAT_ID, telegram_chat_id.is_none()),
            (AI_API_KEY, ai_api_key.is_none()),
        ]
        .into_iter()
        .filter_map(|(k, absent)| absent.then_some(k))
        .collect();

        let (Some(telegram_token), Some(telegram_chat_id), Some(ai_api_key)) =
            (telegram_token, telegram_chat_id, ai_api_key)
        else {
            return Err(ConfigError::MissingEnv(missing));
        };

        let email = match email_from(&get) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!(error = %e, "email settings incomplete; email channel disabled");
                None
            }
        };

        Ok(Self {
            telegram_token,
            telegram_chat_id,
            ai_api_key,
            email,
        })
    }

    /// Chat credentials only, for reporting a failure that happened before
    /// the full configuration could be read.
    pub fn minimal_from_env() -> Option<(String, String)> {
        minimal_from_lookup(|key| std::env::var(key).ok())
    }
}

fn minimal_from_lookup<F>(lookup: F) -> Option<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    Some((get(TELEGRAM_BOT_TOKEN)?, get(TELEGRAM_CHAT_ID)?))
}

fn email_from<F>(get: &F) -> Result<EmailConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let fields = [SMTP_SERVER, SMTP_PORT, EMAIL_FROM, EMAIL_TO, EMAIL_PASSWORD];
    let missing: Vec<&'static str> = fields
        .into_iter()
        .filter(|k| get(k).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::MissingEnv(missing));
    }

    let value = |k: &str| get(k).unwrap_or_default();
    let port_raw = value(SMTP_PORT);
    let smtp_port = port_raw
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigError::InvalidEnv {
            var: SMTP_PORT,
            message: format!("`{port_raw}` is not a TCP port"),
        })?;

    Ok(EmailConfig {
        smtp_server: value(SMTP_SERVER),
        smtp_port,
        from: value(EMAIL_FROM),
        to: value(EMAIL_TO),
        password: value(EMAIL_PASSWORD),
    })
}
