//! # folio-config
//!
//! Layered settings for the portfolio server:
//!
//! 1. built-in defaults,
//! 2. `config/default.toml` (optional),
//! 3. `FOLIO_*` environment variables, `__` separating nested keys
//!    (e.g. `FOLIO_SECURITY__TOKEN_SECRET`), with `.env` loaded first,
//! 4. `PORT`, as set by most PaaS hosts.
//!
//! Credentials are kept as [`SecretString`] so they never end up in logs.

use chrono::NaiveDate;
use config::{builder::DefaultState, ConfigBuilder, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub environment: Environment,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub twitter: TwitterSettings,
    pub slack: SlackSettings,
    pub mail: MailSettings,
    pub security: SecuritySettings,
    pub profile: ProfileSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Static assets served at `/`
    pub public_dir: String,
    /// Front-end packages served at `/components`
    pub components_dir: String,
    pub static_max_age_secs: u64,
    /// Redirect bare hosts to `www.` (production only)
    pub canonical_www: bool,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: SecretString,
    pub max_connections: u32,
    /// JSON array of portfolio entries inserted at startup when missing
    pub seed_file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TwitterSettings {
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub access_token_key: SecretString,
    pub access_token_secret: SecretString,
    pub stream_url: String,
    pub search_url: String,
    /// Terms the stream is filtered on
    pub watch_symbols: Vec<String>,
    /// Statuses from this screen name are never shown
    pub ignored_account: String,
    pub search_query: String,
    pub search_count: u32,
    pub reconnect_delay_secs: u64,
    pub max_reconnect_delay_secs: u64,
    /// The filter stream is dropped after this long without any bytes,
    /// keep-alive newlines included
    pub stream_read_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct SlackSettings {
    /// Full incoming-webhook URL. When unset, notifications are only logged.
    pub webhook_url: Option<SecretString>,
    pub channel: String,
    pub username: String,
    /// Prepended to messages that should ping the owner, e.g. "@owner"
    pub mention: Option<String>,
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize)]
pub struct MailSettings {
    pub api_url: String,
    pub api_key: SecretString,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub recipient_email: String,
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct SecuritySettings {
    /// Signs the per-visitor access tokens
    pub token_secret: SecretString,
    /// Shared with the chat integration's outgoing webhook
    pub outwebook_token: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSettings {
    pub owner_name: String,
    pub birth_date: NaiveDate,
}

impl Settings {
    /// Loads `.env`, the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!(".env not loaded: {e}");
        }

        let settings: Settings = defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("FOLIO")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("twitter.watch_symbols")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Builds settings from defaults plus a TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("security.token_secret", &self.security.token_secret),
            ("security.outwebook_token", &self.security.outwebook_token),
        ];
        for (key, secret) in required {
            if secret.expose_secret().trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }
        if self.twitter.watch_symbols.is_empty() {
            return Err(ConfigError::Invalid(
                "twitter.watch_symbols needs at least one term".into(),
            ));
        }
        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(config::Config::builder()
        .set_default("environment", "development")?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.public_dir", "public")?
        .set_default("server.components_dir", "components")?
        .set_default("server.static_max_age_secs", 86_400)?
        .set_default("server.canonical_www", false)?
        .set_default("database.url", "sqlite://folio.db?mode=rwc")?
        .set_default("database.max_connections", 5)?
        .set_default("twitter.stream_url", "https://stream.twitter.com/1.1/statuses/filter.json")?
        .set_default("twitter.search_url", "https://api.twitter.com/1.1/search/tweets.json")?
        .set_default("twitter.watch_symbols", vec!["#rustlang"])?
        .set_default("twitter.ignored_account", "")?
        .set_default("twitter.search_query", "#rustlang")?
        .set_default("twitter.search_count", 15)?
        .set_default("twitter.reconnect_delay_secs", 1)?
        .set_default("twitter.max_reconnect_delay_secs", 120)?
        .set_default("twitter.stream_read_timeout_secs", 90)?
        .set_default("slack.channel", "#portfolio")?
        .set_default("slack.username", "Portfolio")?
        .set_default("slack.queue_capacity", 256)?
        .set_default("mail.api_url", "https://api.brevo.com/v3/smtp/email")?
        .set_default("mail.subject", "Portfolio")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [twitter]
        consumer_key = "ck"
        consumer_secret = "cs"
        access_token_key = "ak"
        access_token_secret = "as"

        [mail]
        api_key = "mail-key"
        sender_email = "portfolio@example.com"
        recipient_email = "owner@example.com"

        [security]
        token_secret = "sign-me"
        outwebook_token = "hook"

        [profile]
        owner_name = "Owner"
        birth_date = "1989-08-07"
    "#;

    #[test]
    fn minimal_document_fills_in_defaults() {
        let settings = Settings::from_toml(MINIMAL).unwrap();

        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.static_max_age_secs, 86_400);
        assert_eq!(settings.twitter.watch_symbols, ["#rustlang"]);
        assert_eq!(settings.twitter.search_count, 15);
        assert_eq!(settings.twitter.stream_read_timeout_secs, 90);
        assert!(settings.slack.webhook_url.is_none());
        assert_eq!(settings.security.token_secret.expose_secret(), "sign-me");
        assert_eq!(
            settings.profile.birth_date,
            NaiveDate::from_ymd_opt(1989, 8, 7).unwrap()
        );
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let settings = Settings::from_toml(MINIMAL).unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("sign-me"));
        assert!(!rendered.contains("mail-key"));
    }

    #[test]
    fn empty_token_secret_is_rejected() {
        let doc = MINIMAL.replace(r#"token_secret = "sign-me""#, r#"token_secret = " ""#);
        assert!(matches!(
            Settings::from_toml(&doc),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_credentials_fail_to_load() {
        let doc = MINIMAL.replace(r#"api_key = "mail-key""#, "");
        assert!(matches!(Settings::from_toml(&doc), Err(ConfigError::Load(_))));
    }
}
