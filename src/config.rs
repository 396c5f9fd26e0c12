use std::{collections::BTreeSet, time::Duration};

use lettre::message::Mailbox;
use reqwest::Url;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::{
    error::ConfigError,
    qonto::{Status, WatchOptions},
};

pub const DEFAULT_BASE_URL: &str = "https://thirdparty.qonto.eu/v2";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 900;
pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 8;

/// Raw `QONTO_*` environment, see [`Config::new`].
#[derive(Debug, Default, Deserialize)]
pub struct EnvironmentVariables {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub login: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub secret: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub iban: Option<String>,
    #[serde(default)]
    pub statuses: Vec<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub email_to: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub webhook: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub smtp_mailfrom: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub smtp_user: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub smtp_password: Option<String>,

    pub poll_interval_secs: Option<u64>,
    pub poll_backoff: Option<bool>,
    pub poll_max_backoff_secs: Option<u64>,
    pub follow_pages: Option<bool>,
    pub dispatch_concurrency: Option<usize>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.trim();
    if s.is_empty() { Ok(None) } else { Ok(Some(s.to_owned())) }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub login: String,
    pub secret: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub mail_from: Mailbox,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl SmtpConfig {
    /// Credentials for AUTH PLAIN, only when both user and password are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Some((user.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationTargets {
    pub email: Option<Mailbox>,
    pub webhook: Option<Url>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub backoff: bool,
    pub max_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            backoff: false,
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
        }
    }
}

impl PollPolicy {
    /// Sleep before the next tick after `failures` consecutive failed fetches.
    pub fn delay(&self, failures: u32) -> Duration {
        if !self.backoff || failures == 0 {
            return self.interval;
        }

        let factor = 2u32.saturating_pow(failures.min(16));
        self.interval
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff.max(self.interval))
    }
}

/// Validated settings for the `watch` command.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub options: WatchOptions,
    pub targets: NotificationTargets,
    pub smtp: Option<SmtpConfig>,
    pub poll: PollPolicy,
    pub follow_pages: bool,
    pub dispatch_concurrency: usize,
    pub timeout: Duration,
}

/// Command line values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct WatchOverrides {
    pub slug: Option<String>,
    pub iban: Option<String>,
    pub statuses: Vec<String>,
    pub email_to: Option<String>,
    pub webhook: Option<String>,
}

pub struct Config {
    pub api: ApiConfig,
    envs: EnvironmentVariables,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().map_err(|err| warn!("error loading .env: {:?}", err));

        let envs = envy::prefixed("QONTO_").from_env::<EnvironmentVariables>()?;

        Self::from_envs(envs)
    }

    pub fn from_envs(envs: EnvironmentVariables) -> Result<Self, ConfigError> {
        let login = envs.login.clone().ok_or(ConfigError::Missing("login"))?;
        let secret = envs.secret.clone().ok_or(ConfigError::Missing("secret"))?;

        let base_url = envs
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        match Url::parse(&base_url) {
            Ok(url) if !url.cannot_be_a_base() => {}
            _ => return Err(ConfigError::InvalidBaseUrl(base_url)),
        }

        let api = ApiConfig {
            login,
            secret,
            base_url,
            timeout: Duration::from_secs(envs.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        };

        return Ok(Config { api, envs });
    }

    /// Builds and validates the watch settings. Any error here is fatal.
    pub fn watch(&self, overrides: WatchOverrides) -> Result<WatchConfig, ConfigError> {
        let envs = &self.envs;

        let slug = non_empty(overrides.slug)
            .or_else(|| envs.slug.clone())
            .ok_or(ConfigError::Missing("slug"))?;
        let iban = non_empty(overrides.iban)
            .or_else(|| envs.iban.clone())
            .ok_or(ConfigError::Missing("iban"))?;

        let raw_statuses = if overrides.statuses.is_empty() {
            &envs.statuses
        } else {
            &overrides.statuses
        };
        let statuses = raw_statuses
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<Status>())
            .collect::<Result<BTreeSet<_>, _>>()?;

        let email = non_empty(overrides.email_to)
            .or_else(|| envs.email_to.clone())
            .map(|value| parse_mailbox("email", value))
            .transpose()?;

        let smtp = match email {
            Some(_) => Some(self.smtp()?),
            None => None,
        };

        let webhook = non_empty(overrides.webhook)
            .or_else(|| envs.webhook.clone())
            .map(parse_webhook)
            .transpose()?;

        let poll = PollPolicy {
            interval: Duration::from_secs(
                envs.poll_interval_secs
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                    .max(1),
            ),
            backoff: envs.poll_backoff.unwrap_or(false),
            max_backoff: Duration::from_secs(
                envs.poll_max_backoff_secs
                    .unwrap_or(DEFAULT_MAX_BACKOFF_SECS),
            ),
        };

        return Ok(WatchConfig {
            options: WatchOptions {
                slug,
                iban,
                statuses,
                ..Default::default()
            },
            targets: NotificationTargets { email, webhook },
            smtp,
            poll,
            follow_pages: envs.follow_pages.unwrap_or(false),
            dispatch_concurrency: envs
                .dispatch_concurrency
                .unwrap_or(DEFAULT_DISPATCH_CONCURRENCY)
                .max(1),
            timeout: self.api.timeout,
        });
    }

    fn smtp(&self) -> Result<SmtpConfig, ConfigError> {
        let envs = &self.envs;

        let host = envs.smtp_host.clone().ok_or(ConfigError::MissingSmtp("host"))?;
        let port = envs.smtp_port.ok_or(ConfigError::MissingSmtp("port"))?;
        let mail_from = envs
            .smtp_mailfrom
            .clone()
            .ok_or(ConfigError::MissingSmtp("mailfrom"))?;

        Ok(SmtpConfig {
            host,
            port,
            mail_from: parse_mailbox("smtp.mailfrom", mail_from)?,
            user: envs.smtp_user.clone(),
            password: envs.smtp_password.clone(),
            timeout: self.api.timeout,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_mailbox(field: &'static str, value: String) -> Result<Mailbox, ConfigError> {
    value
        .parse::<Mailbox>()
        .map_err(|_| ConfigError::InvalidAddress { field, value })
}

fn parse_webhook(value: String) -> Result<Url, ConfigError> {
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => Ok(url),
        _ => Err(ConfigError::InvalidWebhook(value)),
    }
}
