use std::fmt::Display;

use anyhow::Context;
use lettre::AsyncTransport;
use tracing::info;

use crate::{config::WatchConfig, qonto::Transaction};

mod email;
mod webhook;

pub use email::{EmailChannel, SmtpTransport, smtp_transport, subject};
pub use webhook::WebhookChannel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Skipped,
    Delivered,
    Failed(String),
}

impl ChannelOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ChannelOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub transaction_id: String,
    pub email: ChannelOutcome,
    pub webhook: ChannelOutcome,
}

/// Per transaction side effects: a log line, then email and webhook.
///
/// Channels are independent: a failing one is logged and reported, never
/// retried, and never stops the other.
pub struct Notifier<M = SmtpTransport> {
    email: Option<EmailChannel<M>>,
    webhook: Option<WebhookChannel>,
}

impl Notifier<SmtpTransport> {
    pub fn from_config(config: &WatchConfig) -> anyhow::Result<Self> {
        let email = match (&config.targets.email, &config.smtp) {
            (Some(to), Some(smtp)) => Some(EmailChannel::new(
                smtp_transport(smtp),
                smtp.mail_from.clone(),
                to.clone(),
            )),
            _ => None,
        };

        let webhook = config
            .targets
            .webhook
            .clone()
            .map(|url| WebhookChannel::new(url, config.timeout))
            .transpose()
            .context("error creating webhook client")?;

        return Ok(Notifier::new(email, webhook));
    }
}

impl<M> Notifier<M>
where
    M: AsyncTransport + Send + Sync,
    M::Error: Display,
{
    pub fn new(email: Option<EmailChannel<M>>, webhook: Option<WebhookChannel>) -> Self {
        Self { email, webhook }
    }

    pub async fn dispatch(&self, tx: &Transaction) -> DispatchReport {
        info!("{}", tx.inline());

        let email = async {
            match &self.email {
                Some(channel) => channel.send(tx).await,
                None => ChannelOutcome::Skipped,
            }
        };
        let webhook = async {
            match &self.webhook {
                Some(channel) => channel.send(tx).await,
                None => ChannelOutcome::Skipped,
            }
        };

        let (email, webhook) = tokio::join!(email, webhook);

        DispatchReport {
            transaction_id: tx.id.clone(),
            email,
            webhook,
        }
    }
}
