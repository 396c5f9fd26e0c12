use std::time::Duration;

use reqwest::{Client, ClientBuilder, StatusCode, Url};
use tracing::error;

use crate::qonto::Transaction;

use super::ChannelOutcome;

/// Posts each transaction as JSON to a fixed URL. Only `200 OK` counts as
/// delivered.
pub struct WebhookChannel {
    client: Client,
    url: Url,
}

impl WebhookChannel {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new().timeout(timeout).build()?;

        return Ok(Self { client, url });
    }

    pub async fn send(&self, tx: &Transaction) -> ChannelOutcome {
        let res = match self.client.post(self.url.clone()).json(tx).send().await {
            Ok(res) => res,
            Err(err) => {
                error!("error calling webhook: {err}");
                return ChannelOutcome::Failed(err.to_string());
            }
        };

        let status = res.status();
        if status != StatusCode::OK {
            error!("webhook call has failed - {status}");
            return ChannelOutcome::Failed(format!("webhook returned {status}"));
        }

        ChannelOutcome::Delivered
    }
}
