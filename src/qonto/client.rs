use std::collections::BTreeSet;

use reqwest::{Client as HttpClient, ClientBuilder, RequestBuilder, StatusCode, Url, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::{
    config::ApiConfig,
    error::{DecodeError, QontoError},
};

use super::{
    organization::{Organization, OrganizationRes},
    transaction::{RawTransaction, Transaction, WatchOptions},
};

/// Client for the Qonto third party REST API.
///
/// Every request carries the static `login:secret` authorization header and
/// is bounded by the configured timeout.
#[derive(Clone)]
pub struct Client {
    client: HttpClient,
    authorization: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: &ApiConfig) -> Result<Self, QontoError> {
        let client = ClientBuilder::new().timeout(config.timeout).build()?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|err| QontoError::Validation(format!("invalid base url: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(QontoError::Validation(format!(
                "invalid base url: {}",
                config.base_url
            )));
        }

        return Ok(Self {
            client,
            authorization: format!("{}:{}", config.login, config.secret),
            base_url,
        });
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, QontoError> {
        let res = req
            .header(header::AUTHORIZATION, &self.authorization)
            .send()
            .await?;

        let status = res.status();
        if status != StatusCode::OK {
            error!("qonto req error {status}");
            return Err(QontoError::Api { status });
        }

        let body = res.bytes().await?;
        let decoded = serde_json::from_slice::<T>(&body).map_err(DecodeError::from)?;

        Ok(decoded)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_organization(&self, name: &str) -> Result<Organization, QontoError> {
        let res: OrganizationRes = self
            .send(self.client.get(self.url(&["organizations", name])))
            .await?;

        Ok(res.organization)
    }

    /// First page of the account's transactions.
    ///
    /// Larger result sets are truncated to whatever the API puts on one page;
    /// use [`Client::fetch_all_transactions`] to follow `next_page`.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_transactions(
        &self,
        options: &WatchOptions,
    ) -> Result<Vec<Transaction>, QontoError> {
        let page = self.fetch_transactions_page(options, options.current_page).await?;

        Ok(page.transactions)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_all_transactions(
        &self,
        options: &WatchOptions,
    ) -> Result<Vec<Transaction>, QontoError> {
        let mut transactions = vec![];
        let mut page = options.current_page;
        let mut visited = BTreeSet::from([page.unwrap_or(1)]);

        loop {
            let res = self.fetch_transactions_page(options, page).await?;
            transactions.extend(res.transactions);

            let Some(next) = res.meta.and_then(|meta| meta.next_page) else {
                break;
            };
            if !visited.insert(next) {
                warn!("next_page {next} was already fetched, stopping pagination");
                break;
            }
            page = Some(next);
        }

        Ok(transactions)
    }

    pub async fn fetch_transactions_page(
        &self,
        options: &WatchOptions,
        page: Option<u32>,
    ) -> Result<TransactionPage, QontoError> {
        options.validate()?;

        let mut query = options.query();
        if let Some(page) = page {
            query.retain(|(key, _)| *key != "current_page");
            query.push(("current_page", page.to_string()));
        }

        let res: TransactionsRes = self
            .send(self.client.get(self.url(&["transactions"])).query(&query))
            .await?;

        let mut transactions = Vec::with_capacity(res.transactions.len());
        for raw in res.transactions {
            let tx = Transaction::try_from(raw)?;
            if options.includes(tx.status) {
                transactions.push(tx);
            }
        }

        debug!("fetched {} transactions", transactions.len());

        Ok(TransactionPage {
            transactions,
            meta: res.meta,
        })
    }
}

#[derive(Debug)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    pub current_page: Option<u32>,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
    pub total_pages: Option<u32>,
    pub total_count: Option<u64>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TransactionsRes {
    transactions: Vec<RawTransaction>,
    meta: Option<PageMeta>,
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::Client;
    use crate::{
        config::ApiConfig,
        error::QontoError,
        qonto::WatchOptions,
    };

    fn config(base_url: &str) -> ApiConfig {
        ApiConfig {
            login: "login".to_owned(),
            secret: "secret".to_owned(),
            base_url: base_url.to_owned(),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn builds_urls_under_base_path() {
        let client = Client::new(&config("https://thirdparty.qonto.eu/v2")).expect("client");

        assert_eq!(
            client.url(&["organizations", "acme corp"]).as_str(),
            "https://thirdparty.qonto.eu/v2/organizations/acme%20corp"
        );
        assert_eq!(
            client.url(&["transactions"]).as_str(),
            "https://thirdparty.qonto.eu/v2/transactions"
        );

        let trailing = Client::new(&config("https://thirdparty.qonto.eu/v2/")).expect("client");
        assert_eq!(
            trailing.url(&["transactions"]).as_str(),
            "https://thirdparty.qonto.eu/v2/transactions"
        );
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            Client::new(&config("not a url")),
            Err(QontoError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn invalid_options_fail_without_network() {
        // port 9 is discard; a request would surface as a transport error
        let client = Client::new(&config("http://127.0.0.1:9")).expect("client");

        let err = client
            .fetch_transactions(&WatchOptions::new("", "FR76"))
            .await
            .unwrap_err();
        assert!(matches!(err, QontoError::Validation(_)));

        let err = client
            .fetch_transactions(&WatchOptions::new("acme-1", " "))
            .await
            .unwrap_err();
        assert!(matches!(err, QontoError::Validation(_)));
    }
}
