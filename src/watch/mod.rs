use std::{fmt::Display, future::Future};

use chrono::{DateTime, Utc};
use lettre::AsyncTransport;
use tracing::{debug, error, info, warn};

use crate::{
    config::{PollPolicy, WatchConfig},
    error::QontoError,
    notify::{Notifier, SmtpTransport},
    qonto::{Client, Transaction, WatchOptions},
};

mod pool;
mod window;

pub use pool::{DispatchPool, DispatchStats, StatsSnapshot};
pub use window::TimeWindow;

#[derive(Debug)]
pub enum TickReport {
    Polled {
        window: TimeWindow,
        fetched: usize,
        new: Vec<String>,
    },
    Failed {
        window: TimeWindow,
        error: QontoError,
    },
}

impl TickReport {
    pub fn new_ids(&self) -> &[String] {
        match self {
            TickReport::Polled { new, .. } => new,
            TickReport::Failed { .. } => &[],
        }
    }
}

/// Polls the account at a fixed interval and hands every new transaction to
/// the dispatch pool.
///
/// `previous_poll` is the only state carried between ticks. It moves to the
/// time captured before the fetch, and only when the fetch succeeded.
pub struct Watcher<M = SmtpTransport> {
    client: Client,
    options: WatchOptions,
    poll: PollPolicy,
    follow_pages: bool,
    previous_poll: DateTime<Utc>,
    failures: u32,
    pool: DispatchPool<M>,
}

impl<M> Watcher<M>
where
    M: AsyncTransport + Send + Sync + 'static,
    M::Error: Display,
{
    pub fn new(client: Client, config: &WatchConfig, notifier: Notifier<M>) -> Self {
        Self {
            client,
            options: config.options.clone(),
            poll: config.poll,
            follow_pages: config.follow_pages,
            previous_poll: Utc::now(),
            failures: 0,
            pool: DispatchPool::new(notifier, config.dispatch_concurrency),
        }
    }

    /// Sets where the first window starts. Defaults to construction time.
    pub fn starting_at(mut self, previous_poll: DateTime<Utc>) -> Self {
        self.previous_poll = previous_poll;
        self
    }

    pub fn previous_poll(&self) -> DateTime<Utc> {
        self.previous_poll
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn pool(&mut self) -> &mut DispatchPool<M> {
        &mut self.pool
    }

    async fn fetch(&self) -> Result<Vec<Transaction>, QontoError> {
        if self.follow_pages {
            self.client.fetch_all_transactions(&self.options).await
        } else {
            self.client.fetch_transactions(&self.options).await
        }
    }

    pub async fn tick(&mut self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// One watch cycle with `now` as the poll time.
    #[tracing::instrument(skip(self))]
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> TickReport {
        let window = TimeWindow::new(self.previous_poll, now);

        let transactions = match self.fetch().await {
            Ok(transactions) => transactions,
            Err(error) => {
                self.failures = self.failures.saturating_add(1);
                error!("error getting transactions: {error}");
                return TickReport::Failed { window, error };
            }
        };

        self.failures = 0;
        self.previous_poll = window.current;

        let fetched = transactions.len();
        let new_transactions: Vec<Transaction> = transactions
            .into_iter()
            .filter(|tx| window.is_new(tx))
            .collect();

        if new_transactions.is_empty() {
            debug!("no new transactions");
        } else {
            info!("new transactions: {}", new_transactions.len());
        }

        let new = new_transactions.iter().map(|tx| tx.id.clone()).collect();
        for tx in new_transactions {
            self.pool.spawn(tx);
        }
        self.pool.reap();

        TickReport::Polled {
            window,
            fetched,
            new,
        }
    }

    /// Sleeps, ticks, repeats until `shutdown` resolves, then waits for the
    /// dispatches still in flight. A poll still waiting on the API when
    /// `shutdown` fires is dropped.
    pub async fn run<F>(mut self, shutdown: F) -> StatsSnapshot
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            "watching {slug} every {interval:?}",
            slug = self.options.slug,
            interval = self.poll.interval
        );

        loop {
            let delay = self.poll.delay(self.failures);
            if self.failures > 0 {
                warn!("{} failed polls in a row, next in {delay:?}", self.failures);
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }

            // a poll cut short here has not moved the window yet
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("shutdown during poll, abandoning it");
                    break;
                }
                _ = self.tick() => {}
            }
        }

        info!("stopping, {} dispatches in flight", self.pool.in_flight());
        self.pool.drain().await;

        self.pool.stats()
    }
}
