use std::{
    fmt::Display,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use lettre::AsyncTransport;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{Instrument, error, info_span};
use ulid::Ulid;

use crate::{
    notify::{ChannelOutcome, DispatchReport, Notifier},
    qonto::Transaction,
};

#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    email_sent: AtomicU64,
    email_failed: AtomicU64,
    webhook_sent: AtomicU64,
    webhook_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub dispatched: u64,
    pub email_sent: u64,
    pub email_failed: u64,
    pub webhook_sent: u64,
    pub webhook_failed: u64,
}

impl DispatchStats {
    fn record(&self, report: &DispatchReport) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        match report.email {
            ChannelOutcome::Delivered => self.email_sent.fetch_add(1, Ordering::Relaxed),
            ChannelOutcome::Failed(_) => self.email_failed.fetch_add(1, Ordering::Relaxed),
            ChannelOutcome::Skipped => 0,
        };
        match report.webhook {
            ChannelOutcome::Delivered => self.webhook_sent.fetch_add(1, Ordering::Relaxed),
            ChannelOutcome::Failed(_) => self.webhook_failed.fetch_add(1, Ordering::Relaxed),
            ChannelOutcome::Skipped => 0,
        };
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            email_sent: self.email_sent.load(Ordering::Relaxed),
            email_failed: self.email_failed.load(Ordering::Relaxed),
            webhook_sent: self.webhook_sent.load(Ordering::Relaxed),
            webhook_failed: self.webhook_failed.load(Ordering::Relaxed),
        }
    }
}

/// Runs notifier dispatches as supervised background tasks.
///
/// `spawn` never waits; at most `concurrency` dispatches run at once and the
/// rest queue on the semaphore. `drain` awaits everything still in flight.
pub struct DispatchPool<M> {
    notifier: Arc<Notifier<M>>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<DispatchReport>,
    stats: Arc<DispatchStats>,
}

impl<M> DispatchPool<M>
where
    M: AsyncTransport + Send + Sync + 'static,
    M::Error: Display,
{
    pub fn new(notifier: Notifier<M>, concurrency: usize) -> Self {
        Self {
            notifier: Arc::new(notifier),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            tasks: JoinSet::new(),
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn spawn(&mut self, tx: Transaction) {
        let notifier = self.notifier.clone();
        let permits = self.permits.clone();
        let stats = self.stats.clone();
        let span = info_span!("dispatch", dispatch_id = %Ulid::new(), transaction_id = %tx.id);

        self.tasks.spawn(
            async move {
                // the semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();

                let report = notifier.dispatch(&tx).await;
                stats.record(&report);

                report
            }
            .instrument(span),
        );
    }

    /// Collects dispatches that already finished without waiting.
    pub fn reap(&mut self) -> Vec<DispatchReport> {
        let mut reports = vec![];
        while let Some(res) = self.tasks.try_join_next() {
            match res {
                Ok(report) => reports.push(report),
                Err(err) => error!("dispatch task failed: {err}"),
            }
        }
        reports
    }

    pub async fn drain(&mut self) -> Vec<DispatchReport> {
        let mut reports = vec![];
        while let Some(res) = self.tasks.join_next().await {
            match res {
                Ok(report) => reports.push(report),
                Err(err) => error!("dispatch task failed: {err}"),
            }
        }
        reports
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
