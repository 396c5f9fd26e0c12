use std::fmt::Display;

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::{Credentials, Mechanism},
};
use tracing::error;

use crate::{config::SmtpConfig, qonto::Transaction};

use super::ChannelOutcome;

pub type SmtpTransport = AsyncSmtpTransport<Tokio1Executor>;

/// Plain SMTP submission to the configured relay, AUTH PLAIN when
/// credentials are set.
pub fn smtp_transport(config: &SmtpConfig) -> SmtpTransport {
    let mut builder = SmtpTransport::builder_dangerous(config.host.as_str())
        .port(config.port)
        .timeout(Some(config.timeout));

    if let Some((user, password)) = config.credentials() {
        builder = builder
            .credentials(Credentials::new(user.to_owned(), password.to_owned()))
            .authentication(vec![Mechanism::Plain]);
    }

    builder.build()
}

pub fn subject(tx: &Transaction) -> String {
    format!("[QONTO WATCHER] update for transaction {}", tx.id)
}

pub struct EmailChannel<M> {
    transport: M,
    from: Mailbox,
    to: Mailbox,
}

impl<M> EmailChannel<M>
where
    M: AsyncTransport + Send + Sync,
    M::Error: Display,
{
    pub fn new(transport: M, from: Mailbox, to: Mailbox) -> Self {
        Self {
            transport,
            from,
            to,
        }
    }

    fn message(&self, tx: &Transaction) -> Result<Message, lettre::error::Error> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject(tx))
            .header(ContentType::TEXT_PLAIN)
            .body(tx.to_string())
    }

    pub async fn send(&self, tx: &Transaction) -> ChannelOutcome {
        let message = match self.message(tx) {
            Ok(message) => message,
            Err(err) => {
                error!("error building email: {err}");
                return ChannelOutcome::Failed(err.to_string());
            }
        };

        match self.transport.send(message).await {
            Ok(_) => ChannelOutcome::Delivered,
            Err(err) => {
                error!("unable to send mail: {err}");
                ChannelOutcome::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use lettre::transport::stub::AsyncStubTransport;

    use super::EmailChannel;
    use crate::{
        notify::ChannelOutcome,
        qonto::{OperationType, Side, Status, Transaction},
    };

    fn tx() -> Transaction {
        Transaction {
            id: "acme-bank-account-1-transaction-42".to_owned(),
            amount: 12.5,
            amount_cents: 1250,
            local_amount: 12.5,
            local_amount_cents: 1250,
            side: Side::Debit,
            operation_type: OperationType::Card,
            currency: "EUR".to_owned(),
            local_currency: "EUR".to_owned(),
            settled_at: None,
            emitted_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap().into(),
            status: Status::Pending,
            note: None,
            label: "Coffee".to_owned(),
        }
    }

    #[tokio::test]
    async fn sends_full_dump_as_plaintext() {
        let stub = AsyncStubTransport::new_ok();
        let channel = EmailChannel::new(
            stub.clone(),
            "watcher@acme.test".parse().expect("from"),
            "ops@acme.test".parse().expect("to"),
        );

        assert_eq!(channel.send(&tx()).await, ChannelOutcome::Delivered);

        let messages = stub.messages().await;
        assert_eq!(messages.len(), 1);

        let (envelope, raw) = &messages[0];
        assert_eq!(envelope.to().len(), 1);
        assert!(raw.contains("Subject: [QONTO WATCHER] update for transaction"));
        assert!(raw.contains("ID: acme-bank-account-1-transaction-42"));
        assert!(raw.contains("Label: Coffee"));
        assert!(raw.contains("Operation type: card"));
    }

    #[tokio::test]
    async fn relay_failure_is_reported_not_raised() {
        let channel = EmailChannel::new(
            AsyncStubTransport::new_error(),
            "watcher@acme.test".parse().expect("from"),
            "ops@acme.test".parse().expect("to"),
        );

        assert!(matches!(channel.send(&tx()).await, ChannelOutcome::Failed(_)));
    }
}
