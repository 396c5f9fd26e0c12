use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DecodeError, QontoError};

use super::time::QontoTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    #[serde(alias = "transfert")]
    Transfer,
    Card,
    DirectDebit,
    Income,
    #[serde(alias = "qonto_fee")]
    Fee,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Reversed,
    Declined,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Reversed => "reversed",
            Status::Declined => "declined",
            Status::Completed => "completed",
        }
    }
}

impl FromStr for Status {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "reversed" => Ok(Status::Reversed),
            "declined" => Ok(Status::Declined),
            "completed" => Ok(Status::Completed),
            _ => Err(ConfigError::UnknownStatus(s.to_owned())),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Credit => "credit",
            Side::Debit => "debit",
        })
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationType::Transfer => "transfer",
            OperationType::Card => "card",
            OperationType::DirectDebit => "direct_debit",
            OperationType::Income => "income",
            OperationType::Fee => "fee",
            OperationType::Other => "other",
        })
    }
}

/// A transaction as listed by `GET /transactions`.
///
/// `amount_cents` is expected to equal `amount` in minor units of
/// `currency`; this is not checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    #[serde(rename = "transaction_id")]
    pub id: String,
    pub amount: f64,
    pub amount_cents: u64,
    pub local_amount: f64,
    pub local_amount_cents: u64,
    pub side: Side,
    pub operation_type: OperationType,
    pub currency: String,
    pub local_currency: String,
    /// `None` while the transaction is not settled yet.
    pub settled_at: Option<QontoTime>,
    pub emitted_at: QontoTime,
    pub status: Status,
    pub note: Option<String>,
    pub label: String,
}

/// Undecoded timestamps, converted with [`Transaction::try_from`] so a bad
/// value is reported with its field name.
#[derive(Debug, Deserialize)]
pub(crate) struct RawTransaction {
    transaction_id: String,
    amount: f64,
    amount_cents: u64,
    #[serde(default)]
    local_amount: f64,
    #[serde(default)]
    local_amount_cents: u64,
    side: Side,
    operation_type: OperationType,
    currency: String,
    #[serde(default)]
    local_currency: String,
    #[serde(alias = "settle_at")]
    settled_at: Option<String>,
    emitted_at: String,
    status: Status,
    note: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

impl TryFrom<RawTransaction> for Transaction {
    type Error = DecodeError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        let settled_at = match raw.settled_at.as_deref() {
            Some(value) if !value.trim().is_empty() => {
                Some(QontoTime::parse("settled_at", value)?)
            }
            _ => None,
        };

        return Ok(Transaction {
            emitted_at: QontoTime::parse("emitted_at", &raw.emitted_at)?,
            settled_at,
            id: raw.transaction_id,
            amount: raw.amount,
            amount_cents: raw.amount_cents,
            local_amount: raw.local_amount,
            local_amount_cents: raw.local_amount_cents,
            side: raw.side,
            operation_type: raw.operation_type,
            currency: raw.currency,
            local_currency: raw.local_currency,
            status: raw.status,
            note: raw.note,
            label: raw.label.unwrap_or_default(),
        });
    }
}

impl Transaction {
    /// One line summary used for the per-transaction log line.
    pub fn inline(&self) -> String {
        format!(
            "{id} - Operation: {op} - Status: {status} - Side: {side} - Amount(cts): {cents}",
            id = self.id,
            op = self.operation_type,
            status = self.status,
            side = self.side,
            cents = self.amount_cents,
        )
    }
}

/// Full field dump, used as the notification email body.
impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Amount: {}", self.amount)?;
        writeln!(f, "Amount (cts): {}", self.amount_cents)?;
        writeln!(f, "Local amount: {}", self.local_amount)?;
        writeln!(f, "Local amount (cts): {}", self.local_amount_cents)?;
        writeln!(f, "Side: {}", self.side)?;
        writeln!(f, "Operation type: {}", self.operation_type)?;
        writeln!(f, "Currency: {}", self.currency)?;
        writeln!(f, "Local currency: {}", self.local_currency)?;
        writeln!(f, "Emitted at: {}", self.emitted_at)?;
        match &self.settled_at {
            Some(settled_at) => writeln!(f, "Settled at: {settled_at}")?,
            None => writeln!(f, "Settled at: -")?,
        }
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Note: {}", self.note.as_deref().unwrap_or_default())?;
        writeln!(f, "Label: {}", self.label)
    }
}

/// Account selection for `GET /transactions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchOptions {
    pub slug: String,
    pub iban: String,
    /// Empty means every status.
    pub statuses: BTreeSet<Status>,
    pub current_page: Option<u32>,
    pub per_page: Option<u32>,
}

impl WatchOptions {
    pub fn new(slug: impl Into<String>, iban: impl Into<String>) -> Self {
        WatchOptions {
            slug: slug.into(),
            iban: iban.into(),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = Status>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn validate(&self) -> Result<(), QontoError> {
        if self.slug.trim().is_empty() {
            return Err(QontoError::Validation("parameter slug is required".to_owned()));
        }
        if self.iban.trim().is_empty() {
            return Err(QontoError::Validation("parameter iban is required".to_owned()));
        }

        Ok(())
    }

    pub fn includes(&self, status: Status) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&status)
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("slug", self.slug.trim().to_owned()),
            ("iban", self.iban.trim().to_owned()),
        ];
        for status in &self.statuses {
            query.push(("status[]", status.as_str().to_owned()));
        }
        if let Some(page) = self.current_page {
            query.push(("current_page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            query.push(("per_page", per_page.to_string()));
        }

        query
    }
}
