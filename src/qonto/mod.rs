//! Qonto third party API: client, records and the timestamp decoder.

mod client;
mod organization;
mod time;
mod transaction;

pub use client::{Client, PageMeta, TransactionPage};
pub use organization::{BankAccount, Organization};
pub use time::{QONTO_TIME_FORMAT, QontoTime};
pub use transaction::{OperationType, Side, Status, Transaction, WatchOptions};
