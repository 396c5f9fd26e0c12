use chrono::{DateTime, Utc};

use crate::qonto::Transaction;

/// The `(previous, current]` interval a tick looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub previous: DateTime<Utc>,
    pub current: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(previous: DateTime<Utc>, current: DateTime<Utc>) -> Self {
        Self { previous, current }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant > self.previous && instant <= self.current
    }

    /// Either event crossing the window makes the transaction new.
    ///
    /// A transaction emitted in one window and settled in a later one is
    /// therefore reported twice; nothing tracks what was already notified.
    pub fn is_new(&self, tx: &Transaction) -> bool {
        self.contains(tx.emitted_at.as_utc())
            || tx
                .settled_at
                .is_some_and(|settled_at| self.contains(settled_at.as_utc()))
    }
}

#[cfg(test)]
mod test {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::TimeWindow;
    use crate::qonto::{OperationType, QontoTime, Side, Status, Transaction};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn tx(emitted_at: DateTime<Utc>, settled_at: Option<DateTime<Utc>>) -> Transaction {
        Transaction {
            id: "acme-bank-account-1-transaction-7".to_owned(),
            amount: 99.0,
            amount_cents: 9900,
            local_amount: 99.0,
            local_amount_cents: 9900,
            side: Side::Credit,
            operation_type: OperationType::Transfer,
            currency: "EUR".to_owned(),
            local_currency: "EUR".to_owned(),
            settled_at: settled_at.map(QontoTime::from),
            emitted_at: emitted_at.into(),
            status: Status::Completed,
            note: None,
            label: "Invoice 2024-031".to_owned(),
        }
    }

    #[test]
    fn emitted_after_previous_is_new() {
        let window = TimeWindow::new(t0(), t0() + Duration::seconds(60));

        assert!(window.is_new(&tx(t0() + Duration::seconds(1), None)));
    }

    #[test]
    fn both_events_before_previous_is_not_new() {
        let window = TimeWindow::new(t0(), t0() + Duration::seconds(60));
        let before = t0() - Duration::seconds(1);

        assert!(!window.is_new(&tx(before, Some(before))));
    }

    #[test]
    fn settlement_alone_qualifies() {
        let window = TimeWindow::new(t0(), t0() + Duration::seconds(60));

        assert!(window.is_new(&tx(
            t0() - Duration::hours(2),
            Some(t0() + Duration::seconds(30))
        )));
    }

    #[test]
    fn bounds_are_half_open() {
        let window = TimeWindow::new(t0(), t0() + Duration::seconds(60));

        assert!(!window.contains(t0()));
        assert!(window.contains(t0() + Duration::seconds(60)));
        assert!(!window.contains(t0() + Duration::seconds(61)));
    }

    #[test]
    fn compares_instants_across_offsets() {
        let window = TimeWindow::new(t0(), t0() + Duration::seconds(60));
        // 10:00:30+0100 is 09:00:30 UTC
        let emitted = QontoTime::parse("emitted_at", "2024-03-01T10:00:30+0100").expect("parse");

        let mut tx = tx(t0(), None);
        tx.emitted_at = emitted;

        assert!(window.is_new(&tx));
    }
}
