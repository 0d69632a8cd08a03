//! Receiving close (idempotent, keyed by `document_id`) and the exception
//! workflow (WASTE/ADJUST/UNFULFILLED, idempotent per `(date, sku,
//! event_type)`).

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::clock::Clock;
use crate::domain::{EventType, OrderLog, OrderStatus, ReceivingLog, Transaction};
use crate::error::{CoreError, CoreResult};
use crate::repository::Repository;

/// Result of a `close_receipt` call. `already_processed` is the
/// idempotency signal: when true, `transactions` is always empty and
/// nothing was written.
pub struct ReceivingOutcome {
    pub transactions: Vec<Transaction>,
    pub already_processed: bool,
}

/// Closes a receipt for one SKU against `document_id`. Idempotent: if
/// `document_id` already appears in the receiving log, this is a no-op and
/// returns `already_processed = true`.
///
/// Allocates `qty_received` FIFO (oldest order date first) against open
/// (`PENDING`/`PARTIAL`) `OrderLog` rows for the SKU, updating each row's
/// `qty_received`/`status` in place (the latest row per `order_id` wins —
/// see `latest_order_logs`). Any outstanding quantity across those orders
/// beyond what was received becomes an auto `UNFULFILLED` transaction,
/// capped at the outstanding amount so it can never overshoot.
pub fn close_receipt(
    document_id: &str,
    sku: &str,
    receipt_date: NaiveDate,
    qty_received: u32,
    notes: &str,
    repo: &dyn Repository,
    clock: &dyn Clock,
) -> CoreResult<ReceivingOutcome> {
    let existing_receiving = repo.read_receiving_log()?;
    if existing_receiving.iter().any(|r| r.document_id == document_id) {
        return Ok(ReceivingOutcome { transactions: Vec::new(), already_processed: true });
    }

    let today = clock.today();
    let mut transactions = Vec::new();

    let receipt_note = if notes.is_empty() {
        format!("Receipt {document_id}")
    } else {
        format!("Receipt {document_id}; {notes}")
    };
    let receipt_txn = Transaction::new(today, sku, EventType::Receipt, qty_received as i64)
        .with_receipt_date(receipt_date)
        .with_note(receipt_note);
    repo.append_transaction(&receipt_txn)?;
    transactions.push(receipt_txn);

    let order_logs = repo.read_order_log()?;
    let mut latest = latest_order_logs(&order_logs);
    let mut open_orders: Vec<&mut OrderLog> = latest
        .values_mut()
        .filter(|o| o.sku == sku && o.status != OrderStatus::Closed)
        .collect();
    open_orders.sort_by_key(|o| o.date);

    let qty_ordered_outstanding: u32 = open_orders.iter().map(|o| o.remaining()).sum();

    let mut remaining_to_allocate = qty_received;
    let mut allocated_order_ids = Vec::new();
    for order in open_orders.iter_mut() {
        if remaining_to_allocate == 0 {
            break;
        }
        let take = order.remaining().min(remaining_to_allocate);
        if take == 0 {
            continue;
        }
        order.qty_received += take;
        remaining_to_allocate -= take;
        order.status = if order.remaining() == 0 { OrderStatus::Closed } else { OrderStatus::Partial };
        allocated_order_ids.push(order.order_id.clone());
        repo.append_order_log(order)?;
    }

    let qty_unfulfilled = qty_ordered_outstanding.saturating_sub(qty_received).min(qty_ordered_outstanding);
    if qty_ordered_outstanding > 0 && qty_unfulfilled > 0 {
        let unfulfilled_txn = Transaction::new(today, sku, EventType::Unfulfilled, qty_unfulfilled as i64).with_note(
            format!("Auto-generated for receipt {document_id}; qty_ordered={qty_ordered_outstanding}, qty_received={qty_received}"),
        );
        repo.append_transaction(&unfulfilled_txn)?;
        transactions.push(unfulfilled_txn);
    }

    repo.append_receiving_log(&ReceivingLog {
        document_id: document_id.to_string(),
        date: today,
        sku: sku.to_string(),
        qty_received,
        allocated_order_ids,
    })?;

    Ok(ReceivingOutcome { transactions, already_processed: false })
}

/// Folds an append-only order-log history down to the latest row per
/// `order_id`, assuming append order is insertion order (true for
/// `CsvRepository`, whose `append_order_log` only ever appends).
fn latest_order_logs(logs: &[OrderLog]) -> HashMap<String, OrderLog> {
    let mut map = HashMap::new();
    for log in logs {
        map.insert(log.order_id.clone(), log.clone());
    }
    map
}

/// Records a WASTE/ADJUST/UNFULFILLED exception, idempotent per `(date,
/// sku, event_type)`. Returns the transaction (new or the one already on
/// file) and whether it was already recorded.
pub fn record_exception(
    event_type: EventType,
    sku: &str,
    qty: i64,
    event_date: Option<NaiveDate>,
    notes: &str,
    repo: &dyn Repository,
    clock: &dyn Clock,
) -> CoreResult<(Transaction, bool)> {
    if !matches!(event_type, EventType::Waste | EventType::Adjust | EventType::Unfulfilled) {
        return Err(CoreError::InvalidInput {
            sku: sku.to_string(),
            reason: format!("{event_type:?} is not a valid exception type (WASTE/ADJUST/UNFULFILLED only)"),
        });
    }

    let event_date = event_date.unwrap_or_else(|| clock.today());
    let key = exception_key(event_date, sku, event_type);

    let existing_txns = repo.read_transactions()?;
    if let Some(existing) = existing_txns
        .into_iter()
        .find(|t| t.date == event_date && t.sku == sku && t.event == event_type)
    {
        return Ok((existing, true));
    }

    let note = if notes.is_empty() { key } else { format!("{key}; {notes}") };
    let txn = Transaction::new(event_date, sku, event_type, qty).with_note(note);
    repo.append_transaction(&txn)?;
    Ok((txn, false))
}

fn exception_key(event_date: NaiveDate, sku: &str, event_type: EventType) -> String {
    format!("{event_date}_{sku}_{event_type:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::domain::order_log::OrderLog;
    use crate::repository::CsvRepository;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seed_order(repo: &CsvRepository, order_id: &str, sku: &str, date: NaiveDate, qty: u32, receipt_date: NaiveDate) {
        repo.append_order_log(&OrderLog {
            order_id: order_id.to_string(),
            date,
            sku: sku.to_string(),
            qty_ordered: qty,
            qty_received: 0,
            receipt_date,
            status: OrderStatus::Pending,
        })
        .unwrap();
    }

    #[test]
    fn close_receipt_allocates_fifo_and_marks_order_closed() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let clock = FixedClock(d(2026, 3, 9));
        seed_order(&repo, "20260302_000", "A", d(2026, 3, 2), 10, d(2026, 3, 9));

        let outcome = close_receipt("DOC-1", "A", d(2026, 3, 9), 10, "", &repo, &clock).unwrap();
        assert!(!outcome.already_processed);
        assert_eq!(outcome.transactions.len(), 1);

        let logs = repo.read_order_log().unwrap();
        assert_eq!(logs.last().unwrap().status, OrderStatus::Closed);
        assert_eq!(logs.last().unwrap().qty_received, 10);
    }

    #[test]
    fn short_ship_emits_capped_unfulfilled() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let clock = FixedClock(d(2026, 3, 9));
        seed_order(&repo, "20260302_000", "A", d(2026, 3, 2), 10, d(2026, 3, 9));

        let outcome = close_receipt("DOC-2", "A", d(2026, 3, 9), 4, "", &repo, &clock).unwrap();
        assert_eq!(outcome.transactions.len(), 2);
        assert_eq!(outcome.transactions[1].event, EventType::Unfulfilled);
        assert_eq!(outcome.transactions[1].qty, 6);
    }

    #[test]
    fn repeating_the_same_document_id_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let clock = FixedClock(d(2026, 3, 9));
        seed_order(&repo, "20260302_000", "A", d(2026, 3, 2), 10, d(2026, 3, 9));

        close_receipt("DOC-3", "A", d(2026, 3, 9), 10, "", &repo, &clock).unwrap();
        let second = close_receipt("DOC-3", "A", d(2026, 3, 9), 10, "", &repo, &clock).unwrap();
        assert!(second.already_processed);
        assert!(second.transactions.is_empty());
    }

    #[test]
    fn exception_is_rejected_for_non_exception_event_types() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let clock = FixedClock(d(2026, 3, 9));
        let err = record_exception(EventType::Sale, "A", 1, None, "", &repo, &clock).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[test]
    fn recording_the_same_exception_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let clock = FixedClock(d(2026, 3, 9));
        let (_, first_dup) = record_exception(EventType::Waste, "A", 3, None, "shelf gap", &repo, &clock).unwrap();
        assert!(!first_dup);
        let (_, second_dup) = record_exception(EventType::Waste, "A", 3, None, "shelf gap", &repo, &clock).unwrap();
        assert!(second_dup);
        assert_eq!(repo.read_transactions().unwrap().len(), 1);
    }
}
