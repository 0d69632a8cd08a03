//! Order confirmation: proposals become ledger `ORDER` transactions and
//! `OrderLog` rows (order_id `{date_nodashes}_{idx:03d}`, one ORDER event
//! per confirmed line, status PENDING until a receipt closes it).

use crate::clock::Clock;
use crate::domain::{EventType, OrderLog, OrderProposal, OrderStatus, Transaction};
use crate::error::{CoreError, CoreResult};
use crate::repository::Repository;

/// Confirms a batch of proposals against the ledger. `confirmed_qtys`, when
/// given, overrides the proposed quantity line-by-line (e.g. a buyer
/// rounding up to a supplier case pack); `None` accepts every proposal's
/// `qty` unchanged. A proposal that carries an `error`, or whose confirmed
/// quantity is zero, is skipped — it never gets an order_id or a
/// transaction. `idx` in the order_id tracks position in `proposals`
/// (matching the original), not a count of confirmed lines, so ids stay
/// stable even if earlier lines are skipped.
pub fn confirm_orders(
    proposals: &[OrderProposal],
    confirmed_qtys: Option<&[u32]>,
    repo: &dyn Repository,
    clock: &dyn Clock,
) -> CoreResult<(Vec<OrderLog>, Vec<Transaction>)> {
    if let Some(qtys) = confirmed_qtys {
        if qtys.len() != proposals.len() {
            return Err(CoreError::InvalidInput {
                sku: String::new(),
                reason: format!(
                    "confirmed_qtys length {} does not match proposals length {}",
                    qtys.len(),
                    proposals.len()
                ),
            });
        }
    }

    let today = clock.today();
    let order_id_base = today.format("%Y%m%d").to_string();

    let mut logs = Vec::with_capacity(proposals.len());
    let mut transactions = Vec::with_capacity(proposals.len());

    for (idx, proposal) in proposals.iter().enumerate() {
        if proposal.error.is_some() {
            continue;
        }
        let qty = confirmed_qtys.map(|q| q[idx]).unwrap_or(proposal.qty);
        if qty == 0 {
            continue;
        }

        let order_id = format!("{order_id_base}_{idx:03}");

        let transaction = Transaction::new(today, &proposal.sku, EventType::Order, qty as i64)
            .with_receipt_date(proposal.receipt_date)
            .with_note(format!("Order {order_id}"));
        repo.append_transaction(&transaction)?;
        transactions.push(transaction);

        let log = OrderLog {
            order_id,
            date: today,
            sku: proposal.sku.clone(),
            qty_ordered: qty,
            qty_received: 0,
            receipt_date: proposal.receipt_date,
            status: OrderStatus::Pending,
        };
        repo.append_order_log(&log)?;
        logs.push(log);
    }

    Ok((logs, transactions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::repository::CsvRepository;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn confirms_a_nonzero_proposal_and_skips_a_zero_one() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let clock = FixedClock(d(2026, 3, 2));
        let proposals = vec![
            OrderProposal { sku: "A".into(), qty: 12, receipt_date: d(2026, 3, 9), notes: String::new(), error: None },
            OrderProposal { sku: "B".into(), qty: 0, receipt_date: d(2026, 3, 9), notes: String::new(), error: None },
        ];
        let (logs, txns) = confirm_orders(&proposals, None, &repo, &clock).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(txns.len(), 1);
        assert_eq!(logs[0].order_id, "20260302_000");
        assert_eq!(logs[0].status, OrderStatus::Pending);
        assert_eq!(repo.read_order_log().unwrap().len(), 1);
        assert_eq!(repo.read_transactions().unwrap().len(), 1);
    }

    #[test]
    fn failed_proposal_is_skipped_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let clock = FixedClock(d(2026, 3, 2));
        let proposals = vec![OrderProposal::failed("A", d(2026, 3, 2), "boom")];
        let (logs, txns) = confirm_orders(&proposals, None, &repo, &clock).unwrap();
        assert!(logs.is_empty());
        assert!(txns.is_empty());
    }

    #[test]
    fn confirmed_qtys_length_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let clock = FixedClock(d(2026, 3, 2));
        let proposals =
            vec![OrderProposal { sku: "A".into(), qty: 5, receipt_date: d(2026, 3, 9), notes: String::new(), error: None }];
        let err = confirm_orders(&proposals, Some(&[1, 2]), &repo, &clock).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[test]
    fn confirmed_qtys_overrides_proposed_quantity() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let clock = FixedClock(d(2026, 3, 2));
        let proposals =
            vec![OrderProposal { sku: "A".into(), qty: 5, receipt_date: d(2026, 3, 9), notes: String::new(), error: None }];
        let (logs, _) = confirm_orders(&proposals, Some(&[24]), &repo, &clock).unwrap();
        assert_eq!(logs[0].qty_ordered, 24);
    }
}
