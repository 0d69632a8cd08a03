//! Stock calculator: folds the append-only transaction ledger into
//! point-in-time `Stock` snapshots, per spec §4.1.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::{EventType, Stock, Transaction};
use crate::error::{CoreError, CoreResult};

/// A view over the ledger events for a single SKU, folded once and queried
/// repeatedly. Construction does the sort; queries are cheap scans over an
/// already-ordered slice.
pub struct StockCalculator<'a> {
    sku: &'a str,
    events: Vec<&'a Transaction>,
}

impl<'a> StockCalculator<'a> {
    /// Builds a calculator over every ledger event for `sku`, sorted
    /// ascending by (date, event fold rank) so SNAPSHOT/ADJUST (absolute
    /// sets) are applied before other events on the same day.
    pub fn new(sku: &'a str, ledger: &'a [Transaction]) -> CoreResult<Self> {
        let mut events: Vec<&Transaction> = ledger.iter().filter(|t| t.sku == sku).collect();
        events.sort_by_key(|t| (t.date, t.event.fold_rank()));
        Ok(Self { sku, events })
    }

    /// The stock state at end-of-day `date` (inclusive).
    pub fn stock_asof(&self, date: NaiveDate) -> CoreResult<Stock> {
        let mut stock = Stock::empty(date);
        for t in self.events.iter().take_while(|t| t.date <= date) {
            apply_event(&mut stock, t, self.sku)?;
        }
        stock.asof_date = date;
        Ok(stock)
    }

    /// Vectorised `stock_asof` over several SKUs sharing one ledger.
    pub fn stock_all(skus: &[String], ledger: &[Transaction], date: NaiveDate) -> CoreResult<HashMap<String, Stock>> {
        let mut out = HashMap::with_capacity(skus.len());
        for sku in skus {
            let calc = StockCalculator::new(sku, ledger)?;
            out.insert(sku.clone(), calc.stock_asof(date)?);
        }
        Ok(out)
    }

    /// True if, on `day`, the SKU was out of assortment, had on_hand = 0 for
    /// the full day (strict OOS), on_hand + on_order = 0 (relaxed OOS), or
    /// carried an explicit `OOS_ESTIMATE_OVERRIDE` note. Such days are
    /// dropped from demand averages and forecast-accuracy residuals.
    pub fn is_day_censored(&self, day: NaiveDate) -> CoreResult<bool> {
        if self.is_assortment_out(day) {
            return Ok(true);
        }
        for t in &self.events {
            if t.date == day && t.is_oos_estimate_override() {
                return Ok(true);
            }
        }
        let stock = self.stock_asof(day)?;
        Ok(stock.on_hand == 0 || stock.on_hand + stock.on_order == 0)
    }

    /// Remaining on-order quantity as of `asof`, bucketed by expected
    /// receipt date, derived by FIFO consumption of ORDER events against
    /// RECEIPT/UNFULFILLED events (spec §3's "implicit FIFO allocation").
    pub fn pending_receipts_asof(&self, asof: NaiveDate) -> Vec<(f64, NaiveDate)> {
        let mut queue: Vec<(f64, NaiveDate)> = Vec::new();
        for t in self.events.iter().take_while(|t| t.date <= asof) {
            match t.event {
                EventType::Order => {
                    let receipt_date = t.receipt_date.unwrap_or(t.date);
                    queue.push((t.qty.max(0) as f64, receipt_date));
                }
                EventType::Receipt | EventType::Unfulfilled => {
                    let mut remaining = t.qty.max(0) as f64;
                    for entry in queue.iter_mut() {
                        if remaining <= 0.0 {
                            break;
                        }
                        let take = entry.0.min(remaining);
                        entry.0 -= take;
                        remaining -= take;
                    }
                }
                _ => {}
            }
        }
        queue.into_iter().filter(|(qty, _)| *qty > 0.0).collect()
    }

    fn is_assortment_out(&self, day: NaiveDate) -> bool {
        let mut out = false;
        for t in self.events.iter().take_while(|t| t.date <= day) {
            match t.event {
                EventType::AssortmentOut => out = true,
                EventType::AssortmentIn => out = false,
                _ => {}
            }
        }
        out
    }
}

fn apply_event(stock: &mut Stock, t: &Transaction, sku: &str) -> CoreResult<()> {
    match t.event {
        EventType::Snapshot => {
            stock.on_hand = non_negative(t.qty, sku, "SNAPSHOT qty must be non-negative")?;
        }
        EventType::Adjust => {
            stock.on_hand = non_negative(t.qty, sku, "ADJUST qty must be non-negative")?;
        }
        EventType::Sale | EventType::Waste => {
            let qty = non_negative(t.qty, sku, "SALE/WASTE qty must be non-negative")?;
            stock.on_hand = stock.on_hand.saturating_sub(qty);
        }
        EventType::Order => {
            let qty = non_negative(t.qty, sku, "ORDER qty must be non-negative")?;
            stock.on_order += qty;
        }
        EventType::Receipt => {
            let qty = non_negative(t.qty, sku, "RECEIPT qty must be non-negative")?;
            stock.on_order = stock.on_order.saturating_sub(qty);
            stock.on_hand += qty;
        }
        EventType::Unfulfilled => {
            let qty = non_negative(t.qty, sku, "UNFULFILLED qty must be non-negative")?;
            stock.on_order = stock.on_order.saturating_sub(qty);
            stock.unfulfilled_qty += qty;
        }
        EventType::AssortmentIn | EventType::AssortmentOut => {}
    }
    Ok(())
}

fn non_negative(qty: i64, sku: &str, reason: &str) -> CoreResult<u32> {
    if qty < 0 {
        return Err(CoreError::InvalidLedger {
            sku: sku.to_string(),
            reason: reason.to_string(),
        });
    }
    Ok(qty as u32)
}
