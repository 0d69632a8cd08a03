//! Append-only ledger events.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Snapshot,
    Sale,
    Receipt,
    Order,
    Waste,
    Adjust,
    Unfulfilled,
    AssortmentIn,
    AssortmentOut,
}

impl EventType {
    /// Fold rank within a single day: SNAPSHOT/ADJUST (absolute sets) before
    /// everything else (deltas), per spec §4.1.
    pub fn fold_rank(&self) -> u8 {
        match self {
            EventType::Snapshot | EventType::Adjust => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub sku: String,
    pub event: EventType,
    /// Signed for ADJUST (absolute target), magnitude for everything else.
    pub qty: i64,
    pub receipt_date: Option<NaiveDate>,
    pub note: String,
}

impl Transaction {
    pub fn new(date: NaiveDate, sku: impl Into<String>, event: EventType, qty: i64) -> Self {
        Self {
            date,
            sku: sku.into(),
            event,
            qty,
            receipt_date: None,
            note: String::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_receipt_date(mut self, receipt_date: NaiveDate) -> Self {
        self.receipt_date = Some(receipt_date);
        self
    }

    pub fn is_oos_estimate_override(&self) -> bool {
        self.note.contains("OOS_ESTIMATE_OVERRIDE")
    }
}
