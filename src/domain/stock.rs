//! Derived stock snapshot. Never stored as ground truth — always folded
//! fresh from the ledger (see `crate::ledger`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub on_hand: u32,
    pub on_order: u32,
    pub unfulfilled_qty: u32,
    pub asof_date: NaiveDate,
}

impl Stock {
    pub fn empty(asof_date: NaiveDate) -> Self {
        Self {
            on_hand: 0,
            on_order: 0,
            unfulfilled_qty: 0,
            asof_date,
        }
    }
}
