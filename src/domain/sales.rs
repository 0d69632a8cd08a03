//! Per-day demand observations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub sku: String,
    pub qty_sold: f64,
    pub promo_flag: Option<bool>,
}
