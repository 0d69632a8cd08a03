//! Event uplift rules: keyed by (delivery_date, scope_type, scope_key).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord)]
pub enum ScopeType {
    /// Most specific first, used for rule-resolution priority.
    Sku,
    Category,
    Department,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventUpliftRule {
    pub delivery_date: NaiveDate,
    pub scope_type: ScopeType,
    /// Empty for `ScopeType::All`.
    pub scope_key: String,
    pub reason: String,
    pub strength: f64,
    pub notes: String,
}

impl EventUpliftRule {
    pub fn matches(&self, delivery_date: NaiveDate, sku: &str, category: &str, department: &str) -> bool {
        if self.delivery_date != delivery_date {
            return false;
        }
        match self.scope_type {
            ScopeType::Sku => self.scope_key == sku,
            ScopeType::Category => self.scope_key == category,
            ScopeType::Department => self.scope_key == department,
            ScopeType::All => true,
        }
    }
}

/// Find the rule matching `delivery_date` for the given SKU/category/
/// department, preferring the most specific scope (sku > category >
/// department > ALL), per spec §4.4.
pub fn most_specific_match<'a>(
    rules: &'a [EventUpliftRule],
    delivery_date: NaiveDate,
    sku: &str,
    category: &str,
    department: &str,
) -> Option<&'a EventUpliftRule> {
    let mut candidates: Vec<&EventUpliftRule> = rules
        .iter()
        .filter(|r| r.matches(delivery_date, sku, category, department))
        .collect();
    candidates.sort_by_key(|r| r.scope_type);
    candidates.into_iter().next()
}
