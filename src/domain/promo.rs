//! Promo calendar: windows during which a SKU (optionally at a specific
//! store) is on promotion. Overlapping windows for the same (sku, store)
//! are merged when inserted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoWindow {
    pub sku: String,
    pub start_date: NaiveDate,
    /// Inclusive.
    pub end_date: NaiveDate,
    pub store_id: Option<String>,
}

impl PromoWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// Insert a window into `windows`, merging it with any existing window for
/// the same (sku, store_id) pair that overlaps or is adjacent (gap <= 0
/// days, i.e. touching).
pub fn insert_merged(windows: &mut Vec<PromoWindow>, new_window: PromoWindow) {
    if let Some(existing) = windows.iter_mut().find(|w| {
        w.sku == new_window.sku
            && w.store_id == new_window.store_id
            && overlaps_or_touches(w, &new_window)
    }) {
        existing.start_date = existing.start_date.min(new_window.start_date);
        existing.end_date = existing.end_date.max(new_window.end_date);
        return;
    }
    windows.push(new_window);
}

fn overlaps_or_touches(a: &PromoWindow, b: &PromoWindow) -> bool {
    a.start_date <= b.end_date && b.start_date <= a.end_date
}
