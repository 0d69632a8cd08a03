//! Persistence boundary: the `Repository` trait, and one concrete
//! `CsvRepository` implementation (CSV rows, JSON settings), built on
//! `csv::Writer::from_path` plus `serde` row structs for both directions
//! (read and write), since the core needs collaborators for every
//! collection it consumes, not just one output log.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::Holiday;
use crate::config::SettingsTree;
use crate::domain::sku::{DemandVariability, ForecastMethodName, MonteCarloOverrides, OosPopupPreference, PolicyMode};
use crate::domain::{
    EventUpliftRule, OrderExplain, OrderLog, OrderProposal, PromoWindow, ReceivingLog, SalesRecord, Sku,
    Transaction,
};

/// Flat CSV row for `Sku`: the `csv` crate requires one scalar column per
/// field, so `monte_carlo_overrides` is spread into three plain columns
/// rather than nested.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SkuRow {
    sku: String,
    description: String,
    ean: Option<String>,
    in_assortment: bool,
    department: String,
    category: String,
    pack_size: u32,
    moq: u32,
    lead_time_days: u32,
    review_period: u32,
    safety_stock: u32,
    max_stock: u32,
    reorder_point: u32,
    shelf_life_days: u32,
    has_expiry_label: bool,
    demand_variability: DemandVariability,
    target_csl: f64,
    forecast_method_override: Option<ForecastMethodName>,
    policy_mode_override: Option<PolicyMode>,
    mc_distribution: Option<String>,
    mc_n_simulations: Option<u32>,
    mc_random_seed: Option<u64>,
    oos_popup_preference: OosPopupPreference,
}

impl From<&Sku> for SkuRow {
    fn from(s: &Sku) -> Self {
        Self {
            sku: s.sku.clone(),
            description: s.description.clone(),
            ean: s.ean.clone(),
            in_assortment: s.in_assortment,
            department: s.department.clone(),
            category: s.category.clone(),
            pack_size: s.pack_size,
            moq: s.moq,
            lead_time_days: s.lead_time_days,
            review_period: s.review_period,
            safety_stock: s.safety_stock,
            max_stock: s.max_stock,
            reorder_point: s.reorder_point,
            shelf_life_days: s.shelf_life_days,
            has_expiry_label: s.has_expiry_label,
            demand_variability: s.demand_variability,
            target_csl: s.target_csl,
            forecast_method_override: s.forecast_method_override,
            policy_mode_override: s.policy_mode_override,
            mc_distribution: s.monte_carlo_overrides.distribution.clone(),
            mc_n_simulations: s.monte_carlo_overrides.n_simulations,
            mc_random_seed: s.monte_carlo_overrides.random_seed,
            oos_popup_preference: s.oos_popup_preference,
        }
    }
}

impl From<SkuRow> for Sku {
    fn from(r: SkuRow) -> Self {
        Self {
            sku: r.sku,
            description: r.description,
            ean: r.ean,
            in_assortment: r.in_assortment,
            department: r.department,
            category: r.category,
            pack_size: r.pack_size,
            moq: r.moq,
            lead_time_days: r.lead_time_days,
            review_period: r.review_period,
            safety_stock: r.safety_stock,
            max_stock: r.max_stock,
            reorder_point: r.reorder_point,
            shelf_life_days: r.shelf_life_days,
            has_expiry_label: r.has_expiry_label,
            demand_variability: r.demand_variability,
            target_csl: r.target_csl,
            forecast_method_override: r.forecast_method_override,
            policy_mode_override: r.policy_mode_override,
            monte_carlo_overrides: MonteCarloOverrides {
                distribution: r.mc_distribution,
                n_simulations: r.mc_n_simulations,
                random_seed: r.mc_random_seed,
            },
            oos_popup_preference: r.oos_popup_preference,
        }
    }
}

/// Flat CSV row for `ReceivingLog`: `allocated_order_ids` is joined with
/// `;` rather than stored as a sequence column.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReceivingLogRow {
    document_id: String,
    date: chrono::NaiveDate,
    sku: String,
    qty_received: u32,
    allocated_order_ids: String,
}

impl From<&ReceivingLog> for ReceivingLogRow {
    fn from(r: &ReceivingLog) -> Self {
        Self {
            document_id: r.document_id.clone(),
            date: r.date,
            sku: r.sku.clone(),
            qty_received: r.qty_received,
            allocated_order_ids: r.allocated_order_ids.join(";"),
        }
    }
}

impl From<ReceivingLogRow> for ReceivingLog {
    fn from(r: ReceivingLogRow) -> Self {
        Self {
            document_id: r.document_id,
            date: r.date,
            sku: r.sku,
            qty_received: r.qty_received,
            allocated_order_ids: if r.allocated_order_ids.is_empty() {
                Vec::new()
            } else {
                r.allocated_order_ids.split(';').map(str::to_string).collect()
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("io error reading/writing {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("csv error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
    #[error("settings json error in {path}: {source}")]
    Json { path: String, source: serde_json::Error },
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<RepoError> for crate::error::CoreError {
    fn from(err: RepoError) -> Self {
        crate::error::CoreError::Repository { reason: err.to_string() }
    }
}

/// The narrow set of read operations the core consumes, plus the writers
/// the workflows need, per spec §6. No storage format is mandated by the
/// core itself — only `CsvRepository` is shipped.
pub trait Repository {
    fn read_skus(&self) -> RepoResult<Vec<Sku>>;
    fn read_transactions(&self) -> RepoResult<Vec<Transaction>>;
    fn read_sales(&self) -> RepoResult<Vec<SalesRecord>>;
    fn read_promo_calendar(&self) -> RepoResult<Vec<PromoWindow>>;
    fn read_event_uplift_rules(&self) -> RepoResult<Vec<EventUpliftRule>>;
    fn read_settings(&self) -> RepoResult<SettingsTree>;
    fn read_holidays(&self) -> RepoResult<Vec<Holiday>>;
    fn read_order_log(&self) -> RepoResult<Vec<OrderLog>>;
    fn read_receiving_log(&self) -> RepoResult<Vec<ReceivingLog>>;
    /// Substitute groups for cannibalisation (spec §4.4): group id -> member
    /// SKUs. Not part of the spec's enumerated repository read list, but
    /// needed by the same narrow-interface contract; stored alongside
    /// holidays as a JSON document since it is a small, rarely-edited table.
    fn read_substitute_groups(&self) -> RepoResult<Vec<Vec<String>>>;

    fn append_transaction(&self, transaction: &Transaction) -> RepoResult<()>;
    fn append_order_log(&self, order: &OrderLog) -> RepoResult<()>;
    fn append_receiving_log(&self, receiving: &ReceivingLog) -> RepoResult<()>;
    fn write_explains(&self, explains: &[OrderExplain]) -> RepoResult<()>;
    fn write_proposals(&self, proposals: &[OrderProposal]) -> RepoResult<()>;
}

/// CSV-backed repository, one file per collection under `base_dir`, with
/// settings stored as a single JSON document (spec §6: "CSV with JSON
/// settings").
pub struct CsvRepository {
    base_dir: PathBuf,
}

impl CsvRepository {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn read_csv<T: serde::de::DeserializeOwned>(&self, name: &str) -> RepoResult<Vec<T>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&path).map_err(|e| RepoError::Csv { path: display(&path), source: e })?;
        reader
            .deserialize()
            .collect::<Result<Vec<T>, csv::Error>>()
            .map_err(|e| RepoError::Csv { path: display(&path), source: e })
    }

    fn write_csv<T: serde::Serialize>(&self, name: &str, rows: &[T]) -> RepoResult<()> {
        let path = self.path(name);
        let mut writer = csv::Writer::from_path(&path).map_err(|e| RepoError::Csv { path: display(&path), source: e })?;
        for row in rows {
            writer.serialize(row).map_err(|e| RepoError::Csv { path: display(&path), source: e })?;
        }
        writer.flush().map_err(|e| RepoError::Io { path: display(&path), source: e })?;
        Ok(())
    }

    fn append_csv<T: serde::Serialize>(&self, name: &str, row: &T) -> RepoResult<()> {
        let path = self.path(name);
        let needs_header = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RepoError::Io { path: display(&path), source: e })?;
        let mut writer = csv::WriterBuilder::new().has_headers(needs_header).from_writer(file);
        writer.serialize(row).map_err(|e| RepoError::Csv { path: display(&path), source: e })?;
        writer.flush().map_err(|e| RepoError::Io { path: display(&path), source: e })?;
        Ok(())
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl Repository for CsvRepository {
    fn read_skus(&self) -> RepoResult<Vec<Sku>> {
        let rows: Vec<SkuRow> = self.read_csv("skus.csv")?;
        Ok(rows.into_iter().map(Sku::from).collect())
    }

    fn read_transactions(&self) -> RepoResult<Vec<Transaction>> {
        self.read_csv("ledger.csv")
    }

    fn read_sales(&self) -> RepoResult<Vec<SalesRecord>> {
        self.read_csv("sales.csv")
    }

    fn read_promo_calendar(&self) -> RepoResult<Vec<PromoWindow>> {
        self.read_csv("promo_calendar.csv")
    }

    fn read_event_uplift_rules(&self) -> RepoResult<Vec<EventUpliftRule>> {
        self.read_csv("event_uplift_rules.csv")
    }

    fn read_settings(&self) -> RepoResult<SettingsTree> {
        let path = self.path("settings.json");
        if !path.exists() {
            return Ok(SettingsTree::defaults());
        }
        let file = File::open(&path).map_err(|e| RepoError::Io { path: display(&path), source: e })?;
        serde_json::from_reader(file).map_err(|e| RepoError::Json { path: display(&path), source: e })
    }

    fn read_holidays(&self) -> RepoResult<Vec<Holiday>> {
        let path = self.path("holidays.json");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).map_err(|e| RepoError::Io { path: display(&path), source: e })?;
        serde_json::from_reader(file).map_err(|e| RepoError::Json { path: display(&path), source: e })
    }

    fn read_order_log(&self) -> RepoResult<Vec<OrderLog>> {
        self.read_csv("order_log.csv")
    }

    fn read_receiving_log(&self) -> RepoResult<Vec<ReceivingLog>> {
        let rows: Vec<ReceivingLogRow> = self.read_csv("receiving_log.csv")?;
        Ok(rows.into_iter().map(ReceivingLog::from).collect())
    }

    fn read_substitute_groups(&self) -> RepoResult<Vec<Vec<String>>> {
        let path = self.path("substitute_groups.json");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).map_err(|e| RepoError::Io { path: display(&path), source: e })?;
        serde_json::from_reader(file).map_err(|e| RepoError::Json { path: display(&path), source: e })
    }

    fn append_transaction(&self, transaction: &Transaction) -> RepoResult<()> {
        self.append_csv("ledger.csv", transaction)
    }

    fn append_order_log(&self, order: &OrderLog) -> RepoResult<()> {
        self.append_csv("order_log.csv", order)
    }

    fn append_receiving_log(&self, receiving: &ReceivingLog) -> RepoResult<()> {
        self.append_csv("receiving_log.csv", &ReceivingLogRow::from(receiving))
    }

    fn write_explains(&self, explains: &[OrderExplain]) -> RepoResult<()> {
        let path = self.path("order_explain.csv");
        let mut writer = csv::Writer::from_path(&path).map_err(|e| RepoError::Csv { path: display(&path), source: e })?;
        writer
            .write_record(crate::explain::CSV_COLUMNS)
            .map_err(|e| RepoError::Csv { path: display(&path), source: e })?;
        for explain in explains {
            writer
                .write_record(crate::explain::to_row(explain))
                .map_err(|e| RepoError::Csv { path: display(&path), source: e })?;
        }
        writer.flush().map_err(|e| RepoError::Io { path: display(&path), source: e })?;
        Ok(())
    }

    fn write_proposals(&self, proposals: &[OrderProposal]) -> RepoResult<()> {
        self.write_csv("order_proposals.csv", proposals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventType, Transaction};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn missing_collections_read_as_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        assert!(repo.read_skus().unwrap().is_empty());
        assert!(repo.read_transactions().unwrap().is_empty());
        let settings = repo.read_settings().unwrap();
        assert_eq!(settings.get_u32("reorder_engine", "lead_time_days", 7), 7);
    }

    #[test]
    fn append_then_read_round_trips_a_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let t = Transaction::new(d(2026, 1, 1), "SKU1", EventType::Snapshot, 10);
        repo.append_transaction(&t).unwrap();
        repo.append_transaction(&Transaction::new(d(2026, 1, 2), "SKU1", EventType::Sale, 3)).unwrap();
        let rows = repo.read_transactions().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].qty, 3);
    }

    #[test]
    fn missing_substitute_groups_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        assert!(repo.read_substitute_groups().unwrap().is_empty());
    }

    #[test]
    fn write_explains_renders_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CsvRepository::new(dir.path());
        let explain = OrderExplain::failed("SKU1", d(2026, 1, 1), "boom");
        repo.write_explains(std::slice::from_ref(&explain)).unwrap();
        let content = std::fs::read_to_string(dir.path().join("order_explain.csv")).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap().split(',').count(), crate::explain::CSV_COLUMNS.len());
        assert!(lines.next().unwrap().contains("boom"));
    }
}
