//! Core value types: SKU master data, stock snapshots, ledger transactions,
//! sales history, promo calendars, event uplift rules and order logs.

pub mod event_rule;
pub mod order_log;
pub mod promo;
pub mod sales;
pub mod sku;
pub mod stock;
pub mod transaction;

pub use event_rule::{most_specific_match, EventUpliftRule, ScopeType};
pub use order_log::{OrderExplain, OrderLog, OrderProposal, OrderStatus, ReceivingLog};
pub use promo::{insert_merged, PromoWindow};
pub use sales::SalesRecord;
pub use sku::{
    validate_ean, DemandVariability, ForecastMethodName, MonteCarloOverrides, OosPopupPreference,
    PolicyMode, Sku,
};
pub use stock::Stock;
pub use transaction::{EventType, Transaction};
