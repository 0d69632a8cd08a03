//! Reorder decision core: calendar resolution, forecast, demand modifiers,
//! reorder policy and constraints, assembled per SKU into an explainable
//! order proposal. A deterministic decision pipeline, not a service — the
//! core does no I/O and owns no shared state; `repository` and `workflows`
//! are the narrow collaborators that do.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod constraints;
pub mod domain;
pub mod error;
pub mod explain;
pub mod facade;
pub mod forecast;
pub mod ledger;
pub mod modifiers;
pub mod policy;
pub mod repository;
pub mod workflows;

pub use error::{CoreError, CoreResult};
pub use facade::{explain_order, propose_order_for_sku, propose_orders_batch, DecisionInputs};
