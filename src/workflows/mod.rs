//! Ledger-mutating workflows: order confirmation and receiving close.
//!
//! Unlike `facade`, which isolates one SKU's failure from the rest of a
//! batch, these touch shared state (the ledger, the order log) and so
//! propagate `CoreError` to their caller rather than folding it away.

pub mod order;
pub mod receiving;
