#![forbid(unsafe_code)]

//! SQLite persistence for the revision index: schema, batched writes,
//! per-revision transactions and point-in-time lookups.

mod store;

pub use store::*;
