//! Volatile in-process implementation of the run store.
//!
//! Backs unit tests and store-less local deployments. A single mutex around
//! the whole dataset gives the same atomicity the MongoDB backend gets from
//! per-document conditional updates.

mod store;

pub use store::MemoryRunStore;
