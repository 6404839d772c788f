/// Database model definitions.
pub mod models;
/// Persistence abstraction for runs, events, and hourly aggregates.
pub mod run_store;
/// Storage abstraction layer for database operations.
pub mod storage;
