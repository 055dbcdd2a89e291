//! Database Module
//!
//! The account store seam, its PostgreSQL and in-memory implementations, the
//! transaction executor and connection management.

pub mod connection;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod transaction;

// Re-export commonly used types
pub use connection::{DatabaseConfig, DatabasePool};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{AccountStore, Conflicts, StoreError, StoreResult, StoreTx};
pub use transaction::{execute_in_tx, execute_store_tx};
