//! Durable order records.
//!
//! [`OrderStore`] is the seam the lifecycle engine writes through. Two
//! backends are provided: [`InMemoryOrderStore`] for tests and local runs, and
//! [`SqliteOrderStore`] backed by sqlx.

pub mod sqlite_store;
pub mod store;

pub use sqlite_store::SqliteOrderStore;
pub use store::{InMemoryOrderStore, OrderRecord, OrderStore, StatusTransition, StoreError};
