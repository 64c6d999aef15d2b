//! Data layer for the LEDSense device state API (`PostgreSQL`).
//!
//! Four append-only tables hold the system's state: LED readings
//! (`accion_led`), sensor readings (`accion_sensor`), the action history
//! (`historial`) and login accounts (`usuario`).
//!
//! # Architecture
//!
//! ```text
//! HTTP handler
//!     |
//!     +-- DeviceStore (trait)
//!         |-- PgDeviceStore --> QueryExecutor --> PostgresPool
//!         +-- MemoryStore   (in-process, tests)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- bounded, lazily connected `PostgreSQL` pool
//! - [`executor`] -- one statement per call, rows as column maps
//! - [`store`] -- the [`DeviceStore`] trait and its record types
//! - [`pg_store`] -- `PostgreSQL` implementation of [`DeviceStore`]
//! - [`memory`] -- in-memory implementation of [`DeviceStore`]
//! - [`error`] -- Shared error types

pub mod error;
pub mod executor;
pub mod memory;
pub mod pg_store;
pub mod postgres;
pub mod store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use executor::{QueryExecutor, QueryOutcome, Row, SqlParam, Statement, is_truthy};
pub use memory::MemoryStore;
pub use pg_store::PgDeviceStore;
pub use postgres::{PoolLimits, PostgresPool};
pub use store::{
    DeviceStore, HISTORY_LIMIT, HistoryEntry, LedState, NewStates, RecordedStates, SensorState,
    UserCredentials,
};
