//! The device state store interface.
//!
//! [`DeviceStore`] is the seam between the HTTP handlers and persistence.
//! [`PgDeviceStore`](crate::PgDeviceStore) backs it with `PostgreSQL`;
//! [`MemoryStore`](crate::MemoryStore) keeps everything in process for
//! tests and local runs.
//!
//! All four tables are append-only. The "current" LED or sensor state is
//! the most recently recorded row.

use async_trait::async_trait;

use crate::error::DbError;
use crate::executor::Row;

/// Maximum number of history entries returned by a listing.
pub const HISTORY_LIMIT: i64 = 20;

/// A recorded LED state (`accion_led`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedState {
    /// LED 1 on/off.
    pub led1: bool,
    /// LED 2 on/off.
    pub led2: bool,
    /// LED 3 on/off.
    pub led3: bool,
    /// The user who recorded the state, if known.
    pub recorded_by: Option<i64>,
    /// ISO-8601 recording timestamp.
    pub recorded_at: Option<String>,
}

/// A recorded sensor state (`accion_sensor`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorState {
    /// Whether the sensor is active.
    pub sensor_active: bool,
    /// Whether an obstacle was detected.
    pub obstacle: bool,
    /// The user who recorded the state, if known.
    pub recorded_by: Option<i64>,
    /// ISO-8601 recording timestamp.
    pub recorded_at: Option<String>,
}

/// A new LED + sensor reading, written as one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NewStates {
    /// LED 1 on/off.
    pub led1: bool,
    /// LED 2 on/off.
    pub led2: bool,
    /// LED 3 on/off.
    pub led3: bool,
    /// Whether the sensor is active.
    pub sensor_active: bool,
    /// Whether an obstacle was detected.
    pub obstacle: bool,
    /// The recording user. `None` is stored as `NULL`.
    pub user_id: Option<i64>,
}

/// Identifiers generated by [`DeviceStore::record_states`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedStates {
    /// Row id in `accion_led`.
    pub led_id: i64,
    /// Row id in `accion_sensor`.
    pub sensor_id: i64,
}

/// A row of `historial`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Row id.
    pub id: i64,
    /// The acting user, if recorded.
    pub user_id: Option<i64>,
    /// Free-text action description.
    pub action: Option<String>,
    /// ISO-8601 timestamp.
    pub recorded_at: Option<String>,
}

/// Login lookup result for a `usuario` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    /// User id.
    pub id: i64,
    /// PHC-format password hash.
    pub password_hash: String,
}

/// Persistence operations needed by the API.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// The most recent LED state, or `None` when nothing was recorded.
    async fn latest_led_state(&self) -> Result<Option<LedState>, DbError>;

    /// The most recent sensor state, or `None` when nothing was recorded.
    async fn latest_sensor_state(&self) -> Result<Option<SensorState>, DbError>;

    /// Record an LED row and a sensor row atomically.
    async fn record_states(&self, states: NewStates) -> Result<RecordedStates, DbError>;

    /// Up to `limit` history entries, newest first.
    async fn recent_history(&self, limit: i64) -> Result<Vec<HistoryEntry>, DbError>;

    /// Append a history entry stamped with the current server time.
    async fn record_history(
        &self,
        user_id: Option<i64>,
        action: Option<&str>,
    ) -> Result<i64, DbError>;

    /// Look up a user by exact name.
    async fn find_user(&self, name: &str) -> Result<Option<UserCredentials>, DbError>;

    /// Create a user with an already-hashed password. Returns the new id.
    async fn create_user(&self, name: &str, password_hash: &str) -> Result<i64, DbError>;

    /// Run a trivial query to confirm connectivity.
    async fn ping(&self) -> Result<Vec<Row>, DbError>;
}
