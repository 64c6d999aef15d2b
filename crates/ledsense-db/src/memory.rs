//! In-process [`DeviceStore`] for tests and local runs without a database.
//!
//! Mirrors the `PostgreSQL` semantics: append-only tables, latest row wins,
//! history newest first. Every trait call is counted so tests can assert
//! that a request never reached the store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;

use crate::error::DbError;
use crate::executor::Row;
use crate::store::{
    DeviceStore, HistoryEntry, LedState, NewStates, RecordedStates, SensorState, UserCredentials,
};

#[derive(Debug, Default)]
struct Tables {
    leds: Vec<LedState>,
    sensors: Vec<SensorState>,
    history: Vec<HistoryEntry>,
    users: Vec<(String, UserCredentials)>,
}

/// A [`DeviceStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent operation fail with [`DbError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn enter(&self) -> Result<(), DbError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable(String::from("memory store marked down")));
        }
        Ok(())
    }
}

fn next_id(len: usize) -> i64 {
    i64::try_from(len).map_or(i64::MAX, |n| n.saturating_add(1))
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn latest_led_state(&self) -> Result<Option<LedState>, DbError> {
        self.enter()?;
        Ok(self.tables.lock().await.leds.last().cloned())
    }

    async fn latest_sensor_state(&self) -> Result<Option<SensorState>, DbError> {
        self.enter()?;
        Ok(self.tables.lock().await.sensors.last().cloned())
    }

    async fn record_states(&self, states: NewStates) -> Result<RecordedStates, DbError> {
        self.enter()?;
        let now = Utc::now().to_rfc3339();
        let mut tables = self.tables.lock().await;
        tables.leds.push(LedState {
            led1: states.led1,
            led2: states.led2,
            led3: states.led3,
            recorded_by: states.user_id,
            recorded_at: Some(now.clone()),
        });
        tables.sensors.push(SensorState {
            sensor_active: states.sensor_active,
            obstacle: states.obstacle,
            recorded_by: states.user_id,
            recorded_at: Some(now),
        });
        Ok(RecordedStates {
            led_id: next_id(tables.leds.len().saturating_sub(1)),
            sensor_id: next_id(tables.sensors.len().saturating_sub(1)),
        })
    }

    async fn recent_history(&self, limit: i64) -> Result<Vec<HistoryEntry>, DbError> {
        self.enter()?;
        let take = usize::try_from(limit).unwrap_or(0);
        let tables = self.tables.lock().await;
        Ok(tables.history.iter().rev().take(take).cloned().collect())
    }

    async fn record_history(
        &self,
        user_id: Option<i64>,
        action: Option<&str>,
    ) -> Result<i64, DbError> {
        self.enter()?;
        let mut tables = self.tables.lock().await;
        let id = next_id(tables.history.len());
        tables.history.push(HistoryEntry {
            id,
            user_id,
            action: action.map(str::to_owned),
            recorded_at: Some(Utc::now().to_rfc3339()),
        });
        Ok(id)
    }

    async fn find_user(&self, name: &str) -> Result<Option<UserCredentials>, DbError> {
        self.enter()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|(nombre, _)| nombre == name)
            .map(|(_, credentials)| credentials.clone()))
    }

    async fn create_user(&self, name: &str, password_hash: &str) -> Result<i64, DbError> {
        self.enter()?;
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|(nombre, _)| nombre == name) {
            return Err(DbError::Decode(format!("user {name} already exists")));
        }
        let id = next_id(tables.users.len());
        tables.users.push((
            name.to_owned(),
            UserCredentials {
                id,
                password_hash: password_hash.to_owned(),
            },
        ));
        Ok(id)
    }

    async fn ping(&self) -> Result<Vec<Row>, DbError> {
        self.enter()?;
        let mut row = Row::new();
        row.insert(String::from("test"), json!(1));
        Ok(vec![row])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latest_state_is_last_recorded() {
        let store = MemoryStore::new();
        assert!(store.latest_led_state().await.unwrap().is_none());

        store
            .record_states(NewStates {
                led1: true,
                ..NewStates::default()
            })
            .await
            .unwrap();
        let ids = store
            .record_states(NewStates {
                led2: true,
                obstacle: true,
                user_id: Some(7),
                ..NewStates::default()
            })
            .await
            .unwrap();

        assert_eq!(ids.led_id, 2);
        let led = store.latest_led_state().await.unwrap().unwrap();
        assert!(!led.led1);
        assert!(led.led2);
        assert_eq!(led.recorded_by, Some(7));
        let sensor = store.latest_sensor_state().await.unwrap().unwrap();
        assert!(sensor.obstacle);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        for i in 0..25 {
            let action = format!("accion {i}");
            store.record_history(Some(1), Some(&action)).await.unwrap();
        }

        let history = store.recent_history(20).await.unwrap();
        assert_eq!(history.len(), 20);
        assert_eq!(history.first().unwrap().action.as_deref(), Some("accion 24"));
        assert_eq!(history.last().unwrap().action.as_deref(), Some("accion 5"));
    }

    #[tokio::test]
    async fn unavailable_store_fails_and_counts() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.ping().await, Err(DbError::Unavailable(_))));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn duplicate_user_names_are_rejected() {
        let store = MemoryStore::new();
        let id = store.create_user("carlos", "$argon2id$x").await.unwrap();
        assert_eq!(id, 1);
        assert!(store.create_user("carlos", "$argon2id$y").await.is_err());
        let found = store.find_user("carlos").await.unwrap().unwrap();
        assert_eq!(found.password_hash, "$argon2id$x");
    }
}
