//! `PostgreSQL` implementation of [`DeviceStore`].
//!
//! Every method is one statement through [`QueryExecutor`], except
//! [`record_states`](DeviceStore::record_states) which writes both state
//! tables in a single transaction.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DbError;
use crate::executor::{QueryExecutor, QueryOutcome, Row, SqlParam, Statement, is_truthy};
use crate::postgres::PostgresPool;
use crate::store::{
    DeviceStore, HistoryEntry, LedState, NewStates, RecordedStates, SensorState, UserCredentials,
};

const LATEST_LED: &str = r#"SELECT estadoled1, estadoled2, estadoled3, "user", fechahoraregistro
    FROM accion_led
    ORDER BY fechahoraregistro DESC, id DESC
    LIMIT 1"#;

const LATEST_SENSOR: &str = r#"SELECT estadosensor, estado_obstaculo, "user", fechahoraregistro
    FROM accion_sensor
    ORDER BY fechahoraregistro DESC, id DESC
    LIMIT 1"#;

const INSERT_LED: &str = r#"INSERT INTO accion_led (estadoled1, estadoled2, estadoled3, "user")
    VALUES ($1, $2, $3, $4)
    RETURNING id"#;

const INSERT_SENSOR: &str = r#"INSERT INTO accion_sensor (estadosensor, estado_obstaculo, "user")
    VALUES ($1, $2, $3)
    RETURNING id"#;

const RECENT_HISTORY: &str = r"SELECT id, user_id, accion, fechahora
    FROM historial
    ORDER BY fechahora DESC, id DESC
    LIMIT $1";

const INSERT_HISTORY: &str = r"INSERT INTO historial (user_id, accion, fechahora)
    VALUES ($1, $2, NOW())
    RETURNING id";

const FIND_USER: &str = r#"SELECT id, "contraseña" AS password_hash
    FROM usuario
    WHERE nombre = $1
    LIMIT 1"#;

const INSERT_USER: &str = r#"INSERT INTO usuario (nombre, "contraseña")
    VALUES ($1, $2)
    RETURNING id"#;

const PING: &str = "SELECT 1 AS test";

/// [`DeviceStore`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgDeviceStore {
    executor: QueryExecutor,
}

impl PgDeviceStore {
    /// Create a store over an existing pool.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            executor: QueryExecutor::new(pool.pool().clone()),
        }
    }

    async fn first_row(&self, sql: &str, params: &[SqlParam]) -> Result<Option<Row>, DbError> {
        Ok(self.executor.fetch(sql, params).await?.into_iter().next())
    }

    async fn insert(&self, sql: &str, params: &[SqlParam]) -> Result<i64, DbError> {
        match self.executor.execute(sql, params).await? {
            QueryOutcome::Written(id) => Ok(id),
            QueryOutcome::Rows(_) => Err(DbError::Decode(String::from(
                "write statement was classified as a read",
            ))),
        }
    }
}

#[async_trait]
impl DeviceStore for PgDeviceStore {
    async fn latest_led_state(&self) -> Result<Option<LedState>, DbError> {
        Ok(self.first_row(LATEST_LED, &[]).await?.map(|row| LedState {
            led1: flag(&row, "estadoled1"),
            led2: flag(&row, "estadoled2"),
            led3: flag(&row, "estadoled3"),
            recorded_by: int(&row, "user"),
            recorded_at: text(&row, "fechahoraregistro"),
        }))
    }

    async fn latest_sensor_state(&self) -> Result<Option<SensorState>, DbError> {
        Ok(self
            .first_row(LATEST_SENSOR, &[])
            .await?
            .map(|row| SensorState {
                sensor_active: flag(&row, "estadosensor"),
                obstacle: flag(&row, "estado_obstaculo"),
                recorded_by: int(&row, "user"),
                recorded_at: text(&row, "fechahoraregistro"),
            }))
    }

    async fn record_states(&self, states: NewStates) -> Result<RecordedStates, DbError> {
        let statements = [
            Statement::new(INSERT_LED)
                .bind(SqlParam::flag(states.led1))
                .bind(SqlParam::flag(states.led2))
                .bind(SqlParam::flag(states.led3))
                .bind(SqlParam::BigInt(states.user_id)),
            Statement::new(INSERT_SENSOR)
                .bind(SqlParam::flag(states.sensor_active))
                .bind(SqlParam::flag(states.obstacle))
                .bind(SqlParam::BigInt(states.user_id)),
        ];
        let ids = self.executor.execute_all(&statements).await?;
        match ids.as_slice() {
            [led_id, sensor_id] => Ok(RecordedStates {
                led_id: *led_id,
                sensor_id: *sensor_id,
            }),
            other => Err(DbError::Decode(format!(
                "expected 2 generated ids, got {}",
                other.len()
            ))),
        }
    }

    async fn recent_history(&self, limit: i64) -> Result<Vec<HistoryEntry>, DbError> {
        let rows = self
            .executor
            .fetch(RECENT_HISTORY, &[SqlParam::BigInt(Some(limit))])
            .await?;
        rows.iter()
            .map(|row| {
                let id = int(row, "id")
                    .ok_or_else(|| DbError::Decode(String::from("historial.id is null")))?;
                Ok(HistoryEntry {
                    id,
                    user_id: int(row, "user_id"),
                    action: text(row, "accion"),
                    recorded_at: text(row, "fechahora"),
                })
            })
            .collect()
    }

    async fn record_history(
        &self,
        user_id: Option<i64>,
        action: Option<&str>,
    ) -> Result<i64, DbError> {
        let params = [
            SqlParam::BigInt(user_id),
            SqlParam::Text(action.map(str::to_owned)),
        ];
        self.insert(INSERT_HISTORY, &params).await
    }

    async fn find_user(&self, name: &str) -> Result<Option<UserCredentials>, DbError> {
        let params = [SqlParam::Text(Some(name.to_owned()))];
        let Some(row) = self.first_row(FIND_USER, &params).await? else {
            return Ok(None);
        };
        match (int(&row, "id"), text(&row, "password_hash")) {
            (Some(id), Some(password_hash)) => Ok(Some(UserCredentials { id, password_hash })),
            _ => Err(DbError::Decode(String::from(
                "usuario row is missing id or password hash",
            ))),
        }
    }

    async fn create_user(&self, name: &str, password_hash: &str) -> Result<i64, DbError> {
        let params = [
            SqlParam::Text(Some(name.to_owned())),
            SqlParam::Text(Some(password_hash.to_owned())),
        ];
        self.insert(INSERT_USER, &params).await
    }

    async fn ping(&self) -> Result<Vec<Row>, DbError> {
        self.executor.fetch(PING, &[]).await
    }
}

fn flag(row: &Row, column: &str) -> bool {
    row.get(column).is_some_and(is_truthy)
}

fn int(row: &Row, column: &str) -> Option<i64> {
    row.get(column).and_then(Value::as_i64)
}

fn text(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(Value::as_str).map(str::to_owned)
}
