//! REST API endpoint handlers.
//!
//! Each handler makes one store call (two for the state read) and shapes
//! the JSON the mobile client expects. Field names and messages are part of
//! the wire contract and stay in Spanish.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Service banner and endpoint list |
//! | `GET` | `/api/consultarEstados` | Latest LED + sensor state |
//! | `POST` | `/api/insertarEstados` | Record LED + sensor state |
//! | `GET` | `/api/consultarObstaculo` | Latest obstacle flag (bare boolean) |
//! | `GET` | `/api/consultarHistorial` | 20 newest history entries |
//! | `POST` | `/api/insertarHistorial` | Append a history entry |
//! | `POST` | `/api/login` | Exchange credentials for a bearer token |
//! | `GET` | `/api/test-db` | Database connectivity check |
//! | `GET` | `/api/sesion` | Echo the bearer's user id (guarded) |

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequest, State};
use ledsense_db::{HISTORY_LIMIT, HistoryEntry, NewStates, is_truthy};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::auth::{AuthError, DUMMY_PASSWORD_HASH, verify_password};
use crate::error::ApiError;
use crate::guard::AuthUser;
use crate::state::AppState;

/// Message returned when a state table is still empty.
pub const NO_DATA_MESSAGE: &str = "No hay datos disponibles";

/// The API routes listed by `GET /`.
pub const API_ENDPOINTS: [&str; 7] = [
    "/api/consultarEstados",
    "/api/insertarEstados",
    "/api/consultarObstaculo",
    "/api/consultarHistorial",
    "/api/insertarHistorial",
    "/api/login",
    "/api/test-db",
];

/// JSON body extractor whose rejection renders as an [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/insertarEstados`.
///
/// Flags accept any JSON value and are read by truthiness. Missing fields
/// count as false (flags) or `NULL` (user). See [`user_id_value`] for how
/// the user is read.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InsertarEstadosRequest {
    /// LED 1.
    pub estadoled1: Value,
    /// LED 2.
    pub estadoled2: Value,
    /// LED 3.
    pub estadoled3: Value,
    /// Sensor active.
    pub estadosensor: Value,
    /// Obstacle detected.
    pub estadoobstaculo: Value,
    /// Recording user.
    pub user_id: Value,
}

impl From<&InsertarEstadosRequest> for NewStates {
    fn from(body: &InsertarEstadosRequest) -> Self {
        Self {
            led1: is_truthy(&body.estadoled1),
            led2: is_truthy(&body.estadoled2),
            led3: is_truthy(&body.estadoled3),
            sensor_active: is_truthy(&body.estadosensor),
            obstacle: is_truthy(&body.estadoobstaculo),
            user_id: user_id_value(&body.user_id),
        }
    }
}

/// Body of `POST /api/insertarHistorial`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InsertarHistorialRequest {
    /// Acting user.
    pub user_id: Value,
    /// Action description.
    pub accion: Value,
}

/// Body of `POST /api/login`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    /// User name (`usuario.nombre`).
    pub username: Value,
    /// Plaintext password, checked against the stored hash.
    pub password: Value,
}

/// Read a user id from any JSON value.
///
/// Integers and integer strings are taken as-is; anything else is `NULL`.
pub fn user_id_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a text column from any JSON value.
///
/// Strings are taken as-is, `null` is `NULL`, and any other value is stored
/// as its JSON text.
pub fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn no_data() -> Json<Value> {
    Json(json!({ "mensaje": NO_DATA_MESSAGE }))
}

fn history_json(entry: &HistoryEntry) -> Value {
    json!({
        "id": entry.id,
        "usuario": entry.user_id,
        "accion": entry.action,
        "fechahora": entry.recorded_at,
    })
}

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

/// Service banner listing the API routes.
pub async fn index() -> Json<Value> {
    Json(json!({
        "mensaje": "API de Control de LEDs y Sensores funcionando correctamente",
        "endpoints": API_ENDPOINTS,
    }))
}

// ---------------------------------------------------------------------------
// LED + sensor state
// ---------------------------------------------------------------------------

/// Latest LED and sensor state.
///
/// Returns the "no data" message unless both tables have at least one row.
pub async fn consultar_estados(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let led = state
        .store
        .latest_led_state()
        .await
        .map_err(|e| ApiError::store("consultarEstados", e))?;
    let sensor = state
        .store
        .latest_sensor_state()
        .await
        .map_err(|e| ApiError::store("consultarEstados", e))?;

    let (Some(led), Some(sensor)) = (led, sensor) else {
        return Ok(no_data());
    };

    Ok(Json(json!({
        "estadoled1": led.led1,
        "estadoled2": led.led2,
        "estadoled3": led.led3,
        "estadosensor": sensor.sensor_active,
        "estadoledobstaculosensor": sensor.obstacle,
    })))
}

/// Record one LED row and one sensor row.
pub async fn insertar_estados(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<InsertarEstadosRequest>,
) -> Result<Json<Value>, ApiError> {
    let states = NewStates::from(&body);
    let ids = state
        .store
        .record_states(states)
        .await
        .map_err(|e| ApiError::store("insertarEstados", e))?;

    info!(
        led_id = ids.led_id,
        sensor_id = ids.sensor_id,
        user_id = ?states.user_id,
        "States recorded"
    );

    Ok(Json(json!({ "mensaje": "Datos insertados correctamente" })))
}

/// Latest obstacle flag.
///
/// The body is a bare JSON boolean when data exists; the mobile client
/// parses it that way.
pub async fn consultar_obstaculo(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let sensor = state
        .store
        .latest_sensor_state()
        .await
        .map_err(|e| ApiError::store("consultarObstaculo", e))?;

    Ok(sensor.map_or_else(no_data, |s| Json(Value::Bool(s.obstacle))))
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// The newest history entries, at most [`HISTORY_LIMIT`].
pub async fn consultar_historial(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let entries = state
        .store
        .recent_history(HISTORY_LIMIT)
        .await
        .map_err(|e| ApiError::store("consultarHistorial", e))?;

    let historial: Vec<Value> = entries.iter().map(history_json).collect();
    Ok(Json(json!({ "historial": historial })))
}

/// Append a history entry stamped with the server's clock.
pub async fn insertar_historial(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<InsertarHistorialRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_id_value(&body.user_id);
    let accion = text_value(&body.accion);
    let id = state
        .store
        .record_history(user_id, accion.as_deref())
        .await
        .map_err(|e| ApiError::store("insertarHistorial", e))?;

    info!(id, user_id = ?user_id, "History entry recorded");

    Ok(Json(
        json!({ "mensaje": "Registro de historial creado correctamente" }),
    ))
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Exchange a user name and password for a bearer token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = text_value(&body.username).unwrap_or_default();
    let password = text_value(&body.password).unwrap_or_default();
    info!(usuario = %username, "Login attempt");

    let user = state
        .store
        .find_user(&username)
        .await
        .map_err(|e| ApiError::store("login", e))?;

    // Unknown names still pay for one verification.
    let (user_id, hash) = match user {
        Some(found) => (Some(found.id), found.password_hash),
        None => (None, DUMMY_PASSWORD_HASH.to_owned()),
    };
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("password check task failed: {e}")))?;

    let user_id = match user_id {
        Some(id) if matches => id,
        Some(_) => {
            warn!(usuario = %username, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }
        None => {
            warn!(usuario = %username, "Login failed: unknown user");
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let token = state.tokens.issue(user_id)?;
    info!(user_id, "Login succeeded");

    Ok(Json(json!({ "user": user_id, "token": token })))
}

/// Echo the authenticated caller's user id.
pub async fn sesion(AuthUser(user_id): AuthUser) -> Json<Value> {
    Json(json!({ "user_id": user_id }))
}

// ---------------------------------------------------------------------------
// GET /api/test-db
// ---------------------------------------------------------------------------

/// Run `SELECT 1` against the store.
pub async fn test_db(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let rows = state.store.ping().await.map_err(ApiError::Connectivity)?;
    Ok(Json(json!({
        "mensaje": "Conexión a la base de datos exitosa",
        "resultado": rows,
    })))
}
