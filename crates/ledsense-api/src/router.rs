//! Axum router construction for the device state API.
//!
//! Assembles all routes into a single [`Router`] with CORS enabled for the
//! mobile and web clients, and a trace layer for per-request spans.

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::guard;
use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- service banner
/// - `GET /api/consultarEstados` -- latest LED + sensor state
/// - `POST /api/insertarEstados` -- record LED + sensor state
/// - `GET /api/consultarObstaculo` -- latest obstacle flag
/// - `GET /api/consultarHistorial` -- newest history entries
/// - `POST /api/insertarHistorial` -- append a history entry
/// - `POST /api/login` -- issue a bearer token
/// - `GET /api/test-db` -- connectivity check
/// - `GET /api/sesion` -- bearer's user id (always guarded)
///
/// When [`AppState::protect_endpoints`] is set, the five state and history
/// routes are wrapped by [`guard::require_token`].
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let data_routes = Router::new()
        .route("/api/consultarEstados", get(handlers::consultar_estados))
        .route("/api/insertarEstados", post(handlers::insertar_estados))
        .route("/api/consultarObstaculo", get(handlers::consultar_obstaculo))
        .route("/api/consultarHistorial", get(handlers::consultar_historial))
        .route("/api/insertarHistorial", post(handlers::insertar_historial));

    let data_routes = if state.protect_endpoints {
        data_routes.route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            guard::require_token,
        ))
    } else {
        data_routes
    };

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/login", post(handlers::login))
        .route("/api/test-db", get(handlers::test_db))
        .route("/api/sesion", get(handlers::sesion))
        .merge(data_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
