//! Error types for the HTTP API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! response body has the shape `{"error": "<message>"}`.
//!
//! Server-side failures are logged in full here and reach the client only
//! as a generic message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ledsense_db::DbError;

use crate::auth::AuthError;

/// Generic message for any server-side failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Error interno del servidor";

/// Message returned when the connectivity check fails.
pub const CONNECTION_ERROR_MESSAGE: &str = "Error de conexión";

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Authentication failed, or auth machinery broke.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A store operation failed while serving `operation`.
    #[error("{operation}: {source}")]
    Store {
        /// The endpoint that was being served.
        operation: &'static str,
        /// The underlying data-layer error.
        source: DbError,
    },

    /// The connectivity check could not reach the database.
    #[error("connectivity check failed: {0}")]
    Connectivity(#[source] DbError),

    /// The request body could not be read as JSON.
    #[error("invalid request body: {0}")]
    Body(#[from] JsonRejection),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Wrap a store error with the endpoint it happened in.
    pub const fn store(operation: &'static str, source: DbError) -> Self {
        Self::Store { operation, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Auth(e) if e.is_unauthorized() => {
                tracing::debug!(error = %e, "request rejected");
                (StatusCode::UNAUTHORIZED, e.to_string())
            }
            Self::Connectivity(_) => {
                tracing::error!(error = %self, "database unreachable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    CONNECTION_ERROR_MESSAGE.to_owned(),
                )
            }
            Self::Auth(_) | Self::Store { .. } | Self::Body(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_owned(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });

        (status, axum::Json(body)).into_response()
    }
}
