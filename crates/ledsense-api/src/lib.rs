//! HTTP API for recording and reporting LED and obstacle-sensor state.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **State endpoints** to record and read the latest LED and sensor
//!   readings
//! - **History endpoints** to append and list user actions
//! - **Login** issuing HS256 bearer tokens, and a token guard usable as an
//!   extractor ([`AuthUser`]) or as route middleware
//! - **Connectivity check** against the database
//!
//! # Architecture
//!
//! Handlers hold no state of their own. Each request goes through the
//! shared [`AppState`] to a [`ledsense_db::DeviceStore`], which takes a
//! pooled connection for the duration of one statement.

pub mod auth;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use auth::{AuthError, Claims, TokenKeys, hash_password, verify_password};
pub use error::ApiError;
pub use guard::AuthUser;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, shutdown_signal, start_server};
pub use state::AppState;
