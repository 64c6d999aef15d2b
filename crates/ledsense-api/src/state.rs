//! Shared application state for the API server.
//!
//! [`AppState`] is built once at startup and never mutated afterwards. It
//! holds the store handle, the token keys, and whether the data endpoints
//! sit behind the token guard.

use std::sync::Arc;

use ledsense_db::DeviceStore;

use crate::auth::TokenKeys;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Persistence for device state, history and users.
    pub store: Arc<dyn DeviceStore>,
    /// Keys for issuing and verifying bearer tokens.
    pub tokens: TokenKeys,
    /// When true, the data endpoints require a valid bearer token.
    pub protect_endpoints: bool,
}

impl AppState {
    /// Create a state with unauthenticated data endpoints.
    pub fn new(store: Arc<dyn DeviceStore>, tokens: TokenKeys) -> Self {
        Self {
            store,
            tokens,
            protect_endpoints: false,
        }
    }

    /// Put the data endpoints behind the token guard.
    #[must_use]
    pub const fn with_protected_endpoints(mut self, protect: bool) -> Self {
        self.protect_endpoints = protect;
        self
    }
}
