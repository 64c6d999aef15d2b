//! Error types for the `ledsense` binary.
//!
//! [`AppError`] wraps every failure mode of startup, serving, and user
//! provisioning so `main` can propagate with `?`.

/// Top-level error for the `ledsense` binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Settings {
        /// The underlying settings error.
        #[from]
        source: crate::settings::SettingsError,
    },

    /// Pool creation, migration, or a store call failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: ledsense_db::DbError,
    },

    /// Token keys or password hashing failed.
    #[error("auth error: {source}")]
    Auth {
        /// The underlying auth error.
        #[from]
        source: ledsense_api::AuthError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ledsense_api::ServerError,
    },

    /// A command argument was unusable.
    #[error("invalid argument: {message}")]
    Argument {
        /// Description of the problem.
        message: String,
    },
}
