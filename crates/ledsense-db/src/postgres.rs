//! `PostgreSQL` connection pool.
//!
//! The pool is bounded and lazy: no connection is opened until the first
//! statement, and every checkout is health-checked, so a database that goes
//! away and comes back is picked up without a restart.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::error::DbError;

/// Bounds applied to the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    /// Most connections open at once.
    pub max_connections: u32,
    /// How long a caller waits for a free connection.
    pub acquire_timeout: Duration,
    /// How long an unused connection stays open.
    pub idle_timeout: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Connection pool handle to `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Create a pool for `url` bounded by `limits`.
    ///
    /// Only the URL is checked here. An unreachable server shows up as a
    /// [`DbError::Postgres`] on the first statement.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    pub fn connect(url: &str, limits: &PoolLimits) -> Result<Self, DbError> {
        let options: PgConnectOptions = url
            .parse()
            .map_err(|e: sqlx::Error| DbError::Config(format!("invalid database URL: {e}")))?;

        let pool = PgPoolOptions::new()
            .max_connections(limits.max_connections)
            .acquire_timeout(limits.acquire_timeout)
            .idle_timeout(limits.idle_timeout)
            .test_before_acquire(true)
            .connect_lazy_with(options);

        tracing::info!(
            max_connections = limits.max_connections,
            acquire_timeout_secs = limits.acquire_timeout.as_secs(),
            "PostgreSQL pool ready"
        );

        Ok(Self { pool })
    }

    /// Create a pool for `url` with [`PoolLimits::default`].
    ///
    /// # Errors
    ///
    /// See [`PostgresPool::connect`].
    pub fn connect_url(url: &str) -> Result<Self, DbError> {
        Self::connect(url, &PoolLimits::default())
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if a migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Schema up to date");
        Ok(())
    }

    /// The underlying [`PgPool`].
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wait for checked-out connections to return, then close them all.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}
