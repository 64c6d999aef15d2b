//! Single-statement query execution.
//!
//! [`QueryExecutor`] takes one connection from the pool per call, runs
//! exactly one statement and hands the connection back before returning,
//! whether the statement succeeded or not. Reads come back as rows keyed
//! by column name; writes run inside a transaction and come back as the
//! generated row identifier.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, Transaction, TypeInfo};

use crate::error::DbError;

/// A result row: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// A bind parameter for a positional placeholder (`$1`, `$2`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    /// A `SMALLINT` value (0/1 flags).
    SmallInt(i16),
    /// A nullable `BIGINT` value.
    BigInt(Option<i64>),
    /// A `BOOLEAN` value.
    Bool(bool),
    /// A nullable `TEXT` value.
    Text(Option<String>),
    /// A `TIMESTAMPTZ` value.
    Timestamp(DateTime<Utc>),
}

impl SqlParam {
    /// Encode a truthy flag as the 0/1 `SMALLINT` the state tables store.
    pub const fn flag(on: bool) -> Self {
        if on { Self::SmallInt(1) } else { Self::SmallInt(0) }
    }
}

/// A statement and its bind parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    /// The SQL text with positional placeholders.
    pub sql: String,
    /// Parameters bound in order.
    pub params: Vec<SqlParam>,
}

impl Statement {
    /// Create a statement with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a bind parameter.
    #[must_use]
    pub fn bind(mut self, param: SqlParam) -> Self {
        self.params.push(param);
        self
    }
}

/// Outcome of [`QueryExecutor::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Rows returned by a read.
    Rows(Vec<Row>),
    /// Identifier generated by a write, or 0 when there is none.
    Written(i64),
}

/// Whether a statement is a read: it starts with `select`, ignoring case
/// and leading whitespace.
pub fn is_read_statement(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false,
/// everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Runs one statement per call against a [`PgPool`].
#[derive(Clone)]
pub struct QueryExecutor {
    pool: PgPool,
}

impl QueryExecutor {
    /// Create an executor drawing connections from `pool`.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Execute a single statement.
    ///
    /// Reads return [`QueryOutcome::Rows`]; anything else is committed and
    /// returns [`QueryOutcome::Written`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] carrying the database message. Writes
    /// are rolled back before the error is returned.
    pub async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<QueryOutcome, DbError> {
        if is_read_statement(sql) {
            self.fetch(sql, params).await.map(QueryOutcome::Rows)
        } else {
            let mut tx = self.pool.begin().await?;
            let id = run_in(&mut tx, sql, params).await;
            finish(tx, id).await.map(QueryOutcome::Written)
        }
    }

    /// Execute a read and return its rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if acquiring the connection, running the query,
    /// or decoding a column fails.
    pub async fn fetch(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, DbError> {
        let mut conn = self.pool.acquire().await?;
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut *conn)
            .await?;
        drop(conn);
        rows.iter().map(row_to_map).collect()
    }

    /// Execute several writes in one transaction.
    ///
    /// Either every statement commits or none does. Returns the generated
    /// identifier of each statement, in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`DbError`]; the transaction is rolled back.
    pub async fn execute_all(&self, statements: &[Statement]) -> Result<Vec<i64>, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(statements.len());
        for statement in statements {
            match run_in(&mut tx, &statement.sql, &statement.params).await {
                Ok(id) => ids.push(id),
                Err(e) => return finish(tx, Err(e)).await,
            }
        }
        finish(tx, Ok(ids)).await
    }
}

async fn run_in(
    tx: &mut Transaction<'static, Postgres>,
    sql: &str,
    params: &[SqlParam],
) -> Result<i64, DbError> {
    let row = bind_all(sqlx::query(sql), params)
        .fetch_optional(&mut **tx)
        .await?;
    row.as_ref().map_or(Ok(0), generated_id)
}

/// Commit on success, roll back on failure. A rollback error is logged and
/// dropped so the original error reaches the caller.
async fn finish<T>(tx: Transaction<'static, Postgres>, result: Result<T, DbError>) -> Result<T, DbError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::SmallInt(v) => query.bind(*v),
            SqlParam::BigInt(v) => query.bind(*v),
            SqlParam::Bool(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.as_deref()),
            SqlParam::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

fn generated_id(row: &PgRow) -> Result<i64, DbError> {
    if row.columns().is_empty() {
        return Ok(0);
    }
    match row.try_get::<Option<i64>, _>(0) {
        Ok(id) => Ok(id.unwrap_or(0)),
        Err(_) => Ok(row.try_get::<Option<i32>, _>(0)?.map_or(0, i64::from)),
    }
}

fn row_to_map(row: &PgRow) -> Result<Row, DbError> {
    let mut map = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())?;
        map.insert(column.name().to_owned(), value);
    }
    Ok(map)
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, DbError> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::from),
        "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|f| Value::from(f64::from(f))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(Value::from),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(idx)?.map(Value::from)
        }
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|ts| Value::from(ts.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|ts| Value::from(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx)?,
        other => {
            return Err(DbError::Decode(format!(
                "column {idx} has unsupported type {other}"
            )));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}
