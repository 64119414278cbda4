//! Data Access Gateway
//!
//! Pooled, read-only access to the Guardian database. Every query result is
//! tagged so callers can tell "no rows" apart from "the query failed".

use crate::errors::GatewayError;
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub mod queries;
pub mod table;

pub use queries::ReferenceData;
pub use table::{Row, Table, Value};

/// Database configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub pool_size: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "guardian".to_string(),
            pool_size: 5,
            connect_timeout_secs: 10,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Result of a query, keeping failures distinct from empty results.
#[derive(Debug)]
pub enum QueryOutcome {
    Rows(Table),
    Empty,
    Failed(GatewayError),
}

impl QueryOutcome {
    pub fn from_table(table: Table) -> Self {
        if table.is_empty() {
            QueryOutcome::Empty
        } else {
            QueryOutcome::Rows(table)
        }
    }

    /// Rows on success (possibly none); the failure cause otherwise.
    pub fn into_result(self) -> Result<Table, GatewayError> {
        match self {
            QueryOutcome::Rows(table) => Ok(table),
            QueryOutcome::Empty => Ok(Table::default()),
            QueryOutcome::Failed(err) => Err(err),
        }
    }
}

/// Result of a single-field lookup.
#[derive(Debug)]
pub enum FieldLookup {
    Found(Value),
    Absent,
    Failed(GatewayError),
}

impl FieldLookup {
    pub fn value(&self) -> Option<&Value> {
        match self {
            FieldLookup::Found(v) => Some(v),
            _ => None,
        }
    }
}

/// A configuration flag read fresh from the database.
///
/// Absent and failed lookups carry no value, so every comparison against
/// them is false and the caller takes its else branch.
#[derive(Debug)]
pub struct ConfigFlag {
    table: String,
    field: String,
    lookup: FieldLookup,
}

impl ConfigFlag {
    pub fn new(table: impl Into<String>, field: impl Into<String>, lookup: FieldLookup) -> Self {
        let flag = Self {
            table: table.into(),
            field: field.into(),
            lookup,
        };
        match &flag.lookup {
            FieldLookup::Found(v) => debug!("{}.{} = {}", flag.table, flag.field, v),
            FieldLookup::Absent => info!(
                "{}.{} has no row, using default branch",
                flag.table, flag.field
            ),
            FieldLookup::Failed(e) => warn!(
                "{}.{} could not be read ({}), using default branch",
                flag.table, flag.field, e
            ),
        }
        flag
    }

    pub fn value(&self) -> Option<i64> {
        self.lookup.value().and_then(Value::as_i64)
    }

    pub fn is(&self, expected: i64) -> bool {
        self.value() == Some(expected)
    }

    pub fn is_enabled(&self) -> bool {
        self.is(1)
    }
}

/// Identifiers are interpolated into SQL, so only plain names are accepted.
pub(crate) fn validate_identifier(name: &str) -> Result<&str, GatewayError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(GatewayError::InvalidIdentifier(name.to_string()))
    }
}

/// Builds the statement for a single-field lookup.
pub(crate) fn lookup_statement(
    table: &str,
    field: &str,
    condition_field: Option<&str>,
) -> Result<String, GatewayError> {
    let table = validate_identifier(table)?;
    let field = validate_identifier(field)?;
    Ok(match condition_field {
        Some(column) => {
            let column = validate_identifier(column)?;
            format!("SELECT {field} FROM {table} WHERE {column} = ? LIMIT 1")
        }
        None => format!("SELECT {field} FROM {table} LIMIT 1"),
    })
}

fn first_line(sql: &str) -> &str {
    sql.trim().lines().next().unwrap_or_default().trim()
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [Value],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

/// Pooled connection to the Guardian database.
#[derive(Clone)]
pub struct Gateway {
    pool: MySqlPool,
    branch_columns: HashMap<String, String>,
}

impl Gateway {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, GatewayError> {
        info!(
            "Connecting to MySQL at {}:{} (database '{}', pool size {})",
            config.host, config.port, config.database, config.pool_size
        );

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .ssl_mode(MySqlSslMode::Disabled);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|source| {
                error!("Failed to create MySQL connection pool: {}", source);
                GatewayError::Connection {
                    host: config.host.clone(),
                    port: config.port,
                    source,
                }
            })?;

        info!(
            "MySQL connection pool for {}:{} created",
            config.host, config.port
        );
        Ok(Self {
            pool,
            branch_columns: HashMap::new(),
        })
    }

    pub fn with_branch_columns(mut self, branch_columns: HashMap<String, String>) -> Self {
        self.branch_columns = branch_columns;
        self
    }

    /// Runs a parameterized SELECT. Errors are logged and returned as `Failed`.
    pub async fn query(&self, sql: &str, params: &[Value]) -> QueryOutcome {
        info!("Executing query: {}...", first_line(sql));
        let fetched = bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await;

        let rows = match fetched {
            Ok(rows) => rows,
            Err(source) => {
                error!("Query failed: {}\nQuery: {}", source, sql.trim());
                return QueryOutcome::Failed(GatewayError::Query {
                    statement: first_line(sql).to_string(),
                    source,
                });
            }
        };

        match Table::from_mysql_rows(&rows) {
            Ok(table) => QueryOutcome::from_table(table),
            Err(e) => {
                error!("Failed to decode result of '{}': {}", first_line(sql), e);
                QueryOutcome::Failed(e)
            }
        }
    }

    /// First value of `field` in `table`, optionally filtered by `column = value`.
    pub async fn lookup_field(
        &self,
        table: &str,
        field: &str,
        condition: Option<(&str, &str)>,
    ) -> FieldLookup {
        let sql = match lookup_statement(table, field, condition.map(|(column, _)| column)) {
            Ok(sql) => sql,
            Err(e) => {
                error!("Refusing field lookup {}.{}: {}", table, field, e);
                return FieldLookup::Failed(e);
            }
        };
        let params: Vec<Value> = condition
            .map(|(_, value)| vec![Value::from(value)])
            .unwrap_or_default();

        match self.query(&sql, &params).await {
            QueryOutcome::Rows(rows) => rows
                .first()
                .and_then(|row| row.get(field).cloned())
                .map(FieldLookup::Found)
                .unwrap_or(FieldLookup::Absent),
            QueryOutcome::Empty => FieldLookup::Absent,
            QueryOutcome::Failed(e) => FieldLookup::Failed(e),
        }
    }

    pub async fn close(&self) {
        info!("Closing MySQL connection pool");
        self.pool.close().await;
    }
}
