//! Schema context export.
//!
//! Reads table columns and foreign keys for one Postgres schema from
//! `information_schema` and writes the plain-text summary that the
//! `/generate-sql` prompt embeds:
//!
//! ```text
//! Tables:
//! orders(id (integer), total (numeric))
//!
//! Relations:
//! orders.customer_id → customers.id
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::{ConfigError, DEFAULT_SCHEMA_CONTEXT_PATH, DEFAULT_SCHEMA_NAME, env_required};
use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("write {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ErrorCode for SchemaError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_SCHEMA_DATABASE",
            Self::Write { .. } => "E_SCHEMA_WRITE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaConfig {
    pub database_url: String,
    pub schema_name: String,
    pub output_path: PathBuf,
}

impl SchemaConfig {
    /// Required: `DATABASE_URL`. Optional: `SCHEMA_NAME` (default `emsp`),
    /// `SCHEMA_CONTEXT_PATH` (default `schema_context.txt`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env_required("DATABASE_URL")?,
            schema_name: std::env::var("SCHEMA_NAME").unwrap_or_else(|_| DEFAULT_SCHEMA_NAME.to_string()),
            output_path: std::env::var("SCHEMA_CONTEXT_PATH")
                .map_or_else(|_| PathBuf::from(DEFAULT_SCHEMA_CONTEXT_PATH), PathBuf::from),
        })
    }
}

// =============================================================================
// ROWS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRow {
    pub table_name: String,
    pub column_name: String,
    pub foreign_table_name: String,
    pub foreign_column_name: String,
}

// `information_schema` columns are `sql_identifier` / `character_data`;
// cast to text so they decode as `String`.
const COLUMNS_QUERY: &str = "SELECT table_name::text, column_name::text, data_type::text
     FROM information_schema.columns
     WHERE table_schema = $1
     ORDER BY table_name, ordinal_position";

const FOREIGN_KEYS_QUERY: &str = "SELECT tc.table_name::text, kcu.column_name::text,
            ccu.table_name::text, ccu.column_name::text
     FROM information_schema.table_constraints AS tc
     JOIN information_schema.key_column_usage AS kcu
       ON tc.constraint_name = kcu.constraint_name
      AND tc.table_schema = kcu.table_schema
     JOIN information_schema.constraint_column_usage AS ccu
       ON ccu.constraint_name = tc.constraint_name
      AND ccu.table_schema = tc.table_schema
     WHERE tc.constraint_type = 'FOREIGN KEY'
       AND tc.table_schema = $1
     ORDER BY 1, 2";

/// Load columns and foreign keys for `schema_name`.
///
/// # Errors
///
/// Returns a database error if either query fails.
pub async fn load(pool: &PgPool, schema_name: &str) -> Result<(Vec<ColumnRow>, Vec<ForeignKeyRow>), SchemaError> {
    let columns = sqlx::query_as::<_, (String, String, String)>(COLUMNS_QUERY)
        .bind(schema_name)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|(table_name, column_name, data_type)| ColumnRow { table_name, column_name, data_type })
        .collect();

    let foreign_keys = sqlx::query_as::<_, (String, String, String, String)>(FOREIGN_KEYS_QUERY)
        .bind(schema_name)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|(table_name, column_name, foreign_table_name, foreign_column_name)| ForeignKeyRow {
            table_name,
            column_name,
            foreign_table_name,
            foreign_column_name,
        })
        .collect();

    Ok((columns, foreign_keys))
}

/// Render the schema context text. Tables keep first-seen order.
#[must_use]
pub fn format_context(columns: &[ColumnRow], foreign_keys: &[ForeignKeyRow]) -> String {
    let mut tables: IndexMap<&str, Vec<String>> = IndexMap::new();
    for col in columns {
        tables
            .entry(col.table_name.as_str())
            .or_default()
            .push(format!("{} ({})", col.column_name, col.data_type));
    }

    let mut lines = vec!["Tables:".to_string()];
    lines.extend(
        tables
            .iter()
            .map(|(table, cols)| format!("{table}({})", cols.join(", "))),
    );

    lines.push("\nRelations:".to_string());
    lines.extend(foreign_keys.iter().map(|fk| {
        format!("{}.{} → {}.{}", fk.table_name, fk.column_name, fk.foreign_table_name, fk.foreign_column_name)
    }));

    lines.join("\n")
}

/// Connect, load the schema and write the context file.
///
/// # Errors
///
/// Returns a [`SchemaError`] if the database is unreachable, a query fails,
/// or the file cannot be written.
pub async fn export(config: &SchemaConfig) -> Result<PathBuf, SchemaError> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;

    let (columns, foreign_keys) = load(&pool, &config.schema_name).await?;
    pool.close().await;

    let text = format_context(&columns, &foreign_keys);
    write_context(&config.output_path, &text).await?;

    info!(
        schema = %config.schema_name,
        columns = columns.len(),
        foreign_keys = foreign_keys.len(),
        path = %config.output_path.display(),
        "schema: context exported"
    );
    Ok(config.output_path.clone())
}

async fn write_context(path: &Path, text: &str) -> Result<(), SchemaError> {
    tokio::fs::write(path, text)
        .await
        .map_err(|source| SchemaError::Write { path: path.to_path_buf(), source })
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;
