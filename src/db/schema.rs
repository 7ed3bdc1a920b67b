//! Declarative table definitions and write-time validation
//!
//! Each record type declares its columns once. The same definitions drive:
//! - `CREATE TABLE IF NOT EXISTS` generation at startup
//! - required / minimum-length checks before inserts and updates
//!
//! Uniqueness is left to the `UNIQUE` constraint in the generated DDL and
//! surfaces as [`DbError::Validation`] through the `sqlx::Error` conversion.

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::authors::AuthorRecord;
use super::books::BookRecord;
use super::error::{DbError, DbResult};
use super::users::UserRecord;

/// Column definition for schema generation.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: &'static str,
    /// SQLite column type (TEXT, INTEGER)
    pub sql_type: &'static str,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this is the primary key
    pub is_primary_key: bool,
    /// Whether values must be unique across the table
    pub unique: bool,
    /// Minimum character length for TEXT values
    pub min_length: Option<usize>,
    /// Foreign key target, e.g. `authors(id)`
    pub references: Option<&'static str>,
    /// Default value expression
    pub default: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            nullable: false,
            is_primary_key: false,
            unique: false,
            min_length: None,
            references: None,
            default: None,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub const fn references(mut self, target: &'static str) -> Self {
        self.references = Some(target);
        self
    }

    pub const fn default(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    /// Generate the column definition SQL
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);

        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }

        if !self.nullable && !self.is_primary_key {
            sql.push_str(" NOT NULL");
        }

        if self.unique {
            sql.push_str(" UNIQUE");
        }

        if let Some(target) = self.references {
            sql.push_str(&format!(" REFERENCES {}", target));
        }

        if let Some(default) = self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        sql
    }
}

/// Table metadata and constraints for a stored record type.
pub trait DatabaseSchema {
    /// The SQL table name (e.g., "books")
    const TABLE_NAME: &'static str;

    /// All column definitions for this record's table
    fn columns() -> &'static [ColumnDef];

    /// Generate CREATE TABLE IF NOT EXISTS SQL
    fn create_table_sql() -> String {
        let column_defs: Vec<String> = Self::columns().iter().map(|c| c.to_sql()).collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            Self::TABLE_NAME,
            column_defs.join(",\n  ")
        )
    }

    /// Comma-separated column list for SELECT statements
    fn select_columns() -> String {
        Self::columns()
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check a TEXT value against the column's required and min-length rules
    fn validate_text(column: &str, value: &str) -> DbResult<()> {
        let Some(def) = Self::columns().iter().find(|c| c.name == column) else {
            return Ok(());
        };

        if !def.nullable && value.trim().is_empty() {
            return Err(DbError::validation(
                Self::TABLE_NAME,
                column,
                format!("{} is required", column),
            ));
        }

        if let Some(min) = def.min_length
            && value.chars().count() < min
        {
            return Err(DbError::validation(
                Self::TABLE_NAME,
                column,
                format!(
                    "{} must contain at least {} characters, got '{}'",
                    column, min, value
                ),
            ));
        }

        Ok(())
    }
}

/// Create any missing tables. Existing tables are left untouched.
pub async fn sync_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_table::<AuthorRecord>(pool).await?;
    create_table::<BookRecord>(pool).await?;
    create_table::<UserRecord>(pool).await?;
    info!("Schema sync complete");
    Ok(())
}

async fn create_table<E: DatabaseSchema>(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let sql = E::create_table_sql();
    debug!(table = E::TABLE_NAME, "Ensuring table: {}", sql);
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}
