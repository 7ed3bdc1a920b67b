//! Database connection and operations

pub mod authors;
pub mod books;
pub mod error;
pub mod schema;
pub mod sqlite_helpers;
pub mod users;

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use authors::{AuthorRecord, AuthorRepository, CreateAuthor};
pub use books::{AddedBook, BookFilter, BookRecord, BookRepository, NewBook};
pub use error::{DbError, DbResult};
pub use schema::{ColumnDef, DatabaseSchema, sync_schema};
pub use users::{CreateUser, UserRecord, UsersRepository};

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the SQLite database at `url`, creating the file if needed.
    ///
    /// In-memory databases are private to a single connection, so the pool is
    /// pinned to one connection that is never recycled.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid DATABASE_URL '{}'", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// A fresh in-memory database with all tables created
    pub async fn connect_in_memory() -> Result<Self> {
        let db = Self::connect("sqlite::memory:", 1).await?;
        db.sync_schema().await?;
        Ok(db)
    }

    /// Get an authors repository
    pub fn authors(&self) -> AuthorRepository {
        AuthorRepository::new(self.pool.clone())
    }

    /// Get a books repository
    pub fn books(&self) -> BookRepository {
        BookRepository::new(self.pool.clone())
    }

    /// Get a users repository
    pub fn users(&self) -> UsersRepository {
        UsersRepository::new(self.pool.clone())
    }

    /// Create any missing tables
    pub async fn sync_schema(&self) -> Result<()> {
        sync_schema(&self.pool)
            .await
            .context("Failed to sync database schema")
    }

    /// Round-trip query used by readiness checks
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
