//! Authors repository

use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, SqlitePool};

use super::error::{DbError, DbResult};
use super::schema::{ColumnDef, DatabaseSchema};
use super::sqlite_helpers::{json_to_vec, new_id, now_iso8601, placeholders};

/// An author as stored. `books` holds book ids in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: String,
    pub name: String,
    pub born: Option<i32>,
    pub books: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateAuthor {
    pub name: String,
    pub born: Option<i32>,
}

impl DatabaseSchema for AuthorRecord {
    const TABLE_NAME: &'static str = "authors";

    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("id", "TEXT").primary_key(),
            ColumnDef::new("name", "TEXT").unique().min_length(4),
            ColumnDef::new("born", "INTEGER").nullable(),
            ColumnDef::new("books", "TEXT").default("'[]'"),
            ColumnDef::new("created_at", "TEXT"),
        ];
        COLUMNS
    }
}

type AuthorRow = (String, String, Option<i32>, String, String);

fn from_row(r: AuthorRow) -> AuthorRecord {
    AuthorRecord {
        id: r.0,
        name: r.1,
        born: r.2,
        books: json_to_vec(&r.3),
        created_at: r.4,
    }
}

// Executor-generic helpers so the same statements run on the pool or inside
// the transaction opened by `BookRepository::add_with_author`.

pub(super) async fn fetch_by_id<'e>(
    executor: impl SqliteExecutor<'e>,
    id: &str,
) -> DbResult<Option<AuthorRecord>> {
    let sql = format!(
        "SELECT {} FROM authors WHERE id = ?",
        AuthorRecord::select_columns()
    );
    let row = sqlx::query_as::<_, AuthorRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(from_row))
}

pub(super) async fn fetch_by_name<'e>(
    executor: impl SqliteExecutor<'e>,
    name: &str,
) -> DbResult<Option<AuthorRecord>> {
    let sql = format!(
        "SELECT {} FROM authors WHERE name = ?",
        AuthorRecord::select_columns()
    );
    let row = sqlx::query_as::<_, AuthorRow>(&sql)
        .bind(name)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(from_row))
}

pub(super) async fn insert<'e>(
    executor: impl SqliteExecutor<'e>,
    author: &CreateAuthor,
) -> DbResult<AuthorRecord> {
    AuthorRecord::validate_text("name", &author.name)?;

    let record = AuthorRecord {
        id: new_id(),
        name: author.name.clone(),
        born: author.born,
        books: Vec::new(),
        created_at: now_iso8601(),
    };

    sqlx::query("INSERT INTO authors (id, name, born, books, created_at) VALUES (?, ?, ?, '[]', ?)")
        .bind(&record.id)
        .bind(&record.name)
        .bind(record.born)
        .bind(&record.created_at)
        .execute(executor)
        .await?;

    Ok(record)
}

/// Append a book id to the end of the author's book list
pub(super) async fn append_book<'e>(
    executor: impl SqliteExecutor<'e>,
    author_id: &str,
    book_id: &str,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE authors SET books = json_insert(books, '$[#]', ?) WHERE id = ?")
        .bind(book_id)
        .bind(author_id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Sqlx(sqlx::Error::RowNotFound));
    }
    Ok(())
}

pub struct AuthorRepository {
    pool: SqlitePool,
}

impl AuthorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Total number of authors
    pub async fn count(&self) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// All authors in creation order
    pub async fn list_all(&self) -> DbResult<Vec<AuthorRecord>> {
        let sql = format!(
            "SELECT {} FROM authors ORDER BY rowid",
            AuthorRecord::select_columns()
        );
        let rows = sqlx::query_as::<_, AuthorRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<AuthorRecord>> {
        fetch_by_id(&self.pool, id).await
    }

    /// Load the authors with these ids, in no particular order
    pub async fn list_by_ids(&self, ids: &[String]) -> DbResult<Vec<AuthorRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM authors WHERE id IN ({})",
            AuthorRecord::select_columns(),
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, AuthorRow>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Exact, case-sensitive name match
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<AuthorRecord>> {
        fetch_by_name(&self.pool, name).await
    }

    pub async fn create(&self, author: CreateAuthor) -> DbResult<AuthorRecord> {
        insert(&self.pool, &author).await
    }

    /// Set the birth year of the author with this name.
    /// Returns `None` when no author matches.
    pub async fn set_born(&self, name: &str, born: i32) -> DbResult<Option<AuthorRecord>> {
        let result = sqlx::query("UPDATE authors SET born = ? WHERE name = ?")
            .bind(born)
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_name(name).await
    }
}
