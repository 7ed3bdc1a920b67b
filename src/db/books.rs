//! Books repository

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::authors::{self, AuthorRecord, CreateAuthor};
use super::error::{DbError, DbResult};
use super::schema::{ColumnDef, DatabaseSchema};
use super::sqlite_helpers::{
    json_array_overlaps_sql, json_to_vec, new_id, now_iso8601, placeholders, vec_to_json,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub published: i32,
    pub genres: Vec<String>,
    pub created_at: String,
}

/// Input for [`BookRepository::add_with_author`]. The author is referenced by name.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub published: i32,
    pub genres: Vec<String>,
}

/// A freshly created book together with its author as it stands after the
/// book id was appended to the author's list.
#[derive(Debug, Clone)]
pub struct AddedBook {
    pub book: BookRecord,
    pub author: AuthorRecord,
    pub author_created: bool,
}

/// Filter for [`BookRepository::list`]. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub author_id: Option<String>,
    /// Matches books having any of these genres
    pub genres: Vec<String>,
}

impl DatabaseSchema for BookRecord {
    const TABLE_NAME: &'static str = "books";

    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("id", "TEXT").primary_key(),
            ColumnDef::new("title", "TEXT").unique().min_length(2),
            ColumnDef::new("author_id", "TEXT").references("authors(id)"),
            ColumnDef::new("published", "INTEGER"),
            ColumnDef::new("genres", "TEXT").default("'[]'"),
            ColumnDef::new("created_at", "TEXT"),
        ];
        COLUMNS
    }
}

type BookRow = (String, String, String, i32, String, String);

fn from_row(r: BookRow) -> BookRecord {
    BookRecord {
        id: r.0,
        title: r.1,
        author_id: r.2,
        published: r.3,
        genres: json_to_vec(&r.4),
        created_at: r.5,
    }
}

pub struct BookRepository {
    pool: SqlitePool,
}

impl BookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Total number of books
    pub async fn count(&self) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Books matching the filter, in creation order
    pub async fn list(&self, filter: &BookFilter) -> DbResult<Vec<BookRecord>> {
        let mut conditions = Vec::new();
        if filter.author_id.is_some() {
            conditions.push("author_id = ?".to_string());
        }
        if !filter.genres.is_empty() {
            conditions.push(json_array_overlaps_sql("genres", filter.genres.len()));
        }

        let mut sql = format!("SELECT {} FROM books", BookRecord::select_columns());
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY rowid");

        let mut query = sqlx::query_as::<_, BookRow>(&sql);
        if let Some(author_id) = &filter.author_id {
            query = query.bind(author_id);
        }
        for genre in &filter.genres {
            query = query.bind(genre);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Load books by id, returned in the order of `ids`. Unknown ids are skipped.
    pub async fn list_by_ids(&self, ids: &[String]) -> DbResult<Vec<BookRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM books WHERE id IN ({})",
            BookRecord::select_columns(),
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, BookRow>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let mut rows: Vec<BookRecord> = query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(from_row)
            .collect();
        rows.sort_by_key(|b| ids.iter().position(|id| id == &b.id));
        Ok(rows)
    }

    /// Create a book, creating its author first if no author has that name,
    /// and append the book to the author's list. All writes share one
    /// transaction, so a rejected book leaves no new author behind.
    ///
    /// The transaction takes the write lock up front. Concurrent writers
    /// queue on the busy timeout instead of failing on lock upgrade.
    pub async fn add_with_author(&self, new: NewBook) -> DbResult<AddedBook> {
        BookRecord::validate_text("title", &new.title)?;

        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let (author, author_created) = match authors::fetch_by_name(&mut *tx, &new.author).await? {
            Some(author) => (author, false),
            None => {
                let author = authors::insert(
                    &mut *tx,
                    &CreateAuthor {
                        name: new.author.clone(),
                        born: None,
                    },
                )
                .await?;
                (author, true)
            }
        };

        let book = BookRecord {
            id: new_id(),
            title: new.title,
            author_id: author.id.clone(),
            published: new.published,
            genres: new.genres,
            created_at: now_iso8601(),
        };

        sqlx::query(
            "INSERT INTO books (id, title, author_id, published, genres, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author_id)
        .bind(book.published)
        .bind(vec_to_json(&book.genres))
        .bind(&book.created_at)
        .execute(&mut *tx)
        .await?;

        authors::append_book(&mut *tx, &author.id, &book.id).await?;

        let author = authors::fetch_by_id(&mut *tx, &author.id)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;

        tx.commit().await?;

        Ok(AddedBook {
            book,
            author,
            author_created,
        })
    }
}
