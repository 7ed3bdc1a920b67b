//! Users repository for authentication

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::error::DbResult;
use super::schema::{ColumnDef, DatabaseSchema};
use super::sqlite_helpers::{new_id, now_iso8601};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub favorite_genre: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub favorite_genre: String,
    pub password_hash: String,
}

impl DatabaseSchema for UserRecord {
    const TABLE_NAME: &'static str = "users";

    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("id", "TEXT").primary_key(),
            ColumnDef::new("username", "TEXT").unique().min_length(3),
            ColumnDef::new("favorite_genre", "TEXT"),
            ColumnDef::new("password_hash", "TEXT"),
            ColumnDef::new("created_at", "TEXT"),
        ];
        COLUMNS
    }
}

type UserRow = (String, String, String, String, String);

fn from_row(r: UserRow) -> UserRecord {
    UserRecord {
        id: r.0,
        username: r.1,
        favorite_genre: r.2,
        password_hash: r.3,
        created_at: r.4,
    }
}

pub struct UsersRepository {
    pool: SqlitePool,
}

impl UsersRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Validate the username and favorite genre, then create the user.
    pub async fn create(&self, user: CreateUser) -> DbResult<UserRecord> {
        Self::validate(&user.username, &user.favorite_genre)?;

        let record = UserRecord {
            id: new_id(),
            username: user.username,
            favorite_genre: user.favorite_genre,
            password_hash: user.password_hash,
            created_at: now_iso8601(),
        };

        sqlx::query(
            "INSERT INTO users (id, username, favorite_genre, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.username)
        .bind(&record.favorite_genre)
        .bind(&record.password_hash)
        .bind(&record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Column checks for a prospective user, usable before hashing a password
    pub fn validate(username: &str, favorite_genre: &str) -> DbResult<()> {
        UserRecord::validate_text("username", username)?;
        UserRecord::validate_text("favorite_genre", favorite_genre)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<UserRecord>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", UserRecord::select_columns());
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(from_row))
    }

    /// Get user by exact username
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<UserRecord>> {
        let sql = format!(
            "SELECT {} FROM users WHERE username = ?",
            UserRecord::select_columns()
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(from_row))
    }
}
