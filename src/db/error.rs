//! Persistence errors

use thiserror::Error;

/// Error returned by repository operations
#[derive(Debug, Error)]
pub enum DbError {
    /// A write was rejected by a column constraint (required, unique, min length)
    #[error("{table}.{field}: {message}")]
    Validation {
        table: String,
        field: String,
        message: String,
    },

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

impl DbError {
    pub fn validation(
        table: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            table: table.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    /// Unique-constraint violations are reported as validation errors naming
    /// the offending column; everything else stays a driver error.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            // SQLite: "UNIQUE constraint failed: books.title"
            let target = db_err
                .message()
                .rsplit(": ")
                .next()
                .unwrap_or_default()
                .to_string();
            let (table, field) = target
                .split_once('.')
                .map(|(t, f)| (t.to_string(), f.to_string()))
                .unwrap_or_else(|| (String::new(), target.clone()));
            return Self::Validation {
                table,
                message: format!("{} must be unique", field),
                field,
            };
        }
        Self::Sqlx(err)
    }
}
