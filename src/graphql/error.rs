//! User-facing GraphQL errors
//!
//! Every resolver failure is one of these kinds. Each renders as a GraphQL
//! error with `extensions.code` and, where the caller's input caused it,
//! `extensions.invalidArgs` holding the offending arguments.

use async_graphql::{ErrorExtensions, Value};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::db::DbError;
use crate::services::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// An operation that needs a current user was called anonymously
    #[error("user not authenticated")]
    Unauthenticated,

    /// The bearer token could not be verified
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("{entity} does not exist")]
    NotFound {
        entity: &'static str,
        args: JsonValue,
    },

    /// The store rejected a write
    #[error("{message}")]
    Validation {
        field: String,
        message: String,
        args: JsonValue,
    },

    #[error("wrong credentials")]
    InvalidCredentials { username: String },

    #[error("internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated | ApiError::InvalidToken(_) => "UNAUTHENTICATED",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Validation { .. } | ApiError::InvalidCredentials { .. } => "BAD_USER_INPUT",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Map a persistence error, attaching the arguments that caused it
    pub fn from_db(err: DbError, args: JsonValue) -> Self {
        match err {
            DbError::Validation { field, message, .. } => ApiError::Validation {
                field,
                message,
                args,
            },
            DbError::Sqlx(e) => {
                tracing::error!(error = %e, "Database error");
                ApiError::Internal(e.into())
            }
        }
    }

    /// Map an authentication service error
    pub fn from_auth(err: AuthError, args: JsonValue) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials {
                username: args
                    .get("username")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            AuthError::InvalidToken(e) => ApiError::InvalidToken(e.to_string()),
            AuthError::Db(e) => ApiError::from_db(e, args),
            other => {
                tracing::error!(error = %other, "Authentication service error");
                ApiError::Internal(other.into())
            }
        }
    }

    fn invalid_args(&self) -> Option<JsonValue> {
        match self {
            ApiError::NotFound { args, .. } | ApiError::Validation { args, .. } => {
                Some(args.clone())
            }
            ApiError::InvalidCredentials { username } => {
                Some(serde_json::json!({ "username": username }))
            }
            _ => None,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::from_db(err, JsonValue::Null)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.code();
        let invalid_args = self
            .invalid_args()
            .and_then(|args| Value::from_json(args).ok());
        let field = match self {
            ApiError::Validation { field, .. } => Some(field.clone()),
            _ => None,
        };

        async_graphql::Error::new(self.to_string()).extend_with(move |_, e| {
            e.set("code", code);
            if let Some(field) = &field {
                e.set("field", field.as_str());
            }
            if let Some(args) = &invalid_args {
                e.set("invalidArgs", args.clone());
            }
        })
    }
}

/// Convert a resolver result into an `async_graphql::Result` carrying the error code
pub(crate) trait ApiResultExt<T> {
    fn extend_err(self) -> async_graphql::Result<T>;
}

impl<T> ApiResultExt<T> for Result<T, ApiError> {
    fn extend_err(self) -> async_graphql::Result<T> {
        self.map_err(|e| e.extend())
    }
}
