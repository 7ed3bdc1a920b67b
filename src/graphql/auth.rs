//! GraphQL authentication
//!
//! Each request's bearer token is resolved to a [`CurrentUser`] before the
//! operation runs and attached as request data. Resolvers that require a
//! user call [`AuthExt::current_user`].

use async_graphql::{Context, Data, ErrorExtensions, Result};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use super::error::ApiError;
use crate::db::UserRecord;
use crate::services::AuthService;

/// The user behind the request's bearer token
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

/// Extract the token from an `Authorization: Bearer <token>` value.
/// The scheme is matched case-insensitively.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_at_checked(7)?;
    scheme.eq_ignore_ascii_case("bearer ").then_some(token.trim())
}

/// Extract bearer token from Authorization header
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
}

/// Resolve the request's optional bearer token to the current user.
///
/// No token gives an anonymous request. A token that fails verification
/// fails the whole request.
pub async fn resolve_current_user(
    auth: &AuthService,
    token: Option<&str>,
) -> Result<Option<CurrentUser>, ApiError> {
    let Some(token) = token else {
        return Ok(None);
    };

    match auth.resolve_token(token).await {
        Ok(Some(user)) => {
            tracing::debug!(user_id = %user.id, username = %user.username, "Request authenticated");
            Ok(Some(CurrentUser(user)))
        }
        Ok(None) => Ok(None),
        Err(e) => {
            tracing::warn!(error = %e, "Rejected bearer token");
            Err(ApiError::from_auth(e, serde_json::Value::Null))
        }
    }
}

/// Connection data for a WebSocket session
pub fn connection_data(user: Option<CurrentUser>) -> Data {
    let mut data = Data::default();
    if let Some(user) = user {
        data.insert(user);
    }
    data
}

/// Extension trait to get the current user from GraphQL context
pub trait AuthExt {
    /// Get the current user, or return an error if not authenticated
    fn current_user(&self) -> Result<&UserRecord>;

    /// Get the current user if present
    fn try_current_user(&self) -> Option<&UserRecord>;
}

impl<'a> AuthExt for Context<'a> {
    fn current_user(&self) -> Result<&UserRecord> {
        self.try_current_user()
            .ok_or_else(|| ApiError::Unauthenticated.extend())
    }

    fn try_current_user(&self) -> Option<&UserRecord> {
        self.data_opt::<CurrentUser>().map(|user| &user.0)
    }
}
