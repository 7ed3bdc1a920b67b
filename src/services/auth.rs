//! Authentication service for user management and JWT handling
//!
//! Provides:
//! - User creation with bcrypt password hashing
//! - Login against the stored hash
//! - JWT token generation and validation
//! - Resolving a bearer token to the current user

use std::sync::OnceLock;

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::db::{CreateUser, Database, DbError, UserRecord, UsersRepository};

// ============================================================================
// JWT Claims
// ============================================================================

/// Claims embedded in issued tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Username at the time of login
    pub username: String,
    /// User ID
    pub id: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password. Deliberately does not say which.
    #[error("wrong credentials")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("token lifetime of {0}s is out of range")]
    TokenLifetime(i64),

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Db(#[from] DbError),
}

// ============================================================================
// Configuration
// ============================================================================

/// Auth service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,
    /// Token lifetime in seconds (default: 24 hours)
    pub token_lifetime: i64,
    /// Bcrypt cost factor
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            token_lifetime: config.token_lifetime_secs,
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

// ============================================================================
// Auth Service
// ============================================================================

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    config: AuthConfig,
    /// Hash checked when the username is unknown, so both login failures
    /// cost one bcrypt verification
    dummy_hash: OnceLock<String>,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(db: Database, config: AuthConfig) -> Self {
        Self {
            db,
            config,
            dummy_hash: OnceLock::new(),
        }
    }

    /// Validate and store a new user with a hashed password
    pub async fn create_user(
        &self,
        username: &str,
        favorite_genre: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        // Column checks run before hashing
        UsersRepository::validate(username, favorite_genre)?;

        let password_hash = self.hash_password(password)?;
        let user = self
            .db
            .users()
            .create(CreateUser {
                username: username.to_string(),
                favorite_genre: favorite_genre.to_string(),
                password_hash,
            })
            .await?;

        Ok(user)
    }

    /// Verify username and password and issue a token
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let Some(user) = self.db.users().get_by_username(username).await? else {
            self.verify_password(password, self.dummy_hash()?)?;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_token(&user)
    }

    /// Sign a token embedding the user's name and id
    pub fn issue_token(&self, user: &UserRecord) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = Duration::try_seconds(self.config.token_lifetime)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(AuthError::TokenLifetime(self.config.token_lifetime))?;
        let claims = TokenClaims {
            username: user.username.clone(),
            id: user.id.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(AuthError::Signing)
    }

    /// Verify signature and expiry and return the claims
    pub fn decode_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(AuthError::InvalidToken)
    }

    /// Resolve a bearer token to its user.
    ///
    /// A token that fails verification is an error. A valid token whose user
    /// no longer exists resolves to `None`.
    pub async fn resolve_token(&self, token: &str) -> Result<Option<UserRecord>, AuthError> {
        let claims = self.decode_token(token)?;
        let user = self.db.users().get_by_id(&claims.id).await?;
        if user.is_none() {
            tracing::debug!(user_id = %claims.id, "Token refers to unknown user");
        }
        Ok(user)
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// Hash a password with bcrypt
    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        Ok(hash(password, self.config.bcrypt_cost)?)
    }

    /// Verify a password against a hash
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        Ok(verify(password, hash)?)
    }

    /// A hash at the configured cost that no real password is checked against
    fn dummy_hash(&self) -> Result<&str, AuthError> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash.as_str());
        }
        let hash = self.hash_password("bookshelf-unknown-user")?;
        Ok(self.dummy_hash.get_or_init(|| hash).as_str())
    }
}
