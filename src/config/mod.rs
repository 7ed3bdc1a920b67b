//! Application configuration management

use std::env;

use anyhow::{Context, Result, bail};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite connection URL (e.g. `sqlite:bookshelf.db` or `sqlite::memory:`)
    pub database_url: String,

    /// Maximum pool size for file-backed databases
    pub database_max_connections: u32,

    /// JWT secret for token signing and verification
    pub jwt_secret: String,

    /// Lifetime of issued tokens in seconds
    pub token_lifetime_secs: i64,

    /// Bcrypt cost factor for password hashes
    pub bcrypt_cost: u32,

    /// Capacity of the book event broadcast channel
    pub book_events_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is required")?;
        // Trim any whitespace/newlines from the secret
        let jwt_secret = jwt_secret.trim().to_string();
        if jwt_secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:bookshelf.db".to_string()),

            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            jwt_secret,

            token_lifetime_secs: parse_token_lifetime(
                &env::var("TOKEN_LIFETIME_SECS").unwrap_or_else(|_| "86400".to_string()),
            )?,

            bcrypt_cost: env::var("BCRYPT_COST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(bcrypt::DEFAULT_COST),

            book_events_capacity: env::var("BOOK_EVENTS_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(256),
        })
    }
}

/// Longest accepted token lifetime: ten years
const MAX_TOKEN_LIFETIME_SECS: i64 = 10 * 365 * 24 * 60 * 60;

fn parse_token_lifetime(value: &str) -> Result<i64> {
    let secs: i64 = value.trim().parse().context("Invalid TOKEN_LIFETIME_SECS")?;
    if !(1..=MAX_TOKEN_LIFETIME_SECS).contains(&secs) {
        bail!(
            "TOKEN_LIFETIME_SECS must be between 1 and {}, got {}",
            MAX_TOKEN_LIFETIME_SECS,
            secs
        );
    }
    Ok(secs)
}
