//! Application services shared by the GraphQL layer

pub mod auth;
pub mod events;

pub use auth::{AuthConfig, AuthError, AuthService, TokenClaims};
pub use events::{BookAddedEvent, BookEvents};
