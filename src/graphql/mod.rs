//! GraphQL API with subscriptions for real-time updates
//!
//! This module provides a GraphQL API using async-graphql with support for
//! queries, mutations, and subscriptions over WebSocket.
//!
//! Queries and mutations are split per entity under `queries/` and
//! `mutations/` and merged into the roots in `schema.rs`.

pub mod auth;
pub mod error;
mod helpers;
pub mod mutations;
pub mod queries;
mod schema;
mod subscriptions;
pub mod types;

pub use auth::{AuthExt, CurrentUser, connection_data, extract_token, resolve_current_user};
pub use error::ApiError;
pub use schema::{BookshelfSchema, MutationRoot, QueryRoot, build_schema};
pub use subscriptions::SubscriptionRoot;
