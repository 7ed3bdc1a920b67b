//! Bookshelf - GraphQL API for books, authors and users
//!
//! All operations are exposed via GraphQL at /graphql, with the `bookAdded`
//! subscription served over WebSocket at /graphql/ws.

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod graphql;
pub mod services;

pub use app::{AppState, build_app, serve};
