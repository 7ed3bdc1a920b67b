//! API route definitions
//!
//! The primary API is GraphQL at /graphql. The REST routes here are
//! operational endpoints only.

pub mod health;
