pub mod authors;
pub mod books;
pub mod user;

pub use authors::AuthorMutations;
pub use books::BookMutations;
pub use user::UserMutations;

pub(crate) mod prelude {
    pub(crate) use std::sync::Arc;

    pub(crate) use async_graphql::{Context, ErrorExtensions, Object, Result};
    pub(crate) use serde_json::json;

    pub(crate) use crate::db::*;
    pub(crate) use crate::graphql::auth::AuthExt;
    pub(crate) use crate::graphql::error::{ApiError, ApiResultExt};
    pub(crate) use crate::graphql::types::*;
    pub(crate) use crate::services::{AuthService, BookAddedEvent, BookEvents};
}
