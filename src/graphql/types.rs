//! GraphQL types for the API

use async_graphql::{ComplexObject, Context, ID, InputObject, Result, SimpleObject};

use super::error::{ApiError, ApiResultExt};
use crate::db::{AuthorRecord, BookRecord, Database, UserRecord};

// ============================================================================
// Output Types
// ============================================================================

#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex)]
pub struct Author {
    pub name: String,
    pub born: Option<i32>,
    pub id: ID,
    /// Book ids in creation order
    #[graphql(skip)]
    pub book_ids: Vec<String>,
}

#[ComplexObject]
impl Author {
    /// Books by this author, oldest first
    async fn books(&self, ctx: &Context<'_>) -> Result<Vec<Book>> {
        let db = ctx.data_unchecked::<Database>();
        let records = db
            .books()
            .list_by_ids(&self.book_ids)
            .await
            .map_err(ApiError::from)
            .extend_err()?;

        Ok(records
            .into_iter()
            .map(|book| Book::from_record(book, self.clone()))
            .collect())
    }

    /// Number of books by this author
    async fn book_count(&self) -> i32 {
        self.book_ids.len() as i32
    }
}

impl From<AuthorRecord> for Author {
    fn from(r: AuthorRecord) -> Self {
        Self {
            name: r.name,
            born: r.born,
            id: ID(r.id),
            book_ids: r.books,
        }
    }
}

/// A book with its author populated
#[derive(Debug, Clone, SimpleObject)]
pub struct Book {
    pub title: String,
    pub author: Author,
    pub published: i32,
    pub genres: Vec<String>,
    pub id: ID,
}

impl Book {
    pub fn from_record(r: BookRecord, author: Author) -> Self {
        Self {
            title: r.title,
            author,
            published: r.published,
            genres: r.genres,
            id: ID(r.id),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct User {
    pub username: String,
    pub favorite_genre: String,
    pub id: ID,
}

impl From<&UserRecord> for User {
    fn from(r: &UserRecord) -> Self {
        Self {
            username: r.username.clone(),
            favorite_genre: r.favorite_genre.clone(),
            id: ID(r.id.clone()),
        }
    }
}

/// Signed bearer token returned by `login`
#[derive(Debug, Clone, SimpleObject)]
pub struct Token {
    pub value: String,
}

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone, InputObject, serde::Serialize)]
pub struct BookInput {
    pub title: String,
    /// Author name; an author with this name is created if none exists
    pub author: String,
    pub published: i32,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, InputObject)]
pub struct UserInput {
    pub username: String,
    pub favorite_genre: String,
    pub password: String,
}

#[derive(Debug, Clone, InputObject)]
pub struct CredentialsInput {
    pub username: String,
    pub password: String,
}
