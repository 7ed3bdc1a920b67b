use super::prelude::*;
use crate::graphql::helpers::populate_books;

#[derive(Default)]
pub struct BookQueries;

#[Object]
impl BookQueries {
    /// Total number of books
    async fn book_count(&self, ctx: &Context<'_>) -> Result<i32> {
        let db = ctx.data_unchecked::<Database>();
        let count = db.books().count().await.map_err(ApiError::from).extend_err()?;
        Ok(count as i32)
    }

    /// Books, optionally filtered by exact author name and/or any of a set of genres
    async fn all_books(
        &self,
        ctx: &Context<'_>,
        author: Option<String>,
        genres: Option<Vec<Option<String>>>,
    ) -> Result<Vec<Book>> {
        let db = ctx.data_unchecked::<Database>();
        let mut filter = BookFilter {
            author_id: None,
            genres: genres.unwrap_or_default().into_iter().flatten().collect(),
        };

        if let Some(name) = author {
            match db
                .authors()
                .get_by_name(&name)
                .await
                .map_err(ApiError::from)
                .extend_err()?
            {
                Some(found) => filter.author_id = Some(found.id),
                None => return Ok(Vec::new()),
            }
        }

        let records = db.books().list(&filter).await.map_err(ApiError::from).extend_err()?;
        populate_books(db, records).await.extend_err()
    }
}
