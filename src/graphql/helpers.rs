// Helper functions shared across GraphQL query/mutation modules.

use std::collections::HashMap;

use crate::db::{BookRecord, Database};
use crate::graphql::error::ApiError;
use crate::graphql::types::{Author, Book};

/// Attach each book's author, loading all referenced authors in one query.
/// Books whose author row is missing are dropped with a warning.
pub(crate) async fn populate_books(
    db: &Database,
    records: Vec<BookRecord>,
) -> Result<Vec<Book>, ApiError> {
    let mut author_ids: Vec<String> = records.iter().map(|b| b.author_id.clone()).collect();
    author_ids.sort();
    author_ids.dedup();

    let authors: HashMap<String, Author> = db
        .authors()
        .list_by_ids(&author_ids)
        .await?
        .into_iter()
        .map(|a| (a.id.clone(), Author::from(a)))
        .collect();

    Ok(records
        .into_iter()
        .filter_map(|book| match authors.get(&book.author_id) {
            Some(author) => Some(Book::from_record(book, author.clone())),
            None => {
                tracing::warn!(book_id = %book.id, author_id = %book.author_id, "Book references missing author");
                None
            }
        })
        .collect())
}
