use super::prelude::*;

#[derive(Default)]
pub struct BookMutations;

#[Object]
impl BookMutations {
    /// Add a book, creating its author on first mention, and notify
    /// `bookAdded` subscribers. Requires authentication.
    async fn add_book(&self, ctx: &Context<'_>, book_obj: BookInput) -> Result<Option<Book>> {
        let user = ctx.current_user()?;
        let db = ctx.data_unchecked::<Database>();
        let events = ctx.data_unchecked::<Arc<BookEvents>>();

        let args = json!({ "bookObj": &book_obj });
        let added = db
            .books()
            .add_with_author(NewBook {
                title: book_obj.title,
                author: book_obj.author,
                published: book_obj.published,
                genres: book_obj.genres,
            })
            .await
            .map_err(|e| ApiError::from_db(e, args))
            .extend_err()?;

        tracing::info!(
            book_id = %added.book.id,
            title = %added.book.title,
            author = %added.author.name,
            author_created = added.author_created,
            added_by = %user.username,
            "Book added"
        );

        let book = Book::from_record(added.book.clone(), Author::from(added.author.clone()));
        events.publish(BookAddedEvent {
            book: added.book,
            author: added.author,
        });

        Ok(Some(book))
    }
}
