//! GraphQL subscriptions for real-time updates
//!
//! Subscriptions allow clients to receive push updates over WebSocket.

use std::sync::Arc;

use async_graphql::{Context, Subscription};
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::types::{Author, Book};
use crate::services::BookEvents;

#[derive(Default)]
pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Every book added after the subscription starts, in publish order
    async fn book_added<'ctx>(&self, ctx: &Context<'ctx>) -> impl Stream<Item = Book> + 'ctx {
        let events = ctx.data_unchecked::<Arc<BookEvents>>();
        let receiver = events.subscribe();

        BroadcastStream::new(receiver).filter_map(|result| match result {
            Ok(event) => Some(Book::from_record(event.book, Author::from(event.author))),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "bookAdded subscriber lagged, events dropped");
                None
            }
        })
    }
}
