use super::prelude::*;

#[derive(Default)]
pub struct AuthorMutations;

#[Object]
impl AuthorMutations {
    /// Set an author's birth year. Requires authentication.
    async fn edit_author(
        &self,
        ctx: &Context<'_>,
        name: String,
        set_born_to: i32,
    ) -> Result<Option<Author>> {
        ctx.current_user()?;
        let db = ctx.data_unchecked::<Database>();

        let updated = db
            .authors()
            .set_born(&name, set_born_to)
            .await
            .map_err(|e| ApiError::from_db(e, json!({ "name": &name, "setBornTo": set_born_to })))
            .extend_err()?;

        match updated {
            Some(author) => {
                tracing::info!(author = %author.name, born = set_born_to, "Author updated");
                Ok(Some(Author::from(author)))
            }
            None => Err(ApiError::NotFound {
                entity: "Author",
                args: json!({ "name": name, "setBornTo": set_born_to }),
            }
            .extend()),
        }
    }
}
