use super::prelude::*;

#[derive(Default)]
pub struct UserMutations;

#[Object]
impl UserMutations {
    /// Register a new user
    async fn create_user(&self, ctx: &Context<'_>, user: UserInput) -> Result<Option<User>> {
        let auth = ctx.data_unchecked::<Arc<AuthService>>();

        let created = auth
            .create_user(&user.username, &user.favorite_genre, &user.password)
            .await
            .map_err(|e| {
                ApiError::from_auth(
                    e,
                    json!({
                        "user": {
                            "username": &user.username,
                            "favoriteGenre": &user.favorite_genre,
                        }
                    }),
                )
            })
            .extend_err()?;

        tracing::info!(user_id = %created.id, username = %created.username, "User created");
        Ok(Some(User::from(&created)))
    }

    /// Exchange a username and password for a signed token
    async fn login(&self, ctx: &Context<'_>, credentials: CredentialsInput) -> Result<Option<Token>> {
        let auth = ctx.data_unchecked::<Arc<AuthService>>();

        match auth.login(&credentials.username, &credentials.password).await {
            Ok(value) => {
                tracing::info!(username = %credentials.username, "User logged in");
                Ok(Some(Token { value }))
            }
            Err(e) => {
                tracing::warn!(username = %credentials.username, error = %e, "Login failed");
                Err(ApiError::from_auth(e, json!({ "username": &credentials.username })).extend())
            }
        }
    }
}
