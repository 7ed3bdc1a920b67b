use super::prelude::*;

#[derive(Default)]
pub struct UserQueries;

#[Object]
impl UserQueries {
    /// The user behind the request's bearer token, if any
    async fn loggedin_user(&self, ctx: &Context<'_>) -> Option<User> {
        ctx.try_current_user().map(User::from)
    }
}
