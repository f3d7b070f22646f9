use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::{dto::Principal, session};
use crate::state::AppState;

/// The request's principal, if any. Never rejects; guarded operations decide
/// what an anonymous caller may do.
pub struct CurrentUser(pub Option<Principal>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(session::resolve(
            &parts.headers,
            &state.keys,
            &state.config.session.cookie_name,
        )))
    }
}
