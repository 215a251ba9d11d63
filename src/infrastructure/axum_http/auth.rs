use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

pub const SESSION_TOKEN_HEADER: &str = "x-parse-session-token";

/// Raw `X-Parse-Session-Token` header of the request, if any.
///
/// Resolving the token to a user is left to the use case so a missing or
/// rejected token surfaces as the same `user not logged in` error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionToken(pub Option<String>);

impl SessionToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(SESSION_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(SessionToken(token))
    }
}
