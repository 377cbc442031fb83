//! Anonymous caller identity carried in a signed cookie.

use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use cookie::Cookie;
use snip_core::UserId;
use std::convert::Infallible;
use tracing::{trace, warn};

pub const COOKIE_NAME: &str = "user_id";

/// The caller's identity for this request.
///
/// Extracting it never fails: a missing or forged cookie yields a fresh
/// identity. Returning it from a handler (re-)sets the cookie.
#[derive(Debug, Clone)]
pub struct Identity {
    user_id: UserId,
    token: String,
}

impl Identity {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

fn presented_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == COOKIE_NAME)
        .map(|cookie| cookie.value().to_owned())
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = presented_token(&parts.headers);
        let (user_id, token) = state.codec().resolve(presented.as_deref());
        trace!(user_id = %user_id, reused = presented.as_deref() == Some(token.as_str()), "identity resolved");
        Ok(Self { user_id, token })
    }
}

impl IntoResponseParts for Identity {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let cookie = Cookie::build((COOKIE_NAME, self.token))
            .path("/")
            .http_only(true)
            .build();

        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                res.headers_mut().append(SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, "identity cookie is not a valid header value"),
        }
        Ok(res)
    }
}
