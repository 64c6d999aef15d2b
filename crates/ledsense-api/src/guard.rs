//! Bearer token guard.
//!
//! A handler that takes [`AuthUser`] as its first argument only runs for
//! callers presenting a valid `Authorization: Bearer <token>` header; it
//! receives the token's `user_id`. [`require_token`] applies the same check
//! as middleware to a whole group of routes.
//!
//! Rejection happens before the handler runs, so a rejected request never
//! touches the store.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::{AuthError, TokenKeys};
use crate::error::ApiError;
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// The authenticated caller's user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.split(' ').next()?;
    (!token.is_empty()).then_some(token)
}

/// Verify the request's bearer token.
///
/// # Errors
///
/// [`AuthError::MissingToken`] when there is no usable header,
/// [`AuthError::InvalidToken`] when the token does not verify.
pub fn authenticate(headers: &HeaderMap, keys: &TokenKeys) -> Result<AuthUser, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
    let claims = keys.verify(token)?;
    Ok(AuthUser(claims.user_id))
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<Self>() {
            return Ok(*user);
        }
        Ok(authenticate(&parts.headers, &state.tokens)?)
    }
}

/// Middleware form of the guard for route groups.
///
/// On success the [`AuthUser`] is stored in the request extensions so a
/// downstream [`AuthUser`] extractor does not verify the token twice.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(request.headers(), &state.tokens)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("bearer abc")), None);
        assert_eq!(bearer_token(&headers("abc")), None);
    }

    #[test]
    fn authenticate_returns_embedded_user() {
        let keys = TokenKeys::new("guard-secret", 24).unwrap();
        let token = keys.issue(9).unwrap();
        let user = authenticate(&headers(&format!("Bearer {token}")), &keys).unwrap();
        assert_eq!(user, AuthUser(9));
    }

    #[test]
    fn authenticate_distinguishes_missing_from_invalid() {
        let keys = TokenKeys::new("guard-secret", 24).unwrap();
        assert!(matches!(
            authenticate(&HeaderMap::new(), &keys),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            authenticate(&headers("Bearer nope"), &keys),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
