use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use thiserror::Error;

use crate::auth::{verify_jwt, Identity};

/// Identity attached by [`authenticate_jwt`]; `None` for anonymous requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CurrentUser(pub Option<Identity>);

impl CurrentUser {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned().unwrap_or_default())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Must be logged in to access")]
    NotLoggedIn,

    #[error("Must be admin to access")]
    NotAdmin,

    #[error("Must be current user or admin to access")]
    NotSelfOrAdmin,
}

/// Attach the bearer token's identity, if any, to the request.
///
/// A missing or invalid token is not an error here: the request continues
/// anonymously and the `ensure_*` layers decide whether that matters.
pub async fn authenticate_jwt(mut request: Request, next: Next) -> Response {
    let identity = extract_bearer(request.headers()).and_then(|token| match verify_jwt(token) {
        Ok(identity) => Some(identity),
        Err(e) => {
            tracing::debug!("Ignoring bearer token: {}", e);
            None
        }
    });

    request.extensions_mut().insert(CurrentUser(identity));
    next.run(request).await
}

/// Token from an `Authorization: Bearer <token>` header (scheme is case-insensitive).
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub fn require_authenticated(identity: Option<&Identity>) -> Result<&Identity, AuthError> {
    identity.ok_or(AuthError::NotLoggedIn)
}

pub fn require_admin(identity: Option<&Identity>) -> Result<&Identity, AuthError> {
    identity.filter(|user| user.is_admin).ok_or(AuthError::NotAdmin)
}

pub fn require_self_or_admin<'a>(identity: Option<&'a Identity>, username: &str) -> Result<&'a Identity, AuthError> {
    identity
        .filter(|user| user.is_admin || user.username == username)
        .ok_or(AuthError::NotSelfOrAdmin)
}

fn current_identity(request: &Request) -> Option<&Identity> {
    request.extensions().get::<CurrentUser>().and_then(CurrentUser::identity)
}

/// Route layer: reject anonymous requests.
pub async fn ensure_logged_in(request: Request, next: Next) -> Result<Response, crate::error::ApiError> {
    require_authenticated(current_identity(&request))?;
    Ok(next.run(request).await)
}

/// Route layer: reject anyone but administrators.
pub async fn ensure_admin(request: Request, next: Next) -> Result<Response, crate::error::ApiError> {
    if let Err(e) = require_admin(current_identity(&request)) {
        tracing::warn!(path = %request.uri().path(), "Admin access denied");
        return Err(e.into());
    }
    Ok(next.run(request).await)
}
