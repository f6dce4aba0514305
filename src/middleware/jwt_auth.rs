use crate::{
    app_state::AppState,
    error::{ApiError, Result},
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;

/// Request extension storing the verified caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub uid: String,
}

/// Caller authentication middleware
///
/// A request without an Authorization header passes through with no
/// identity attached; the handler decides whether that is acceptable.
/// A header that is present but malformed, expired or badly signed is
/// rejected with `unauthenticated`.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    if !request.headers().contains_key("authorization") {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated("Invalid Authorization header".to_string()))?;

    // Parse "Bearer <token>" format
    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::Unauthenticated(
            "Invalid Authorization format, expected 'Bearer <token>'".to_string(),
        )
    })?;

    let claims = state.jwt_service.validate_token(token)?;

    request
        .extensions_mut()
        .insert(UserIdentity { uid: claims.sub });

    Ok(next.run(request).await)
}

/// Required identity; rejects with `unauthenticated` when absent
impl<S> FromRequestParts<S> for UserIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserIdentity>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthenticated("User must be logged in.".to_string()))
    }
}

/// `Option<UserIdentity>` for handlers that check authentication themselves
impl<S> OptionalFromRequestParts<S> for UserIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<UserIdentity>().cloned())
    }
}
