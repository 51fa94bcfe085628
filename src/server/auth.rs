//! Bearer-key guard for the moderation API.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::{TypedHeader, TypedHeaderRejection},
};
use skipsplice_core::Error;

use crate::server::error::AppError;
use crate::server::AppContext;

/// Compare a presented bearer token with the configured admin key.
///
/// No configured key means the moderation API is open.
pub fn check_admin_key(configured: Option<&str>, bearer_token: Option<&str>) -> bool {
    let Some(expected) = configured.filter(|k| !k.is_empty()) else {
        return true;
    };
    bearer_token == Some(expected)
}

/// Middleware applied to `/api/moderation/*`.
///
/// A missing or malformed `Authorization` header is treated like a wrong
/// key so every refusal carries the same 401 body.
pub async fn admin_auth_middleware(
    State(ctx): State<AppContext>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let bearer_token = bearer.ok().map(|TypedHeader(auth)| auth.token().to_string());

    if check_admin_key(
        ctx.config.server.admin_api_key.as_deref(),
        bearer_token.as_deref(),
    ) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "Rejected moderation request without valid key");
    AppError::from(Error::Unauthorized("missing or invalid admin key".into())).into_response()
}
