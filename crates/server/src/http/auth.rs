use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, error::ApiError};

/// Identity resolved by the bearer credential. `id` is `None` when the
/// token verified but carried no subject.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Option<String>,
}

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Rejects the request before any handler logic runs unless it carries a
/// valid bearer token; on success the resolved identity is attached to the
/// request.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer);

    let Some(token) = token else {
        tracing::warn!(
            path = %req.uri().path(),
            method = %req.method(),
            reason = "missing_token",
            "Unauthorized request"
        );
        return ApiError::Unauthorized.into_response();
    };

    match utils_jwt::verify(token, &state.config().auth_jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthUser {
                id: claims.subject().map(str::to_string),
            });
            next.run(req).await
        }
        Err(err) => {
            tracing::warn!(
                path = %req.uri().path(),
                method = %req.method(),
                reason = %err,
                "Unauthorized request"
            );
            ApiError::Unauthorized.into_response()
        }
    }
}
