//! Bearer-token guard for the channel-open and submission routes.

use {
    axum::{
        body::Body,
        extract::{Request, State},
        http::{HeaderValue, header},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    secrecy::ExposeSecret,
    subtle::ConstantTimeEq,
    telegate_common::BridgeError,
    tracing::warn,
};

use crate::{error::ApiError, server::AppState};

/// Reject requests without a matching `Authorization: Bearer <token>` header.
/// A no-op when no token is configured.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    if let Some(token) = presented
        && token_matches(token, expected.expose_secret())
    {
        return next.run(request).await;
    }

    warn!(
        path = %request.uri().path(),
        header_present = presented.is_some(),
        "rejected request without a valid bearer token"
    );
    let mut response = ApiError(BridgeError::unauthorized()).into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret", "s3cre"));
        assert!(!token_matches("", "s3cret"));
        assert!(!token_matches("S3CRET", "s3cret"));
    }
}
