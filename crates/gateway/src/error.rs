//! HTTP rendering of bridge errors.

use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde_json::json,
    telegate_common::BridgeError,
};

/// A [`BridgeError`] returned from a handler, rendered as
/// `{"error": {kind, message, details?}}` with the kind's status code.
#[derive(Debug)]
pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.to_json() }))).into_response()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, telegate_common::ErrorKind};

    #[test]
    fn status_follows_kind() {
        let resp = ApiError(BridgeError::session_not_found("abc")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ApiError(BridgeError::new(ErrorKind::MalformedPayload, "bad")).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError(BridgeError::unauthorized()).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
