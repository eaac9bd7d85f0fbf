use {
    serde_json::{Map, Value, json},
    telegate_common::{BridgeError, ErrorKind, FromMessage},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("{message}")]
    Message { message: String },
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

telegate_common::impl_context!();

// ── Provider failures ───────────────────────────────────────────────────────

/// How a request failed before a Bot API response could be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Connect,
    Timeout,
    Other,
}

/// A single failed Bot API attempt, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// HTTP status, or the `error_code` from the response body when present.
    pub status: Option<u16>,
    pub description: String,
    /// `parameters.retry_after` from a 429 response.
    pub retry_after: Option<u64>,
    pub transport: Option<TransportFailure>,
}

impl ProviderFailure {
    pub fn rejected(status: u16, description: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            description: description.into(),
            retry_after: None,
            transport: None,
        }
    }

    /// Build from a reqwest error. The request URL carries the bot token, so
    /// it is stripped before the error text is kept.
    pub fn transport(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportFailure::Timeout
        } else if err.is_connect() {
            TransportFailure::Connect
        } else {
            TransportFailure::Other
        };
        Self {
            status: err.status().map(|s| s.as_u16()),
            description: err.without_url().to_string(),
            retry_after: None,
            transport: Some(kind),
        }
    }

    /// Connection errors, timeouts and 5xx responses are worth another try.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.transport,
            Some(TransportFailure::Connect | TransportFailure::Timeout)
        ) || self.status.is_some_and(|s| s >= 500)
    }
}

const NOT_FOUND_PATTERNS: &[&str] = &["chat not found", "user not found", "peer_id_invalid"];
const BLOCKED_PATTERNS: &[&str] = &["bot was blocked by the user", "user is deactivated"];
const FORBIDDEN_PATTERNS: &[&str] = &["bot was kicked", "not enough rights"];

/// Map a failed attempt to exactly one error kind.
///
/// Checked in order: destination-not-found message patterns, blocked-user
/// patterns, forbidden patterns or 403, 429, 400, 5xx, then the
/// `DeliveryFailed` fallback.
#[must_use]
pub fn classify(failure: &ProviderFailure) -> BridgeError {
    let text = failure.description.to_ascii_lowercase();
    let matches_any = |patterns: &[&str]| patterns.iter().any(|p| text.contains(p));

    let (kind, hint) = if matches_any(NOT_FOUND_PATTERNS) {
        (
            ErrorKind::DestinationNotFound,
            Some("check the chat id; private chats only exist after the user has started the bot"),
        )
    } else if matches_any(BLOCKED_PATTERNS) {
        (
            ErrorKind::DestinationNotFound,
            Some("the user blocked the bot or deleted their account"),
        )
    } else if matches_any(FORBIDDEN_PATTERNS) || failure.status == Some(403) {
        (
            ErrorKind::Forbidden,
            Some("the bot lacks permission in this chat"),
        )
    } else {
        let kind = match failure.status {
            Some(429) => ErrorKind::RateLimited,
            Some(400) => ErrorKind::BadRequest,
            Some(s) if s >= 500 => ErrorKind::ProviderInternalError,
            _ => ErrorKind::DeliveryFailed,
        };
        (kind, None)
    };

    let message = match failure.status {
        Some(status) => format!("Telegram API error ({status}): {}", failure.description),
        None => format!("Telegram API request failed: {}", failure.description),
    };

    let mut details = Map::new();
    if let Some(status) = failure.status {
        details.insert("status".into(), json!(status));
    }
    if !failure.description.is_empty() {
        details.insert("description".into(), json!(failure.description));
    }
    if let Some(hint) = hint {
        details.insert("hint".into(), json!(hint));
    }
    if let Some(retry_after) = failure.retry_after {
        details.insert("retry_after".into(), json!(retry_after));
    }

    let err = BridgeError::new(kind, message);
    if details.is_empty() {
        err
    } else {
        err.with_details(Value::Object(details))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(400, "Bad Request: chat not found", ErrorKind::DestinationNotFound)]
    #[case(400, "Bad Request: user not found", ErrorKind::DestinationNotFound)]
    #[case(400, "Bad Request: PEER_ID_INVALID", ErrorKind::DestinationNotFound)]
    #[case(403, "Forbidden: bot was blocked by the user", ErrorKind::DestinationNotFound)]
    #[case(403, "Forbidden: user is deactivated", ErrorKind::DestinationNotFound)]
    #[case(403, "Forbidden: bot was kicked from the group chat", ErrorKind::Forbidden)]
    #[case(400, "Bad Request: not enough rights to send text messages", ErrorKind::Forbidden)]
    #[case(403, "Forbidden", ErrorKind::Forbidden)]
    #[case(429, "Too Many Requests: retry after 5", ErrorKind::RateLimited)]
    #[case(400, "Bad Request: message text is empty", ErrorKind::BadRequest)]
    #[case(500, "Internal Server Error", ErrorKind::ProviderInternalError)]
    #[case(502, "Bad Gateway", ErrorKind::ProviderInternalError)]
    #[case(409, "Conflict", ErrorKind::DeliveryFailed)]
    #[case(401, "Unauthorized", ErrorKind::DeliveryFailed)]
    fn classification_table(#[case] status: u16, #[case] description: &str, #[case] kind: ErrorKind) {
        let err = classify(&ProviderFailure::rejected(status, description));
        assert_eq!(err.kind, kind);
    }

    #[test]
    fn not_found_carries_a_hint() {
        let err = classify(&ProviderFailure::rejected(400, "Bad Request: chat not found"));
        let details = err.details.unwrap();
        assert!(details["hint"].as_str().unwrap().contains("started the bot"));
        assert_eq!(details["status"], 400);
    }

    #[test]
    fn blocked_hint_differs_from_not_found_hint() {
        let blocked = classify(&ProviderFailure::rejected(403, "Forbidden: bot was blocked by the user"));
        let missing = classify(&ProviderFailure::rejected(400, "Bad Request: chat not found"));
        assert_ne!(
            blocked.details.unwrap()["hint"],
            missing.details.unwrap()["hint"]
        );
    }

    #[test]
    fn rate_limit_reports_retry_after() {
        let failure = ProviderFailure {
            retry_after: Some(12),
            ..ProviderFailure::rejected(429, "Too Many Requests: retry after 12")
        };
        let err = classify(&failure);
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.details.unwrap()["retry_after"], 12);
    }

    #[test]
    fn transport_failure_without_status_is_delivery_failed() {
        let failure = ProviderFailure {
            status: None,
            description: "connection refused".into(),
            retry_after: None,
            transport: Some(TransportFailure::Connect),
        };
        assert!(failure.is_retryable());
        let err = classify(&failure);
        assert_eq!(err.kind, ErrorKind::DeliveryFailed);
        assert!(err.details.unwrap().get("status").is_none());
    }

    #[rstest]
    #[case(ProviderFailure::rejected(500, "x"), true)]
    #[case(ProviderFailure::rejected(503, "x"), true)]
    #[case(ProviderFailure::rejected(400, "x"), false)]
    #[case(ProviderFailure::rejected(429, "x"), false)]
    #[case(ProviderFailure { transport: Some(TransportFailure::Timeout), ..ProviderFailure::rejected(0, "t") }, true)]
    #[case(ProviderFailure { status: None, transport: Some(TransportFailure::Other), ..ProviderFailure::rejected(0, "decode") }, false)]
    fn retry_eligibility(#[case] failure: ProviderFailure, #[case] retryable: bool) {
        assert_eq!(failure.is_retryable(), retryable);
    }
}
