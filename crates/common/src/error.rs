use {serde::Serialize, serde_json::Value, thiserror::Error};

/// Externally visible failure categories.
///
/// Every error that crosses a protocol boundary (HTTP response, JSON-RPC
/// error object) carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPayload,
    LegacyDialectDisabled,
    Unauthorized,
    SessionNotFound,
    DestinationNotAllowed,
    DestinationNotFound,
    Forbidden,
    BadRequest,
    RateLimited,
    ProviderInternalError,
    DeliveryFailed,
    InvalidSource,
    TooLarge,
    DownloadFailed,
}

impl ErrorKind {
    /// Wire name, identical to the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedPayload => "malformed_payload",
            Self::LegacyDialectDisabled => "legacy_dialect_disabled",
            Self::Unauthorized => "unauthorized",
            Self::SessionNotFound => "session_not_found",
            Self::DestinationNotAllowed => "destination_not_allowed",
            Self::DestinationNotFound => "destination_not_found",
            Self::Forbidden => "forbidden",
            Self::BadRequest => "bad_request",
            Self::RateLimited => "rate_limited",
            Self::ProviderInternalError => "provider_internal_error",
            Self::DeliveryFailed => "delivery_failed",
            Self::InvalidSource => "invalid_source",
            Self::TooLarge => "too_large",
            Self::DownloadFailed => "download_failed",
        }
    }

    /// HTTP status used when this kind is rendered as an HTTP response.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::MalformedPayload
            | Self::LegacyDialectDisabled
            | Self::BadRequest
            | Self::InvalidSource => 400,
            Self::Unauthorized => 401,
            Self::DestinationNotAllowed | Self::Forbidden => 403,
            Self::SessionNotFound | Self::DestinationNotFound => 404,
            Self::TooLarge => 413,
            Self::RateLimited => 429,
            Self::ProviderInternalError | Self::DeliveryFailed | Self::DownloadFailed => 502,
        }
    }

    /// JSON-RPC error code used when this kind is rendered inside a response
    /// frame. Envelope problems reuse the standard codes; everything else sits
    /// in the implementation-defined server error range.
    #[must_use]
    pub const fn jsonrpc_code(self) -> i64 {
        match self {
            Self::MalformedPayload | Self::LegacyDialectDisabled => -32600,
            Self::Unauthorized => -32001,
            Self::SessionNotFound => -32002,
            Self::DestinationNotAllowed => -32010,
            Self::DestinationNotFound => -32011,
            Self::Forbidden => -32012,
            Self::BadRequest => -32013,
            Self::RateLimited => -32014,
            Self::ProviderInternalError => -32015,
            Self::DeliveryFailed => -32016,
            Self::InvalidSource => -32020,
            Self::TooLarge => -32021,
            Self::DownloadFailed => -32022,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure: kind, human message and optional structured details
/// (remediation hints, provider error codes, retry-after seconds).
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct BridgeError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<Value>,
}

impl BridgeError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedPayload, message)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    #[must_use]
    pub fn session_not_found(session_id: &str) -> Self {
        Self::new(
            ErrorKind::SessionNotFound,
            format!("no open session with id '{session_id}'"),
        )
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized, "missing or invalid bearer token")
    }

    /// Body rendered at protocol boundaries: `{kind, message, details?}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut body = serde_json::json!({
            "kind": self.kind,
            "message": self.message,
        });
        if let (Some(details), Some(obj)) = (&self.details, body.as_object_mut()) {
            obj.insert("details".into(), details.clone());
        }
        body
    }
}

impl FromMessage for BridgeError {
    fn from_message(message: String) -> Self {
        Self::new(ErrorKind::DeliveryFailed, message)
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

// ── Shared context trait ────────────────────────────────────────────────────

/// Trait for error types that can be constructed from a plain message string.
///
/// Implement this for your crate's error type, then invoke [`impl_context!`]
/// in your error module to get `.context()` and `.with_context()` on `Result`
/// and `Option`.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Generate a crate-local `Context` trait with `.context()` and `.with_context()`
/// methods on `Result` and `Option`.
///
/// Invoke inside a module that defines `Error: FromMessage` and
/// `type Result<T> = std::result::Result<T, Error>`.
///
/// ```ignore
/// // in crates/foo/src/error.rs
/// telegate_common::impl_context!();
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;
            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                let ctx = context.into();
                self.map_err(|source| {
                    <Error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.map_err(|source| {
                    let ctx = f().into();
                    <Error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }
        }

        impl<T> Context<T> for Option<T> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(context.into()))
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(f().into()))
            }
        }
    };
}
