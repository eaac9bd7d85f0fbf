//! Configuration validation.
//!
//! Checks a loaded [`TelegateConfig`] for values that would make the bridge
//! unusable or unsafe, and reports them as diagnostics instead of failing on
//! the first problem.

use crate::schema::TelegateConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "missing", "range", "format", "security"
    pub category: &'static str,
    /// Dotted path, e.g. "telegram.max_attempts"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.category, self.path, self.message
        )
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate a fully loaded config (after env overrides).
#[must_use]
pub fn validate(config: &TelegateConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !config.telegram.has_token() {
        result.push(
            Severity::Error,
            "missing",
            "telegram.bot_token",
            "a bot token is required (set it in the config file or TELEGRAM_BOT_TOKEN)",
        );
    }
    if config.telegram.max_attempts == 0 {
        result.push(
            Severity::Error,
            "range",
            "telegram.max_attempts",
            "must be at least 1",
        );
    }
    if config.telegram.rate_limit.capacity == 0 {
        result.push(
            Severity::Error,
            "range",
            "telegram.rate_limit.capacity",
            "must be at least 1",
        );
    }
    if config.telegram.rate_limit.refill_ms == 0 {
        result.push(
            Severity::Error,
            "range",
            "telegram.rate_limit.refill_ms",
            "must be greater than zero",
        );
    }
    if config.telegram.request_timeout_secs == 0 {
        result.push(
            Severity::Error,
            "range",
            "telegram.request_timeout_secs",
            "must be greater than zero",
        );
    }
    if !config.telegram.api_base.starts_with("http://")
        && !config.telegram.api_base.starts_with("https://")
    {
        result.push(
            Severity::Error,
            "format",
            "telegram.api_base",
            format!("'{}' is not an http(s) URL", config.telegram.api_base),
        );
    }
    for (i, id) in config.telegram.allowed_chat_ids.iter().enumerate() {
        if id.trim().parse::<i64>().is_err() {
            result.push(
                Severity::Error,
                "format",
                &format!("telegram.allowed_chat_ids[{i}]"),
                format!("'{id}' is not a numeric chat id (aliases are resolved at call time)"),
            );
        }
    }

    for (path, value) in [
        ("server.sse_path", &config.server.sse_path),
        ("server.message_path", &config.server.message_path),
    ] {
        if !value.starts_with('/') {
            result.push(
                Severity::Error,
                "format",
                path,
                format!("'{value}' must start with '/'"),
            );
        }
    }
    if config.server.sse_path == config.server.message_path {
        result.push(
            Severity::Error,
            "format",
            "server.message_path",
            "must differ from server.sse_path",
        );
    }
    if config.server.keepalive_secs == 0 {
        result.push(
            Severity::Error,
            "range",
            "server.keepalive_secs",
            "must be greater than zero",
        );
    }
    if config.files.max_bytes == 0 {
        result.push(
            Severity::Error,
            "range",
            "files.max_bytes",
            "must be greater than zero",
        );
    }

    if config.server.auth_token.is_none() && config.server.bind != "127.0.0.1" {
        result.push(
            Severity::Warning,
            "security",
            "server.auth_token",
            format!(
                "listening on {} without a bearer token; any client can drive the bot",
                config.server.bind
            ),
        );
    }
    if config.telegram.allowed_chat_ids.is_empty() {
        result.push(
            Severity::Info,
            "security",
            "telegram.allowed_chat_ids",
            "empty allowlist: every chat the bot can reach is addressable",
        );
    }

    result
}
