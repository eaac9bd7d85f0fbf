/// Config schema types (server, protocol, telegram, files).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegateConfig {
    pub server: ServerConfig,
    pub protocol: ProtocolConfig,
    pub telegram: TelegramConfig,
    pub files: FilesConfig,
}

/// HTTP listener and push-channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    pub port: u16,
    /// When set, every channel-open and follow-up request must carry
    /// `Authorization: Bearer <token>`.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_token: Option<Secret<String>>,
    /// Path clients open the SSE stream on.
    pub sse_path: String,
    /// Path advertised in the `endpoint` event for follow-up POSTs.
    pub message_path: String,
    /// Interval between keepalive comments on open streams.
    pub keepalive_secs: u64,
    /// Maximum accepted request body size for follow-up submissions.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
            auth_token: None,
            sse_path: "/sse".into(),
            message_path: "/messages".into(),
            keepalive_secs: 25,
            max_body_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Accept the flat `{tool, arguments}` envelope alongside JSON-RPC.
    pub legacy_dialect: bool,
    /// Name reported in the `initialize` response.
    pub server_name: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            legacy_dialect: true,
            server_name: "telegate".into(),
        }
    }
}

/// Bot API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub bot_token: Secret<String>,
    /// Base URL of the Bot API; overridden in tests and for self-hosted
    /// Bot API servers.
    pub api_base: String,
    pub request_timeout_secs: u64,
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubled for each further attempt.
    pub retry_base_delay_ms: u64,
    /// Chat ids the bridge may address. Empty means unrestricted.
    pub allowed_chat_ids: Vec<String>,
    pub rate_limit: RateLimitConfig,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: Secret::new(String::new()),
            api_base: "https://api.telegram.org".into(),
            request_timeout_secs: 30,
            max_attempts: 3,
            retry_base_delay_ms: 500,
            allowed_chat_ids: Vec::new(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl TelegramConfig {
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.bot_token.expose_secret().trim().is_empty()
    }
}

/// Token bucket settings for outbound Bot API calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub capacity: usize,
    pub refill_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // Telegram's documented global ceiling is roughly 30 messages/second.
        Self {
            capacity: 30,
            refill_ms: 1000,
        }
    }
}

/// Limits for files uploaded on behalf of callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub max_bytes: usize,
    pub download_timeout_secs: u64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
            download_timeout_secs: 30,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
