//! Bot API client: rate limiting, bounded retry and classification.

use std::{sync::Arc, time::Duration};

use {
    reqwest::multipart::{Form, Part},
    secrecy::ExposeSecret,
    serde::de::DeserializeOwned,
    serde_json::{Map, Value, json},
    telegate_common::{BridgeError, BridgeResult},
    telegate_config::TelegramConfig,
    tracing::{debug, warn},
};

use crate::{
    access::{ChatAccessPolicy, ChatTarget},
    error::{Context, ProviderFailure, Result, classify},
    rate_limit::RateLimiter,
    resolver::ResolvedFile,
    sanitize::{ParseMode, sanitize_text},
    types::{ApiResponse, CHAT_ACTIONS, Chat, Message, User},
};

/// Attempt ceiling and backoff base for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): `base * 2^(attempt-1)`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

struct ClientInner {
    http: reqwest::Client,
    /// `<api_base>/bot<token>`; never logged.
    base_url: String,
    limiter: RateLimiter,
    retry: RetryPolicy,
    access: ChatAccessPolicy,
}

#[derive(Clone)]
pub struct TelegramClient {
    inner: Arc<ClientInner>,
}

impl TelegramClient {
    /// Build a client from config. Must be called inside a tokio runtime,
    /// since the limiter starts its refill task immediately.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let access = ChatAccessPolicy::from_config(&config.allowed_chat_ids)
            .context("invalid telegram.allowed_chat_ids")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("telegate/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build Bot API HTTP client")?;
        let limiter = RateLimiter::new(
            config.rate_limit.capacity,
            Duration::from_millis(config.rate_limit.refill_ms),
        );
        let retry = RetryPolicy {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        };
        Ok(Self::new(
            http,
            &config.api_base,
            config.bot_token.expose_secret(),
            limiter,
            retry,
            access,
        ))
    }

    pub fn new(
        http: reqwest::Client,
        api_base: &str,
        token: &str,
        limiter: RateLimiter,
        retry: RetryPolicy,
        access: ChatAccessPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: format!("{}/bot{token}", api_base.trim_end_matches('/')),
                limiter,
                retry,
                access,
            }),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.inner.base_url)
    }

    /// Call a Bot API method with a JSON payload.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> BridgeResult<T> {
        let url = self.method_url(method);
        self.execute(method, || self.inner.http.post(&url).json(payload))
            .await
    }

    /// Call a Bot API method with a multipart body. `build_form` runs once per
    /// attempt since a sent form cannot be reused.
    pub async fn call_multipart<T, F>(&self, method: &str, build_form: F) -> BridgeResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> Form,
    {
        let url = self.method_url(method);
        self.execute(method, || self.inner.http.post(&url).multipart(build_form()))
            .await
    }

    async fn execute<T, F>(&self, method: &str, build_request: F) -> BridgeResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_attempts = self.inner.retry.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.inner.limiter.acquire().await;

            let failure = match send_once::<T>(build_request()).await {
                Ok(result) => {
                    debug!(method, attempt, "Bot API call succeeded");
                    return Ok(result);
                },
                Err(failure) => failure,
            };

            if !failure.is_retryable() {
                debug!(method, attempt, status = ?failure.status, error = %failure.description, "Bot API call rejected");
                return Err(classify(&failure));
            }
            if attempt >= max_attempts {
                warn!(
                    method,
                    attempt,
                    max_attempts,
                    status = ?failure.status,
                    error = %failure.description,
                    "Bot API call still failing after retries"
                );
                return Err(classify(&failure));
            }

            let delay = self.inner.retry.delay_after(attempt);
            warn!(
                method,
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                status = ?failure.status,
                error = %failure.description,
                "transient Bot API failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    // ── Destinations ────────────────────────────────────────────────────────

    /// Resolve a target to its numeric chat id and apply the access policy.
    ///
    /// Aliases are looked up through `getChat` first; the policy only ever
    /// sees the resolved id.
    pub async fn resolve_chat(&self, target: &ChatTarget) -> BridgeResult<i64> {
        let chat_id = match target {
            ChatTarget::Id(id) => *id,
            ChatTarget::Alias(alias) => {
                let chat: Chat = self.call("getChat", &json!({"chat_id": alias})).await?;
                debug!(alias = %alias, chat_id = chat.id, "resolved chat alias");
                chat.id
            },
        };
        self.inner.access.check(chat_id)?;
        Ok(chat_id)
    }

    // ── Operations ──────────────────────────────────────────────────────────

    pub async fn get_me(&self) -> BridgeResult<User> {
        self.call("getMe", &json!({})).await
    }

    /// Fetches chat details. An alias is looked up once and the allowlist is
    /// checked against the id it resolves to; a numeric id is checked first.
    pub async fn get_chat(&self, target: &ChatTarget) -> BridgeResult<Chat> {
        match target {
            ChatTarget::Id(id) => {
                self.inner.access.check(*id)?;
                self.call("getChat", &json!({"chat_id": id})).await
            },
            ChatTarget::Alias(alias) => {
                let chat: Chat = self.call("getChat", &json!({"chat_id": alias})).await?;
                self.inner.access.check(chat.id)?;
                Ok(chat)
            },
        }
    }

    pub async fn send_message(&self, target: &ChatTarget, text: &str, options: &SendOptions) -> BridgeResult<Message> {
        let chat_id = self.resolve_chat(target).await?;
        let mut payload = Map::new();
        payload.insert("chat_id".into(), json!(chat_id));
        payload.insert("text".into(), json!(sanitize_text(text, options.parse_mode)));
        options.apply(&mut payload);
        self.call("sendMessage", &Value::Object(payload)).await
    }

    pub async fn edit_message_text(
        &self,
        target: &ChatTarget,
        message_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> BridgeResult<Message> {
        let chat_id = self.resolve_chat(target).await?;
        let mut payload = Map::new();
        payload.insert("chat_id".into(), json!(chat_id));
        payload.insert("message_id".into(), json!(message_id));
        payload.insert("text".into(), json!(sanitize_text(text, parse_mode)));
        if let Some(mode) = parse_mode {
            payload.insert("parse_mode".into(), json!(mode.as_str()));
        }
        self.call("editMessageText", &Value::Object(payload)).await
    }

    pub async fn delete_message(&self, target: &ChatTarget, message_id: i64) -> BridgeResult<bool> {
        let chat_id = self.resolve_chat(target).await?;
        self.call(
            "deleteMessage",
            &json!({"chat_id": chat_id, "message_id": message_id}),
        )
        .await
    }

    /// Forward a message. Only the destination is subject to the allowlist.
    pub async fn forward_message(
        &self,
        target: &ChatTarget,
        from: &ChatTarget,
        message_id: i64,
        disable_notification: bool,
    ) -> BridgeResult<Message> {
        let chat_id = self.resolve_chat(target).await?;
        let from_chat_id = match from {
            ChatTarget::Id(id) => json!(id),
            ChatTarget::Alias(alias) => json!(alias),
        };
        self.call(
            "forwardMessage",
            &json!({
                "chat_id": chat_id,
                "from_chat_id": from_chat_id,
                "message_id": message_id,
                "disable_notification": disable_notification,
            }),
        )
        .await
    }

    pub async fn send_chat_action(&self, target: &ChatTarget, action: &str) -> BridgeResult<bool> {
        if !CHAT_ACTIONS.contains(&action) {
            return Err(BridgeError::bad_request(format!(
                "unknown chat action '{action}' (expected one of: {})",
                CHAT_ACTIONS.join(", ")
            )));
        }
        let chat_id = self.resolve_chat(target).await?;
        self.call(
            "sendChatAction",
            &json!({"chat_id": chat_id, "action": action}),
        )
        .await
    }

    pub async fn pin_chat_message(
        &self,
        target: &ChatTarget,
        message_id: i64,
        disable_notification: bool,
    ) -> BridgeResult<bool> {
        let chat_id = self.resolve_chat(target).await?;
        self.call(
            "pinChatMessage",
            &json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "disable_notification": disable_notification,
            }),
        )
        .await
    }

    pub async fn send_photo(
        &self,
        target: &ChatTarget,
        file: &ResolvedFile,
        caption: Option<&str>,
        options: &SendOptions,
    ) -> BridgeResult<Message> {
        self.send_file("sendPhoto", "photo", target, file, caption, options)
            .await
    }

    pub async fn send_document(
        &self,
        target: &ChatTarget,
        file: &ResolvedFile,
        caption: Option<&str>,
        options: &SendOptions,
    ) -> BridgeResult<Message> {
        self.send_file("sendDocument", "document", target, file, caption, options)
            .await
    }

    async fn send_file(
        &self,
        method: &str,
        field: &'static str,
        target: &ChatTarget,
        file: &ResolvedFile,
        caption: Option<&str>,
        options: &SendOptions,
    ) -> BridgeResult<Message> {
        let chat_id = self.resolve_chat(target).await?;
        let caption = caption.map(|c| sanitize_text(c, options.parse_mode));
        let mut fields = Map::new();
        options.apply(&mut fields);

        self.call_multipart(method, || {
            let mut form = Form::new()
                .text("chat_id", chat_id.to_string())
                .part(field, file_part(file));
            if let Some(caption) = &caption {
                form = form.text("caption", caption.clone());
            }
            for (key, value) in &fields {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                form = form.text(key.clone(), text);
            }
            form
        })
        .await
    }
}

/// Optional fields shared by the send operations.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub parse_mode: Option<ParseMode>,
    pub disable_notification: bool,
    pub reply_to_message_id: Option<i64>,
}

impl SendOptions {
    fn apply(&self, payload: &mut Map<String, Value>) {
        if let Some(mode) = self.parse_mode {
            payload.insert("parse_mode".into(), json!(mode.as_str()));
        }
        if self.disable_notification {
            payload.insert("disable_notification".into(), json!(true));
        }
        if let Some(reply_to) = self.reply_to_message_id {
            payload.insert(
                "reply_parameters".into(),
                json!({"message_id": reply_to, "allow_sending_without_reply": true}),
            );
        }
    }
}

fn file_part(file: &ResolvedFile) -> Part {
    let part = || Part::bytes(file.bytes.to_vec()).file_name(file.filename.clone());
    match &file.content_type {
        Some(content_type) => part().mime_str(content_type).unwrap_or_else(|_| part()),
        None => part(),
    }
}

/// Issue one request and read the Bot API envelope.
async fn send_once<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> std::result::Result<T, ProviderFailure> {
    let response = request.send().await.map_err(ProviderFailure::transport)?;
    let http_status = response.status().as_u16();
    let body = response.bytes().await.map_err(ProviderFailure::transport)?;

    let envelope: ApiResponse<T> = serde_json::from_slice(&body).map_err(|e| {
        ProviderFailure::rejected(http_status, format!("unreadable Bot API response: {e}"))
    })?;

    let status = envelope.error_code.unwrap_or(http_status);
    if envelope.ok {
        return envelope.result.ok_or_else(|| {
            ProviderFailure::rejected(status, "Bot API reported success without a result")
        });
    }

    Err(ProviderFailure {
        status: Some(status),
        description: envelope
            .description
            .unwrap_or_else(|| "Bot API reported failure without a description".into()),
        retry_after: envelope.parameters.and_then(|p| p.retry_after),
        transport: None,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{Json, Router, extract::State, http::StatusCode, routing::post},
        std::sync::Mutex,
        telegate_common::ErrorKind,
        tokio::time::Instant,
    };

    const TOKEN: &str = "123:abc";

    fn client_for(base: &str, retry: RetryPolicy, access: ChatAccessPolicy) -> TelegramClient {
        TelegramClient::new(
            reqwest::Client::new(),
            base,
            TOKEN,
            RateLimiter::new(100, Duration::from_secs(1)),
            retry,
            access,
        )
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn from_config_rejects_alias_only_allowlist() {
        let config = TelegramConfig {
            allowed_chat_ids: vec!["@ops".into()],
            ..TelegramConfig::default()
        };
        let err = TelegramClient::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("allowed_chat_ids"), "{err}");
    }

    #[tokio::test]
    async fn from_config_applies_numeric_allowlist() {
        let config = TelegramConfig {
            allowed_chat_ids: vec!["42".into()],
            ..TelegramConfig::default()
        };
        let client = TelegramClient::from_config(&config).unwrap();
        let err = client.resolve_chat(&ChatTarget::Id(999)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DestinationNotAllowed);
        assert_eq!(client.resolve_chat(&ChatTarget::Id(42)).await.unwrap(), 42);
    }

    #[derive(Clone, Default)]
    struct MockState {
        hits: Arc<Mutex<Vec<Instant>>>,
        /// Responses to serve in order; the last one repeats.
        script: Arc<Vec<(StatusCode, Value)>>,
    }

    async fn scripted(State(state): State<MockState>) -> (StatusCode, Json<Value>) {
        let n = {
            let mut hits = state.hits.lock().unwrap();
            hits.push(Instant::now());
            hits.len()
        };
        let (status, body) = state.script[(n - 1).min(state.script.len() - 1)].clone();
        (status, Json(body))
    }

    async fn start_mock(script: Vec<(StatusCode, Value)>) -> (String, MockState) {
        let state = MockState {
            hits: Arc::default(),
            script: Arc::new(script),
        };
        let app = Router::new()
            .route("/bot123:abc/{method}", post(scripted))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    fn server_error() -> (StatusCode, Value) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"ok": false, "error_code": 500, "description": "Internal Server Error"}),
        )
    }

    fn me() -> (StatusCode, Value) {
        (
            StatusCode::OK,
            json!({"ok": true, "result": {"id": 1, "is_bot": true, "first_name": "Bridge"}}),
        )
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn retries_server_errors_with_growing_delays() {
        let (base, state) = start_mock(vec![server_error(), server_error(), me()]).await;
        let client = client_for(&base, fast_retry(), ChatAccessPolicy::default());

        let user = client.get_me().await.unwrap();
        assert_eq!(user.first_name, "Bridge");

        let hits = state.hits.lock().unwrap().clone();
        assert_eq!(hits.len(), 3);
        let first_gap = hits[1] - hits[0];
        let second_gap = hits[2] - hits[1];
        assert!(first_gap >= Duration::from_millis(50), "{first_gap:?}");
        assert!(second_gap >= Duration::from_millis(100), "{second_gap:?}");
        assert!(second_gap > first_gap);
    }

    #[tokio::test]
    async fn bad_request_is_not_retried() {
        let (base, state) = start_mock(vec![(
            StatusCode::BAD_REQUEST,
            json!({"ok": false, "error_code": 400, "description": "Bad Request: message text is empty"}),
        )])
        .await;
        let client = client_for(&base, fast_retry(), ChatAccessPolicy::default());

        let err = client
            .send_message(&ChatTarget::Id(5), "", &SendOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);
        assert_eq!(state.hits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_are_provider_internal_error() {
        let (base, state) = start_mock(vec![server_error()]).await;
        let client = client_for(&base, fast_retry(), ChatAccessPolicy::default());

        let err = client.get_me().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderInternalError);
        assert_eq!(state.hits.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn ok_false_on_http_200_is_a_rejection() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .with_status(200)
            .with_body(r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#)
            .expect(1)
            .create_async()
            .await;
        let client = client_for(&server.url(), fast_retry(), ChatAccessPolicy::default());

        let err = client
            .send_message(&ChatTarget::Id(5), "hi", &SendOptions::default())
            .await
            .unwrap_err();
        mock.assert_async().await;
        assert_eq!(err.kind, ErrorKind::DestinationNotFound);
        assert!(err.details.unwrap()["hint"].as_str().unwrap().contains("blocked"));
    }

    #[tokio::test]
    async fn rate_limited_is_terminal_with_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/getMe")
            .with_status(429)
            .with_body(r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#)
            .expect(1)
            .create_async()
            .await;
        let client = client_for(&server.url(), fast_retry(), ChatAccessPolicy::default());

        let err = client.get_me().await.unwrap_err();
        mock.assert_async().await;
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.details.unwrap()["retry_after"], 7);
    }

    #[tokio::test]
    async fn connection_refused_is_retried_then_delivery_failed() {
        let client = client_for("http://127.0.0.1:9", RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
        }, ChatAccessPolicy::default());
        let err = client.get_me().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeliveryFailed);
        assert!(!err.message.contains(TOKEN));
    }

    #[tokio::test]
    async fn send_message_payload_is_sanitized() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .match_body(mockito::Matcher::Json(json!({
                "chat_id": 42,
                "text": "<b>hi</b> there",
                "parse_mode": "HTML",
                "disable_notification": true
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"message_id":9,"date":0,"chat":{"id":42,"type":"private"},"text":"hi there"}}"#)
            .create_async()
            .await;
        let client = client_for(&server.url(), fast_retry(), ChatAccessPolicy::default());

        let msg = client
            .send_message(
                &ChatTarget::Id(42),
                "<b>hi</b> <script>there</script>\u{7}",
                &SendOptions {
                    parse_mode: Some(ParseMode::Html),
                    disable_notification: true,
                    reply_to_message_id: None,
                },
            )
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(msg.message_id, 9);
    }

    #[tokio::test]
    async fn alias_is_resolved_before_the_allowlist_check() {
        let mut server = mockito::Server::new_async().await;
        let lookup = server
            .mock("POST", "/bot123:abc/getChat")
            .match_body(mockito::Matcher::PartialJson(json!({"chat_id": "@ops"})))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"id":42,"type":"channel","title":"Ops"}}"#)
            .expect(1)
            .create_async()
            .await;
        let client = client_for(&server.url(), fast_retry(), ChatAccessPolicy::new([42]));

        let id = client
            .resolve_chat(&ChatTarget::Alias("@ops".into()))
            .await
            .unwrap();
        lookup.assert_async().await;
        assert_eq!(id, 42);
    }

    #[tokio::test]
    async fn alias_resolving_outside_the_allowlist_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let lookup = server
            .mock("POST", "/bot123:abc/getChat")
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"id":99,"type":"private"}}"#)
            .expect(1)
            .create_async()
            .await;
        let send = server
            .mock("POST", "/bot123:abc/sendMessage")
            .expect(0)
            .create_async()
            .await;
        let client = client_for(&server.url(), fast_retry(), ChatAccessPolicy::new([42]));

        let err = client
            .send_message(
                &ChatTarget::Alias("@someone".into()),
                "hi",
                &SendOptions::default(),
            )
            .await
            .unwrap_err();
        lookup.assert_async().await;
        send.assert_async().await;
        assert_eq!(err.kind, ErrorKind::DestinationNotAllowed);
        assert_eq!(err.details.unwrap()["chat_id"], 99);
    }

    #[tokio::test]
    async fn get_chat_by_alias_looks_up_once() {
        let mut server = mockito::Server::new_async().await;
        let lookup = server
            .mock("POST", "/bot123:abc/getChat")
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"id":42,"type":"channel","title":"Ops"}}"#)
            .expect(1)
            .create_async()
            .await;
        let client = client_for(&server.url(), fast_retry(), ChatAccessPolicy::new([42]));

        let chat = client
            .get_chat(&ChatTarget::Alias("@ops".into()))
            .await
            .unwrap();
        lookup.assert_async().await;
        assert_eq!(chat.id, 42);
        assert_eq!(chat.title.as_deref(), Some("Ops"));
    }

    #[tokio::test]
    async fn get_chat_by_alias_outside_allowlist_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let lookup = server
            .mock("POST", "/bot123:abc/getChat")
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"id":99,"type":"private"}}"#)
            .expect(1)
            .create_async()
            .await;
        let client = client_for(&server.url(), fast_retry(), ChatAccessPolicy::new([42]));

        let err = client
            .get_chat(&ChatTarget::Alias("@someone".into()))
            .await
            .unwrap_err();
        lookup.assert_async().await;
        assert_eq!(err.kind, ErrorKind::DestinationNotAllowed);
    }

    #[tokio::test]
    async fn get_chat_by_id_is_a_single_request() {
        let mut server = mockito::Server::new_async().await;
        let lookup = server
            .mock("POST", "/bot123:abc/getChat")
            .match_body(mockito::Matcher::PartialJson(json!({"chat_id": 42})))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"id":42,"type":"group","title":"Team"}}"#)
            .expect(1)
            .create_async()
            .await;
        let client = client_for(&server.url(), fast_retry(), ChatAccessPolicy::new([42]));

        let chat = client.get_chat(&ChatTarget::Id(42)).await.unwrap();
        lookup.assert_async().await;
        assert_eq!(chat.id, 42);
    }

    #[tokio::test]
    async fn numeric_id_outside_allowlist_never_reaches_the_api() {
        let mut server = mockito::Server::new_async().await;
        let any = server
            .mock("POST", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let client = client_for(&server.url(), fast_retry(), ChatAccessPolicy::new([42]));

        let err = client
            .delete_message(&ChatTarget::Id(7), 1)
            .await
            .unwrap_err();
        any.assert_async().await;
        assert_eq!(err.kind, ErrorKind::DestinationNotAllowed);
    }

    #[tokio::test]
    async fn unknown_chat_action_is_rejected_locally() {
        let client = client_for("http://127.0.0.1:9", fast_retry(), ChatAccessPolicy::default());
        let err = client
            .send_chat_action(&ChatTarget::Id(1), "dancing")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn send_document_uploads_multipart() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendDocument")
            .match_header(
                "content-type",
                mockito::Matcher::Regex("multipart/form-data".into()),
            )
            .match_body(mockito::Matcher::Regex("filename=\"report.pdf\"".into()))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"message_id":3,"date":0,"chat":{"id":5,"type":"private"}}}"#)
            .create_async()
            .await;
        let client = client_for(&server.url(), fast_retry(), ChatAccessPolicy::default());

        let file = ResolvedFile {
            bytes: bytes::Bytes::from_static(b"%PDF-1.4"),
            filename: "report.pdf".into(),
            content_type: Some("application/pdf".into()),
        };
        let msg = client
            .send_document(&ChatTarget::Id(5), &file, Some("Q3"), &SendOptions::default())
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(msg.message_id, 3);
    }
}
