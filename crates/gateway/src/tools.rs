//! The Telegram tool set exposed over `tools/list` and `tools/call`.
//!
//! Every tool takes a JSON arguments object, validates it, and calls the
//! matching [`TelegramClient`] operation. Destinations accept a numeric chat
//! id or an `@username`; the client applies the allowlist after resolution.

use std::sync::Arc;

use {
    async_trait::async_trait,
    serde::Serialize,
    serde_json::{Value, json},
    telegate_common::{BridgeError, BridgeResult, ErrorKind},
    telegate_mcp::{McpTool, ToolDispatcher},
    telegate_telegram::{
        ChatTarget, FileResolver, ParseMode, SendOptions, TelegramClient, sanitize_filename,
    },
    tracing::debug,
};

/// Provider handles shared by every Telegram tool.
pub struct TelegramTools {
    client: TelegramClient,
    resolver: FileResolver,
    max_file_bytes: usize,
}

impl TelegramTools {
    pub fn new(client: TelegramClient, resolver: FileResolver, max_file_bytes: usize) -> Self {
        Self {
            client,
            resolver,
            max_file_bytes,
        }
    }
}

/// Register all ten Telegram operations on `dispatcher`.
pub fn register_telegram_tools(dispatcher: &mut ToolDispatcher, tools: TelegramTools) {
    let shared = Arc::new(tools);
    for op in Operation::ALL {
        dispatcher.register(Arc::new(TelegramTool {
            op,
            tools: Arc::clone(&shared),
        }));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    GetMe,
    GetChat,
    SendMessage,
    EditMessageText,
    DeleteMessage,
    ForwardMessage,
    SendChatAction,
    PinChatMessage,
    SendPhoto,
    SendDocument,
}

impl Operation {
    const ALL: [Self; 10] = [
        Self::GetMe,
        Self::GetChat,
        Self::SendMessage,
        Self::EditMessageText,
        Self::DeleteMessage,
        Self::ForwardMessage,
        Self::SendChatAction,
        Self::PinChatMessage,
        Self::SendPhoto,
        Self::SendDocument,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::GetMe => "get_me",
            Self::GetChat => "get_chat",
            Self::SendMessage => "send_message",
            Self::EditMessageText => "edit_message_text",
            Self::DeleteMessage => "delete_message",
            Self::ForwardMessage => "forward_message",
            Self::SendChatAction => "send_chat_action",
            Self::PinChatMessage => "pin_chat_message",
            Self::SendPhoto => "send_photo",
            Self::SendDocument => "send_document",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::GetMe => "Return the bot's own Telegram account.",
            Self::GetChat => "Look up a chat by numeric id or @username.",
            Self::SendMessage => "Send a text message to a chat.",
            Self::EditMessageText => "Replace the text of a message the bot sent earlier.",
            Self::DeleteMessage => "Delete a message from a chat.",
            Self::ForwardMessage => "Forward an existing message into another chat.",
            Self::SendChatAction => {
                "Show a transient status such as 'typing' in a chat for a few seconds."
            },
            Self::PinChatMessage => "Pin a message in a chat.",
            Self::SendPhoto => {
                "Send a photo given as an http(s) URL or a base64 data URL, with an optional caption."
            },
            Self::SendDocument => {
                "Send a file given as an http(s) URL or a base64 data URL, with an optional caption."
            },
        }
    }

    fn input_schema(self) -> Value {
        let chat = chat_schema("Destination chat: numeric id or @username.");
        let message_id = json!({"type": "integer", "description": "Id of the message in the chat."});
        let silent = json!({"type": "boolean", "description": "Deliver without a notification sound."});
        let parse_mode = json!({
            "type": "string",
            "enum": ["MarkdownV2", "HTML", "plain"],
            "description": "Formatting applied to the text; content is sanitized for the chosen mode.",
        });
        let reply_to = json!({"type": "integer", "description": "Message id to reply to."});
        let caption = json!({"type": "string", "description": "Optional caption."});

        match self {
            Self::GetMe => object_schema(json!({}), &[]),
            Self::GetChat => object_schema(json!({"chat_id": chat}), &["chat_id"]),
            Self::SendMessage => object_schema(
                json!({
                    "chat_id": chat,
                    "text": {"type": "string", "description": "Message text."},
                    "parse_mode": parse_mode,
                    "disable_notification": silent,
                    "reply_to_message_id": reply_to,
                }),
                &["chat_id", "text"],
            ),
            Self::EditMessageText => object_schema(
                json!({
                    "chat_id": chat,
                    "message_id": message_id,
                    "text": {"type": "string", "description": "New message text."},
                    "parse_mode": parse_mode,
                }),
                &["chat_id", "message_id", "text"],
            ),
            Self::DeleteMessage => object_schema(
                json!({"chat_id": chat, "message_id": message_id}),
                &["chat_id", "message_id"],
            ),
            Self::ForwardMessage => object_schema(
                json!({
                    "chat_id": chat,
                    "from_chat_id": chat_schema("Chat the message currently lives in."),
                    "message_id": message_id,
                    "disable_notification": silent,
                }),
                &["chat_id", "from_chat_id", "message_id"],
            ),
            Self::SendChatAction => object_schema(
                json!({
                    "chat_id": chat,
                    "action": {
                        "type": "string",
                        "description": "Action to display, e.g. typing or upload_photo. Defaults to typing.",
                    },
                }),
                &["chat_id"],
            ),
            Self::PinChatMessage => object_schema(
                json!({"chat_id": chat, "message_id": message_id, "disable_notification": silent}),
                &["chat_id", "message_id"],
            ),
            Self::SendPhoto => object_schema(
                json!({
                    "chat_id": chat,
                    "photo": {"type": "string", "description": "http(s) URL or data:<type>;base64,<data>."},
                    "filename": {"type": "string"},
                    "caption": caption,
                    "parse_mode": parse_mode,
                    "disable_notification": silent,
                    "reply_to_message_id": reply_to,
                }),
                &["chat_id", "photo"],
            ),
            Self::SendDocument => object_schema(
                json!({
                    "chat_id": chat,
                    "document": {"type": "string", "description": "http(s) URL or data:<type>;base64,<data>."},
                    "filename": {"type": "string"},
                    "caption": caption,
                    "parse_mode": parse_mode,
                    "disable_notification": silent,
                    "reply_to_message_id": reply_to,
                }),
                &["chat_id", "document"],
            ),
        }
    }
}

struct TelegramTool {
    op: Operation,
    tools: Arc<TelegramTools>,
}

#[async_trait]
impl McpTool for TelegramTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn input_schema(&self) -> Value {
        self.op.input_schema()
    }

    async fn call(&self, arguments: Value) -> BridgeResult<Value> {
        debug!(tool = self.op.name(), "telegram tool invoked");
        let client = &self.tools.client;
        let args = &arguments;

        match self.op {
            Operation::GetMe => to_json(&client.get_me().await?),
            Operation::GetChat => to_json(&client.get_chat(&chat_arg(args, "chat_id")?).await?),
            Operation::SendMessage => {
                let target = chat_arg(args, "chat_id")?;
                let text = text_arg(args, "text")?;
                let message = client
                    .send_message(&target, text, &send_options(args)?)
                    .await?;
                to_json(&message)
            },
            Operation::EditMessageText => {
                let target = chat_arg(args, "chat_id")?;
                let message_id = int_arg(args, "message_id")?;
                let text = text_arg(args, "text")?;
                let parse_mode = ParseMode::from_arg(str_arg(args, "parse_mode")?)?;
                let message = client
                    .edit_message_text(&target, message_id, text, parse_mode)
                    .await?;
                to_json(&message)
            },
            Operation::DeleteMessage => {
                let deleted = client
                    .delete_message(&chat_arg(args, "chat_id")?, int_arg(args, "message_id")?)
                    .await?;
                Ok(json!({"deleted": deleted}))
            },
            Operation::ForwardMessage => {
                let message = client
                    .forward_message(
                        &chat_arg(args, "chat_id")?,
                        &chat_arg(args, "from_chat_id")?,
                        int_arg(args, "message_id")?,
                        bool_arg(args, "disable_notification")?,
                    )
                    .await?;
                to_json(&message)
            },
            Operation::SendChatAction => {
                let action = str_arg(args, "action")?.unwrap_or("typing");
                let ok = client
                    .send_chat_action(&chat_arg(args, "chat_id")?, action)
                    .await?;
                Ok(json!({"ok": ok}))
            },
            Operation::PinChatMessage => {
                let pinned = client
                    .pin_chat_message(
                        &chat_arg(args, "chat_id")?,
                        int_arg(args, "message_id")?,
                        bool_arg(args, "disable_notification")?,
                    )
                    .await?;
                Ok(json!({"pinned": pinned}))
            },
            Operation::SendPhoto => self.send_file(args, "photo", "photo.jpg").await,
            Operation::SendDocument => self.send_file(args, "document", "document").await,
        }
    }
}

impl TelegramTool {
    /// Resolve the destination before fetching the file, so a rejected chat
    /// never triggers a download.
    async fn send_file(&self, args: &Value, field: &str, default_name: &str) -> BridgeResult<Value> {
        let client = &self.tools.client;
        let chat_id = client.resolve_chat(&chat_arg(args, "chat_id")?).await?;
        let reference = text_arg(args, field)?;
        let options = send_options(args)?;
        let caption = str_arg(args, "caption")?;

        let mut file = self
            .tools
            .resolver
            .resolve(reference, default_name, self.tools.max_file_bytes)
            .await?;
        if let Some(name) = str_arg(args, "filename")? {
            file.filename = sanitize_filename(name);
        }

        let target = ChatTarget::Id(chat_id);
        let message = match self.op {
            Operation::SendPhoto => client.send_photo(&target, &file, caption, &options).await?,
            _ => client.send_document(&target, &file, caption, &options).await?,
        };
        to_json(&message)
    }
}

// ── Argument helpers ────────────────────────────────────────────────────────

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn chat_schema(description: &str) -> Value {
    json!({"type": ["integer", "string"], "description": description})
}

fn present<'a>(args: &'a Value, key: &str) -> Option<&'a Value> {
    args.get(key).filter(|value| !value.is_null())
}

fn missing(key: &str) -> BridgeError {
    BridgeError::bad_request(format!("missing required argument '{key}'"))
}

fn chat_arg(args: &Value, key: &str) -> BridgeResult<ChatTarget> {
    let value = present(args, key).ok_or_else(|| missing(key))?;
    ChatTarget::from_value(value).map_err(|e| BridgeError::bad_request(format!("{key}: {}", e.message)))
}

fn str_arg<'a>(args: &'a Value, key: &str) -> BridgeResult<Option<&'a str>> {
    match present(args, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(BridgeError::bad_request(format!("'{key}' must be a string"))),
    }
}

/// A required string that is not blank.
fn text_arg<'a>(args: &'a Value, key: &str) -> BridgeResult<&'a str> {
    match str_arg(args, key)? {
        Some(s) if !s.trim().is_empty() => Ok(s),
        Some(_) => Err(BridgeError::bad_request(format!("'{key}' must not be empty"))),
        None => Err(missing(key)),
    }
}

fn int_arg(args: &Value, key: &str) -> BridgeResult<i64> {
    match present(args, key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| BridgeError::bad_request(format!("'{key}' must be an integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| BridgeError::bad_request(format!("'{key}' must be an integer"))),
        Some(_) => Err(BridgeError::bad_request(format!("'{key}' must be an integer"))),
        None => Err(missing(key)),
    }
}

fn optional_int_arg(args: &Value, key: &str) -> BridgeResult<Option<i64>> {
    match present(args, key) {
        None => Ok(None),
        Some(_) => int_arg(args, key).map(Some),
    }
}

fn bool_arg(args: &Value, key: &str) -> BridgeResult<bool> {
    match present(args, key) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(BridgeError::bad_request(format!("'{key}' must be a boolean"))),
    }
}

fn send_options(args: &Value) -> BridgeResult<SendOptions> {
    Ok(SendOptions {
        parse_mode: ParseMode::from_arg(str_arg(args, "parse_mode")?)?,
        disable_notification: bool_arg(args, "disable_notification")?,
        reply_to_message_id: optional_int_arg(args, "reply_to_message_id")?,
    })
}

fn to_json<T: Serialize>(value: &T) -> BridgeResult<Value> {
    serde_json::to_value(value).map_err(|e| {
        BridgeError::new(
            ErrorKind::DeliveryFailed,
            format!("failed to encode provider result: {e}"),
        )
    })
}
