//! Bot API wire types used by the client.
//!
//! Only the fields the bridge reads are modelled; everything else in a
//! result object is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<u16>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub date: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Values accepted by `sendChatAction`.
pub const CHAT_ACTIONS: &[&str] = &[
    "typing",
    "upload_photo",
    "record_video",
    "upload_video",
    "record_voice",
    "upload_voice",
    "upload_document",
    "choose_sticker",
    "find_location",
    "record_video_note",
    "upload_video_note",
];

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_envelope() {
        let resp: ApiResponse<User> = serde_json::from_str(
            r#"{"ok":true,"result":{"id":1,"is_bot":true,"first_name":"Bridge","username":"bridge_bot","can_join_groups":true}}"#,
        )
        .unwrap();
        assert!(resp.ok);
        assert_eq!(resp.result.unwrap().username.as_deref(), Some("bridge_bot"));
    }

    #[test]
    fn parses_failure_envelope() {
        let resp: ApiResponse<User> = serde_json::from_str(
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 3","parameters":{"retry_after":3}}"#,
        )
        .unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_none());
        assert_eq!(resp.error_code, Some(429));
        assert_eq!(resp.parameters.unwrap().retry_after, Some(3));
    }

    #[test]
    fn message_keeps_chat_type() {
        let msg: Message = serde_json::from_str(
            r#"{"message_id":10,"date":1700000000,"chat":{"id":-100,"type":"supergroup","title":"Ops"},"text":"hi"}"#,
        )
        .unwrap();
        assert_eq!(msg.chat.kind, "supergroup");
        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["chat"]["type"], "supergroup");
    }
}
