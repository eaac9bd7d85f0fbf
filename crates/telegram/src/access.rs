//! Destination addressing and the chat allowlist.

use std::{collections::HashSet, fmt};

use {
    serde_json::Value,
    telegate_common::{BridgeError, BridgeResult, ErrorKind},
};

/// A caller-supplied destination: a numeric chat id or an `@username` alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    Id(i64),
    /// Includes the leading `@`.
    Alias(String),
}

impl ChatTarget {
    pub fn parse(raw: &str) -> BridgeResult<Self> {
        let raw = raw.trim();
        if let Some(name) = raw.strip_prefix('@') {
            if !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Ok(Self::Alias(raw.to_string()));
            }
            return Err(BridgeError::bad_request(format!(
                "'{raw}' is not a valid @username"
            )));
        }
        raw.parse::<i64>().map(Self::Id).map_err(|_| {
            BridgeError::bad_request(format!(
                "'{raw}' is not a numeric chat id or an @username"
            ))
        })
    }

    /// Accept either a JSON number or a string.
    pub fn from_value(value: &Value) -> BridgeResult<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Id).ok_or_else(|| {
                BridgeError::bad_request(format!("chat id {n} is not an integer"))
            }),
            Value::String(s) => Self::parse(s),
            _ => Err(BridgeError::bad_request(
                "chat_id must be a number or a string",
            )),
        }
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Alias(alias) => f.write_str(alias),
        }
    }
}

/// Chat ids the bridge may send to. Empty means unrestricted.
///
/// Checked against resolved numeric ids only, so an alias can never stand in
/// for a listed id or slip past one.
#[derive(Debug, Clone, Default)]
pub struct ChatAccessPolicy {
    allowed: HashSet<i64>,
}

impl ChatAccessPolicy {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            allowed: ids.into_iter().collect(),
        }
    }

    /// Build from configured strings. Every entry must be a numeric chat id;
    /// an `@alias` or any other non-numeric entry is rejected, since dropping
    /// it could leave the list empty and therefore unrestricted.
    pub fn from_config(entries: &[String]) -> BridgeResult<Self> {
        let allowed = entries
            .iter()
            .map(|entry| {
                entry.trim().parse::<i64>().map_err(|_| {
                    BridgeError::bad_request(format!(
                        "allowlist entry '{entry}' is not a numeric chat id"
                    ))
                    .with_details(serde_json::json!({"entry": entry}))
                })
            })
            .collect::<BridgeResult<HashSet<i64>>>()?;
        Ok(Self { allowed })
    }

    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn check(&self, chat_id: i64) -> BridgeResult<()> {
        if self.is_unrestricted() || self.allowed.contains(&chat_id) {
            return Ok(());
        }
        Err(BridgeError::new(
            ErrorKind::DestinationNotAllowed,
            format!("chat {chat_id} is not on this bridge's allowlist"),
        )
        .with_details(serde_json::json!({"chat_id": chat_id})))
    }
}
