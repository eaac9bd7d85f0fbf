//! Outbound text sanitization.
//!
//! Control characters are always stripped. `MarkdownV2` text has every
//! reserved character escaped; `HTML` text is reduced to the tags and
//! attributes Telegram renders, with the rest dropped and stray `<`, `>`
//! and `&` escaped.

use {
    serde::{Deserialize, Serialize},
    telegate_common::{BridgeError, BridgeResult},
};

/// Characters that must be backslash-escaped anywhere in MarkdownV2 text.
const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Tags Telegram renders. Attribute rules are applied in [`render_open_tag`].
const ALLOWED_TAGS: &[&str] = &[
    "b",
    "strong",
    "i",
    "em",
    "u",
    "ins",
    "s",
    "strike",
    "del",
    "a",
    "code",
    "pre",
    "tg-spoiler",
    "span",
    "blockquote",
    "tg-emoji",
];

const ALLOWED_LINK_SCHEMES: &[&str] = &["http://", "https://", "tg://", "mailto:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    #[serde(rename = "MarkdownV2")]
    MarkdownV2,
    #[serde(rename = "HTML")]
    Html,
}

impl ParseMode {
    /// Parse a caller-supplied mode; `None`, `""` and `"plain"` mean no markup.
    pub fn from_arg(raw: Option<&str>) -> BridgeResult<Option<Self>> {
        let Some(raw) = raw.map(str::trim) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "" | "plain" | "none" | "text" => Ok(None),
            "markdownv2" | "markdown" => Ok(Some(Self::MarkdownV2)),
            "html" => Ok(Some(Self::Html)),
            _ => Err(BridgeError::bad_request(format!(
                "unsupported parse_mode '{raw}' (expected MarkdownV2, HTML or plain)"
            ))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MarkdownV2 => "MarkdownV2",
            Self::Html => "HTML",
        }
    }
}

/// Sanitize text for submission with the given parse mode.
#[must_use]
pub fn sanitize_text(text: &str, mode: Option<ParseMode>) -> String {
    let text = strip_control_chars(text);
    match mode {
        None => text,
        Some(ParseMode::MarkdownV2) => escape_markdown_v2(&text),
        Some(ParseMode::Html) => sanitize_html(&text),
    }
}

/// Remove control characters except newline and tab.
#[must_use]
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .collect()
}

#[must_use]
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Reduce HTML to Telegram's allow-list.
///
/// Disallowed tags are removed but their text content is kept. Output tags
/// are always balanced: closing a tag also closes anything opened inside it,
/// and tags left open at the end are closed.
#[must_use]
pub fn sanitize_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut open: Vec<String> = Vec::new();
    let mut rest = input;

    while let Some(c) = rest.chars().next() {
        match c {
            '<' => {
                if let Some((tag, len)) = parse_tag(rest) {
                    emit_tag(&tag, &mut open, &mut out);
                    rest = &rest[len..];
                } else {
                    out.push_str("&lt;");
                    rest = &rest[1..];
                }
            },
            '&' => {
                let entity_len = entity_len(rest);
                if entity_len > 0 {
                    out.push_str(&rest[..entity_len]);
                    rest = &rest[entity_len..];
                } else {
                    out.push_str("&amp;");
                    rest = &rest[1..];
                }
            },
            '>' => {
                out.push_str("&gt;");
                rest = &rest[1..];
            },
            '"' => {
                out.push_str("&quot;");
                rest = &rest[1..];
            },
            _ => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            },
        }
    }

    while let Some(name) = open.pop() {
        push_close(&name, &mut out);
    }
    out
}

#[derive(Debug)]
struct Tag {
    name: String,
    closing: bool,
    attrs: Vec<(String, Option<String>)>,
}

/// Parse one tag at the start of `input`, returning it and its byte length.
fn parse_tag(input: &str) -> Option<(Tag, usize)> {
    let bytes = input.as_bytes();
    let mut i = 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }

    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    if i == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }
    let name = input[name_start..i].to_ascii_lowercase();

    // Find the closing '>' outside quoted attribute values.
    let attrs_start = i;
    let mut quote: Option<u8> = None;
    let end = loop {
        let b = *bytes.get(i)?;
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {},
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => break i,
            (None, b'<') => return None,
            (None, _) => {},
        }
        i += 1;
    };

    let attrs = parse_attrs(input[attrs_start..end].trim_end_matches('/'));
    Some((
        Tag {
            name,
            closing,
            attrs,
        },
        end + 1,
    ))
}

fn parse_attrs(mut s: &str) -> Vec<(String, Option<String>)> {
    let mut attrs = Vec::new();
    loop {
        s = s.trim_start();
        if s.is_empty() {
            return attrs;
        }
        let name_len = s
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(s.len());
        if name_len == 0 {
            // Stray '=' with no name.
            s = &s[1..];
            continue;
        }
        let name = s[..name_len].to_ascii_lowercase();
        s = s[name_len..].trim_start();

        let Some(after_eq) = s.strip_prefix('=') else {
            attrs.push((name, None));
            continue;
        };
        let after_eq = after_eq.trim_start();
        let (value, remainder) = match after_eq.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let body = &after_eq[1..];
                match body.find(q) {
                    Some(close) => (&body[..close], &body[close + 1..]),
                    None => (body, ""),
                }
            },
            _ => {
                let len = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                (&after_eq[..len], &after_eq[len..])
            },
        };
        attrs.push((name, Some(decode_attr(value))));
        s = remainder;
    }
}

fn decode_attr(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn attr<'a>(tag: &'a Tag, name: &str) -> Option<&'a str> {
    tag.attrs
        .iter()
        .find(|(n, _)| n == name)
        .and_then(|(_, v)| v.as_deref())
}

fn emit_tag(tag: &Tag, open: &mut Vec<String>, out: &mut String) {
    if !ALLOWED_TAGS.contains(&tag.name.as_str()) {
        return;
    }

    if tag.closing {
        let Some(pos) = open.iter().rposition(|n| *n == tag.name) else {
            return;
        };
        while open.len() > pos {
            if let Some(name) = open.pop() {
                push_close(&name, out);
            }
        }
        return;
    }

    if let Some(rendered) = render_open_tag(tag) {
        out.push_str(&rendered);
        open.push(tag.name.clone());
    }
}

/// Render an allowed opening tag with only its permitted attributes, or
/// `None` when the tag is only allowed with an attribute it lacks.
fn render_open_tag(tag: &Tag) -> Option<String> {
    match tag.name.as_str() {
        "a" => {
            let href = attr(tag, "href")?.trim();
            if !ALLOWED_LINK_SCHEMES
                .iter()
                .any(|scheme| href.to_ascii_lowercase().starts_with(scheme))
            {
                return None;
            }
            Some(format!("<a href=\"{}\">", escape_attr(href)))
        },
        "code" => match attr(tag, "class") {
            Some(class) if is_language_class(class) => {
                Some(format!("<code class=\"{}\">", escape_attr(class)))
            },
            _ => Some("<code>".into()),
        },
        "span" => match attr(tag, "class") {
            Some("tg-spoiler") => Some("<span class=\"tg-spoiler\">".into()),
            _ => None,
        },
        "blockquote" => {
            if tag.attrs.iter().any(|(n, _)| n == "expandable") {
                Some("<blockquote expandable>".into())
            } else {
                Some("<blockquote>".into())
            }
        },
        "tg-emoji" => {
            let id = attr(tag, "emoji-id")?;
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            Some(format!("<tg-emoji emoji-id=\"{id}\">"))
        },
        name => Some(format!("<{name}>")),
    }
}

fn is_language_class(class: &str) -> bool {
    class.strip_prefix("language-").is_some_and(|lang| {
        !lang.is_empty()
            && lang
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#'))
    })
}

fn push_close(name: &str, out: &mut String) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Byte length of a well-formed entity at the start of `input`, or 0.
fn entity_len(input: &str) -> usize {
    let Some(end) = input.find(';') else {
        return 0;
    };
    if end > 10 {
        return 0;
    }
    let body = &input[1..end];
    let valid = match body.strip_prefix('#') {
        Some(num) => match num.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        },
        None => matches!(body, "lt" | "gt" | "amp" | "quot"),
    };
    if valid { end + 1 } else { 0 }
}
