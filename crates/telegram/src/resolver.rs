//! Turns a caller's file reference into bytes ready for upload.
//!
//! References are either inline `data:<type>;base64,<data>` payloads or
//! http(s) URLs. Both paths enforce the byte ceiling: inline payloads by
//! encoded length before decoding and decoded length after, remote fetches by
//! `Content-Length` before reading and running total while streaming.

use std::time::Duration;

use {
    base64::Engine,
    bytes::{Bytes, BytesMut},
    futures::StreamExt,
    serde_json::json,
    telegate_common::{BridgeError, BridgeResult, ErrorKind},
    telegate_config::FilesConfig,
    tracing::debug,
    url::Url,
};

use crate::error::{Context, Result};

const MAX_FILENAME_LEN: usize = 128;
const FALLBACK_FILENAME: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: Option<String>,
}

#[derive(Clone)]
pub struct FileResolver {
    http: reqwest::Client,
    timeout: Duration,
}

impl FileResolver {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub fn from_config(config: &FilesConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("telegate/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build download HTTP client")?;
        Ok(Self::new(
            http,
            Duration::from_secs(config.download_timeout_secs),
        ))
    }

    pub async fn resolve(
        &self,
        reference: &str,
        default_filename: &str,
        max_bytes: usize,
    ) -> BridgeResult<ResolvedFile> {
        let reference = reference.trim();
        if let Some(rest) = reference.strip_prefix("data:") {
            return decode_data_url(rest, default_filename, max_bytes);
        }
        self.fetch(reference, default_filename, max_bytes).await
    }

    async fn fetch(
        &self,
        reference: &str,
        default_filename: &str,
        max_bytes: usize,
    ) -> BridgeResult<ResolvedFile> {
        let url = Url::parse(reference).map_err(|e| {
            BridgeError::new(
                ErrorKind::InvalidSource,
                format!("file reference is neither a data URL nor a valid URL: {e}"),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BridgeError::new(
                ErrorKind::InvalidSource,
                format!("unsupported URL scheme '{}'", url.scheme()),
            ));
        }

        let response = self
            .http
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| download_failed(format!("failed to fetch {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                download_failed(format!("fetching {url} returned HTTP {status}"))
                    .with_details(json!({"status": status.as_u16()})),
            );
        }
        if let Some(declared) = response.content_length()
            && declared > max_bytes as u64
        {
            return Err(too_large(max_bytes).with_details(json!({"content_length": declared})));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_failed(format!("failed to read {url}: {e}")))?;
            if body.len() + chunk.len() > max_bytes {
                return Err(too_large(max_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        let filename = url
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map_or_else(
                || sanitize_filename(default_filename),
                sanitize_filename,
            );
        debug!(url = %url, bytes = body.len(), filename = %filename, "downloaded file");

        Ok(ResolvedFile {
            bytes: body.freeze(),
            filename,
            content_type,
        })
    }
}

fn decode_data_url(rest: &str, default_filename: &str, max_bytes: usize) -> BridgeResult<ResolvedFile> {
    let Some((meta, data)) = rest.split_once(',') else {
        return Err(BridgeError::new(
            ErrorKind::InvalidSource,
            "data URL is missing the ',' separator",
        ));
    };
    let Some(media_type) = meta.strip_suffix(";base64") else {
        return Err(BridgeError::new(
            ErrorKind::InvalidSource,
            "only base64 data URLs are supported",
        ));
    };

    let encoded: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    // Four encoded characters carry at most three bytes.
    if encoded.len() / 4 * 3 > max_bytes.saturating_add(3) {
        return Err(too_large(max_bytes));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| {
            BridgeError::new(
                ErrorKind::InvalidSource,
                format!("data URL payload is not valid base64: {e}"),
            )
        })?;
    if decoded.len() > max_bytes {
        return Err(too_large(max_bytes));
    }

    let media_type = media_type.split(';').next().unwrap_or_default().trim();
    Ok(ResolvedFile {
        bytes: Bytes::from(decoded),
        filename: sanitize_filename(default_filename),
        content_type: (!media_type.is_empty()).then(|| media_type.to_string()),
    })
}

/// Reduce a name to a safe basename of `[A-Za-z0-9._-]`, without leading
/// dots, at most 128 characters, falling back to `file`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned: String = cleaned
        .trim_start_matches('.')
        .chars()
        .take(MAX_FILENAME_LEN)
        .collect();
    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}

fn too_large(max_bytes: usize) -> BridgeError {
    BridgeError::new(
        ErrorKind::TooLarge,
        format!("file exceeds the {max_bytes} byte limit"),
    )
    .with_details(json!({"max_bytes": max_bytes}))
}

fn download_failed(message: String) -> BridgeError {
    BridgeError::new(ErrorKind::DownloadFailed, message)
}
