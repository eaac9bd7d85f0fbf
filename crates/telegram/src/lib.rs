//! Outbound Telegram Bot API client for telegate.
//!
//! Calls go through a token-bucket [`RateLimiter`], are retried on transient
//! failures with exponential backoff, and every terminal failure is
//! classified into a [`telegate_common::ErrorKind`].

pub mod access;
pub mod client;
pub mod error;
pub mod rate_limit;
pub mod resolver;
pub mod sanitize;
pub mod types;

pub use {
    access::{ChatAccessPolicy, ChatTarget},
    client::{RetryPolicy, SendOptions, TelegramClient},
    error::{Error, ProviderFailure, Result, classify},
    rate_limit::RateLimiter,
    resolver::{FileResolver, ResolvedFile, sanitize_filename},
    sanitize::{ParseMode, sanitize_text},
};
