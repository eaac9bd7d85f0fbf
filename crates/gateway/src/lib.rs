//! HTTP surface of telegate.
//!
//! Serves the MCP SSE transport (a `GET` that opens the push channel and a
//! `POST` for follow-up submissions), bearer-token auth, and `/health`, and
//! wires the Telegram operations into the tool dispatcher.

pub mod auth_middleware;
pub mod error;
pub mod server;
pub mod sse;
pub mod tools;

pub use {
    error::ApiError,
    server::{AppState, build_app, build_bridge, start_server},
    tools::{TelegramTools, register_telegram_tools},
};
