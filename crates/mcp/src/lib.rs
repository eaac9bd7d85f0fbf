//! MCP (Model Context Protocol) server side for telegate.
//!
//! This crate provides:
//! - JSON-RPC 2.0 / MCP protocol types (`types`)
//! - Normalization of inbound request envelopes into one canonical shape (`envelope`)
//! - The registry of open push-channel sessions and request routing (`session`)
//! - Tool dispatch for `initialize`, `tools/list` and `tools/call` (`dispatcher`)

pub mod dispatcher;
pub mod envelope;
pub mod session;
pub mod traits;
pub mod types;

pub use {
    dispatcher::ToolDispatcher,
    envelope::{CanonicalRequest, NormalizeOptions, RawPayload, normalize},
    session::{
        ChannelEvent, ChannelSender, RegistryConfig, RouteAck, SessionInfo, SessionRegistry,
    },
    traits::{McpTool, ProtocolHandler},
};
