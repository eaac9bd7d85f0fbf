//! Shared error taxonomy and utilities used across all telegate crates.

pub mod error;

pub use error::{BridgeError, BridgeResult, ErrorKind, FromMessage};
