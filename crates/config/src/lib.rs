//! Configuration loading, validation, env substitution and env overrides.
//!
//! Config files: `telegate.toml`, `telegate.yaml`, or `telegate.json`
//! Searched in `./` then `~/.config/telegate/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config, load_or_discover},
    schema::{
        FilesConfig, ProtocolConfig, RateLimitConfig, ServerConfig, TelegateConfig,
        TelegramConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
