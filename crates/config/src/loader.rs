use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::TelegateConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "telegate.toml",
    "telegate.yaml",
    "telegate.yml",
    "telegate.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<TelegateConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./telegate.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/telegate/telegate.{toml,yaml,yml,json}` (user-global)
///
/// Returns `TelegateConfig::default()` if no config file is found.
pub fn discover_and_load() -> TelegateConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    TelegateConfig::default()
}

/// Load an explicitly requested file, or fall back to discovery.
///
/// An explicit path that cannot be read or parsed is an error rather than a
/// silent fallback to defaults.
pub fn load_or_discover(explicit: Option<&Path>) -> anyhow::Result<TelegateConfig> {
    match explicit {
        Some(path) => load_config(path),
        None => Ok(discover_and_load()),
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(config_dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/telegate/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "telegate").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<TelegateConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

// ── Environment overrides ───────────────────────────────────────────────────

/// Apply `TELEGRAM_BOT_TOKEN` / `TELEGATE_*` environment variables on top of
/// the file-based config.
pub fn apply_env_overrides(config: TelegateConfig) -> TelegateConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

/// Same as [`apply_env_overrides`] with an injectable lookup, so tests do not
/// need to mutate the process environment.
fn apply_env_overrides_with(
    mut config: TelegateConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> TelegateConfig {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
        config.telegram.bot_token = Secret::new(token.trim().to_string());
    }
    if let Some(token) = get("TELEGATE_AUTH_TOKEN") {
        config.server.auth_token = Some(Secret::new(token.trim().to_string()));
    }
    if let Some(bind) = get("TELEGATE_BIND") {
        config.server.bind = bind.trim().to_string();
    }
    if let Some(port) = get("TELEGATE_PORT") {
        match port.trim().parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %port, error = %e, "ignoring invalid TELEGATE_PORT"),
        }
    }
    if let Some(ids) = get("TELEGATE_ALLOWED_CHAT_IDS") {
        config.telegram.allowed_chat_ids = ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(flag) = get("TELEGATE_LEGACY_DIALECT") {
        match parse_bool(&flag) {
            Some(enabled) => config.protocol.legacy_dialect = enabled,
            None => warn!(value = %flag, "ignoring invalid TELEGATE_LEGACY_DIALECT"),
        }
    }
    if let Some(max) = get("TELEGATE_MAX_FILE_BYTES") {
        match max.trim().parse::<usize>() {
            Ok(max) => config.files.max_bytes = max,
            Err(e) => warn!(value = %max, error = %e, "ignoring invalid TELEGATE_MAX_FILE_BYTES"),
        }
    }

    config
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, std::collections::HashMap};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn loads_toml_file_with_env_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telegate.toml");
        std::fs::write(&path, "[server]\nport = 4100\nbind = \"0.0.0.0\"\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 4100);
        assert_eq!(cfg.server.bind, "0.0.0.0");
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("telegate.yaml");
        std::fs::write(&yaml, "protocol:\n  legacy_dialect: false\n").unwrap();
        assert!(!load_config(&yaml).unwrap().protocol.legacy_dialect);

        let json = dir.path().join("telegate.json");
        std::fs::write(&json, r#"{"files": {"max_bytes": 10}}"#).unwrap();
        assert_eq!(load_config(&json).unwrap().files.max_bytes, 10);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telegate.ini");
        std::fs::write(&path, "port=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_or_discover(Some(&missing)).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = apply_env_overrides_with(
            TelegateConfig::default(),
            env(&[
                ("TELEGRAM_BOT_TOKEN", " 123:XYZ "),
                ("TELEGATE_AUTH_TOKEN", "sekret"),
                ("TELEGATE_PORT", "9000"),
                ("TELEGATE_ALLOWED_CHAT_IDS", "42, -1001 ,,7"),
                ("TELEGATE_LEGACY_DIALECT", "off"),
                ("TELEGATE_MAX_FILE_BYTES", "2048"),
            ]),
        );
        assert_eq!(cfg.telegram.bot_token.expose_secret(), "123:XYZ");
        assert_eq!(
            cfg.server.auth_token.as_ref().map(|s| s.expose_secret().as_str()),
            Some("sekret")
        );
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.telegram.allowed_chat_ids, vec!["42", "-1001", "7"]);
        assert!(!cfg.protocol.legacy_dialect);
        assert_eq!(cfg.files.max_bytes, 2048);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let cfg = apply_env_overrides_with(
            TelegateConfig::default(),
            env(&[
                ("TELEGATE_PORT", "not-a-port"),
                ("TELEGATE_LEGACY_DIALECT", "maybe"),
                ("TELEGATE_AUTH_TOKEN", "   "),
            ]),
        );
        assert_eq!(cfg.server.port, 3000);
        assert!(cfg.protocol.legacy_dialect);
        assert!(cfg.server.auth_token.is_none());
    }
}
