// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./memdex.toml` > `~/.config/memdex/memdex.toml` > `/etc/memdex/memdex.toml`
//! with environment variable overrides via `MEMDEX_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::MemdexConfig;

/// Config sections, in the order env var prefixes are tried.
const SECTIONS: [&str; 6] = [
    "storage",
    "sources",
    "chunking",
    "search",
    "sync",
    "embedding",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/memdex/memdex.toml` (system-wide)
/// 3. `~/.config/memdex/memdex.toml` (user XDG config)
/// 4. `./memdex.toml` (local directory)
/// 5. `MEMDEX_*` environment variables
pub fn load_config() -> Result<MemdexConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<MemdexConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MemdexConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MemdexConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MemdexConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MemdexConfig::default()))
        .merge(Toml::file("/etc/memdex/memdex.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("memdex/memdex.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("memdex.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")`: `MEMDEX_CHUNKING_MAX_TOKENS` must map to
/// `chunking.max_tokens`, not `chunking.max.tokens`.
fn env_provider() -> Env {
    Env::prefixed("MEMDEX_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config key.
///
/// Only the first underscore after a known section name becomes a dot.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}
