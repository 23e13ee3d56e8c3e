// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./dineo.toml` > `~/.config/dineo/dineo.toml`
//! > `/etc/dineo/dineo.toml`, with environment variable overrides via the
//! `DINEO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::DineoConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/dineo/dineo.toml` (system-wide)
/// 3. `~/.config/dineo/dineo.toml` (user XDG config)
/// 4. `./dineo.toml` (local directory)
/// 5. `DINEO_*` environment variables
pub fn load_config() -> Result<DineoConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<DineoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DineoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DineoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DineoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DineoConfig::default()))
        .merge(Toml::file("/etc/dineo/dineo.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("dineo/dineo.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("dineo.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `DINEO_NUDGE_MAX_PER_DAY` must map to
/// `nudge.max_per_day`, not `nudge.max.per.day`.
fn env_provider() -> Env {
    Env::prefixed("DINEO_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("assistant_", "assistant.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("whatsapp_", "whatsapp.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("llm_", "llm.", 1)
            .replacen("nudge_", "nudge.", 1)
            .replacen("intraday_", "intraday.", 1)
            .replacen("engagement_", "engagement.", 1)
            .replacen("goal_", "goal.", 1)
            .replacen("checkin_", "checkin.", 1)
            .replacen("intent_", "intent.", 1)
            .replacen("pop_", "pop.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_config_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[intraday]
grace_minutes = 45
"#,
        )
        .unwrap();
        assert_eq!(config.intraday.grace_minutes, 45);
        // Untouched sections keep defaults.
        assert_eq!(config.nudge.interval_secs, 3 * 3600);
    }

    #[test]
    fn empty_string_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.assistant.name, "Dineo");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(load_config_from_str("[nudge\nbroken").is_err());
    }
}
