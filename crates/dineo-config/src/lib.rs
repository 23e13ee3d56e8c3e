// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Dineo fleet assistant.
//!
//! TOML files merged through Figment with `DINEO_*` env overrides,
//! `deny_unknown_fields` models, and miette diagnostics for startup errors.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::DineoConfig;
pub use validation::validate_config;

/// Load, deserialize and semantically validate configuration in one call.
///
/// Returns all collected diagnostics on failure so the binary can render
/// them together and exit.
pub fn load_and_validate() -> Result<DineoConfig, Vec<ConfigError>> {
    let config = load_config().map_err(diagnostic::figment_to_config_errors)?;
    validate_config(&config)?;
    Ok(config)
}
