// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints serde cannot express: hour ranges,
//! positive intervals, non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::DineoConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects all failures rather than failing fast.
pub fn validate_config(config: &DineoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.storage.context_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.context_dir must not be empty".to_string(),
        });
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    }

    if config.nudge.start_hour > 23 {
        errors.push(ConfigError::Validation {
            message: format!(
                "nudge.start_hour must be 0-23, got {}",
                config.nudge.start_hour
            ),
        });
    }

    if config.nudge.start_minute > 59 {
        errors.push(ConfigError::Validation {
            message: format!(
                "nudge.start_minute must be 0-59, got {}",
                config.nudge.start_minute
            ),
        });
    }

    if config.nudge.max_per_day < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "nudge.max_per_day must be at least 1, got {}",
                config.nudge.max_per_day
            ),
        });
    }

    if config.intraday.grace_minutes < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "intraday.grace_minutes must be at least 1, got {}",
                config.intraday.grace_minutes
            ),
        });
    }

    if !(0.0..=1.0).contains(&config.goal.target_min_ratio) {
        errors.push(ConfigError::Validation {
            message: format!(
                "goal.target_min_ratio must be within 0.0-1.0, got {}",
                config.goal.target_min_ratio
            ),
        });
    }

    if config.engagement.max_rows == 0 {
        errors.push(ConfigError::Validation {
            message: "engagement.max_rows must be at least 1".to_string(),
        });
    }

    if config.llm.enabled && config.llm.api_key.is_none() {
        errors.push(ConfigError::Validation {
            message: "llm.enabled requires llm.api_key (or disable the paraphrase layer)"
                .to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&DineoConfig::default()).is_ok());
    }

    #[test]
    fn out_of_range_hour_fails() {
        let mut config = DineoConfig::default();
        config.nudge.start_hour = 25;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("start_hour"))
        ));
    }

    #[test]
    fn bad_goal_ratio_fails() {
        let mut config = DineoConfig::default();
        config.goal.target_min_ratio = 1.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn llm_enabled_without_key_fails() {
        let mut config = DineoConfig::default();
        config.llm.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("llm.api_key"))
        ));
    }

    #[test]
    fn empty_context_dir_fails() {
        let mut config = DineoConfig::default();
        config.storage.context_dir = " ".to_string();
        assert!(validate_config(&config).is_err());
    }
}
