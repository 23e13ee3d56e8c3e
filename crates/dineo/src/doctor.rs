// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dineo doctor` command implementation.
//!
//! Quick environment checks: database, context directory, WhatsApp and
//! LLM credentials. Exit status is non-zero when any check fails.

use std::time::{Duration, Instant};

use dineo_config::DineoConfig;
use dineo_core::DineoError;
use dineo_storage::Database;
use dineo_storage::database::map_tr_err;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

fn result(name: &str, status: CheckStatus, message: impl Into<String>, started: Instant) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        status,
        message: message.into(),
        duration: started.elapsed(),
    }
}

/// Run all checks and print the report. Returns the failure count.
pub async fn run(config: &DineoConfig) -> Result<usize, DineoError> {
    let results = vec![
        check_database(&config.storage.database_path).await,
        check_context_dir(&config.storage.context_dir),
        check_whatsapp(config),
        check_llm(config),
        check_workers(config),
    ];

    println!();
    println!("  dineo doctor");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    for r in &results {
        let tag = match r.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => {
                fail_count += 1;
                "[FAIL]"
            }
        };
        println!(
            "    {tag} {:<14} {} ({}ms)",
            r.name,
            r.message,
            r.duration.as_millis()
        );
    }
    println!();
    Ok(fail_count)
}

/// Opens the database (running migrations) and counts the tables.
pub(crate) async fn check_database(path: &str) -> CheckResult {
    let started = Instant::now();
    let db = match Database::open(path).await {
        Ok(db) => db,
        Err(e) => return result("database", CheckStatus::Fail, e.to_string(), started),
    };
    let tables: Result<i64, DineoError> = db
        .connection()
        .call(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err);
    match tables {
        Ok(n) => result("database", CheckStatus::Pass, format!("{n} tables"), started),
        Err(e) => result("database", CheckStatus::Fail, e.to_string(), started),
    }
}

/// The context directory must be creatable and writable.
pub(crate) fn check_context_dir(dir: &str) -> CheckResult {
    let started = Instant::now();
    if let Err(e) = std::fs::create_dir_all(dir) {
        return result("context-dir", CheckStatus::Fail, e.to_string(), started);
    }
    let probe = std::path::Path::new(dir).join(".doctor-probe");
    match std::fs::write(&probe, b"ok") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            result("context-dir", CheckStatus::Pass, "writable", started)
        }
        Err(e) => result("context-dir", CheckStatus::Fail, e.to_string(), started),
    }
}

pub(crate) fn check_whatsapp(config: &DineoConfig) -> CheckResult {
    let started = Instant::now();
    if config.whatsapp.access_token.is_some() && config.whatsapp.phone_number_id.is_some() {
        result("whatsapp", CheckStatus::Pass, "cloud api configured", started)
    } else {
        result(
            "whatsapp",
            CheckStatus::Warn,
            "no credentials, sends are dry-run",
            started,
        )
    }
}

pub(crate) fn check_llm(config: &DineoConfig) -> CheckResult {
    let started = Instant::now();
    match (config.llm.enabled, config.llm.api_key.is_some()) {
        (false, _) => result("llm", CheckStatus::Pass, "disabled", started),
        (true, true) => result("llm", CheckStatus::Pass, "paraphrase enabled", started),
        (true, false) => result(
            "llm",
            CheckStatus::Warn,
            "enabled without api key, falling back to templates",
            started,
        ),
    }
}

pub(crate) fn check_workers(config: &DineoConfig) -> CheckResult {
    let started = Instant::now();
    let mut on = Vec::new();
    let mut off = Vec::new();
    for (name, enabled) in [
        ("nudge", config.nudge.enabled),
        ("intraday", config.intraday.enabled),
        ("followup", config.engagement.followup_enabled),
        ("checkin", config.checkin.enabled),
    ] {
        if enabled {
            on.push(name);
        } else {
            off.push(name);
        }
    }
    let message = if off.is_empty() {
        "all enabled".to_string()
    } else {
        format!("enabled: {}; disabled: {}", on.join(", "), off.join(", "))
    };
    let status = if on.is_empty() {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };
    result("workers", status, message, started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn database_check_passes_on_fresh_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doctor.db");
        let r = check_database(path.to_str().unwrap()).await;
        assert_eq!(r.status, CheckStatus::Pass);
        assert!(r.message.contains("tables"));
    }

    #[test]
    fn context_dir_check_creates_and_probes() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("ctx");
        let r = check_context_dir(sub.to_str().unwrap());
        assert_eq!(r.status, CheckStatus::Pass);
        assert!(sub.exists());
        assert!(!sub.join(".doctor-probe").exists());
    }

    #[test]
    fn credential_checks_reflect_configuration() {
        let mut config = DineoConfig::default();
        assert_eq!(check_whatsapp(&config).status, CheckStatus::Warn);
        assert_eq!(check_llm(&config).status, CheckStatus::Pass);

        config.whatsapp.access_token = Some("token".into());
        config.whatsapp.phone_number_id = Some("123".into());
        config.llm.enabled = true;
        assert_eq!(check_whatsapp(&config).status, CheckStatus::Pass);
        assert_eq!(check_llm(&config).status, CheckStatus::Warn);
    }

    #[test]
    fn worker_check_names_disabled_workers() {
        let mut config = DineoConfig::default();
        assert_eq!(check_workers(&config).message, "all enabled");
        config.nudge.enabled = false;
        let r = check_workers(&config);
        assert_eq!(r.status, CheckStatus::Pass);
        assert!(r.message.contains("disabled: nudge"));
    }
}
