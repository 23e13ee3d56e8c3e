// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Dineo fleet assistant.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so unrecognized keys are
//! rejected at startup with actionable diagnostics. Every knob the scheduled
//! workers and dialogue machines honour lives here; nothing reads raw
//! environment variables at runtime.

use serde::{Deserialize, Serialize};

/// Top-level Dineo configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with `DINEO_*`
/// environment variable overrides. All sections default to sensible values;
/// only the WhatsApp credentials are genuinely deployment-specific.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DineoConfig {
    /// Assistant identity and driver-facing constants.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Webhook ingress settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// WhatsApp Cloud API transport settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// SQLite database and context-file settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Optional LLM paraphrase/transcription settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Zero-trip nudge worker settings.
    #[serde(default)]
    pub nudge: NudgeConfig,

    /// Intraday checkpoint worker settings.
    #[serde(default)]
    pub intraday: IntradayConfig,

    /// Engagement campaign and follow-up settings.
    #[serde(default)]
    pub engagement: EngagementConfig,

    /// Goal-commitment dialogue settings.
    #[serde(default)]
    pub goal: GoalConfig,

    /// No-vehicle check-in settings.
    #[serde(default)]
    pub checkin: CheckinConfig,

    /// Intent classifier settings.
    #[serde(default)]
    pub intent: IntentConfig,

    /// Proof-of-payment dialogue settings.
    #[serde(default)]
    pub pop: PopConfig,
}

/// Assistant identity and driver-facing constants.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantConfig {
    /// Display name used in greetings and the paraphrase system prompt.
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Self-service statement portal login URL, quoted in balance replies.
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            login_url: default_login_url(),
            log_level: default_log_level(),
        }
    }
}

fn default_assistant_name() -> String {
    "Dineo".to_string()
}

fn default_login_url() -> String {
    "https://portal.example.co.za/login".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Webhook ingress configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Token echoed back during the `hub.challenge` handshake.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// Sliding dedupe window for repeated webhook deliveries, in seconds.
    #[serde(default = "default_dedupe_window_secs")]
    pub dedupe_window_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            verify_token: None,
            dedupe_window_secs: default_dedupe_window_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_dedupe_window_secs() -> u64 {
    120
}

/// WhatsApp Cloud API transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Graph API bearer token. `None` disables real sends (dry-run).
    #[serde(default)]
    pub access_token: Option<String>,

    /// Business phone number id used in send URLs.
    #[serde(default)]
    pub phone_number_id: Option<String>,

    /// Graph API base URL. Overridable for tests.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Default template language code.
    #[serde(default = "default_template_language")]
    pub template_language: String,

    /// HTTP timeout for send and media calls, in seconds.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            phone_number_id: None,
            api_base_url: default_api_base_url(),
            template_language: default_template_language(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_template_language() -> String {
    "en".to_string()
}

fn default_send_timeout_secs() -> u64 {
    30
}

/// SQLite database and context-file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory holding per-driver JSON context files.
    #[serde(default = "default_context_dir")]
    pub context_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            context_dir: default_context_dir(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("dineo").join("dineo.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("dineo.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_context_dir() -> String {
    "./context".to_string()
}

/// Optional LLM paraphrase and transcription configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Enable LLM paraphrase of deterministic replies.
    #[serde(default)]
    pub enabled: bool,

    /// Provider API key. `None` with `enabled = true` falls back to templates.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier for paraphrase calls.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Provider API base URL.
    #[serde(default = "default_llm_base_url")]
    pub api_base_url: String,

    /// HTTP timeout for LLM calls, in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: default_llm_model(),
            api_base_url: default_llm_base_url(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "claude-haiku-4-5-20250901".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

/// Zero-trip nudge worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NudgeConfig {
    /// Master switch for the zero-trip nudge worker.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Loop cadence in seconds.
    #[serde(default = "default_nudge_interval_secs")]
    pub interval_secs: u64,

    /// Daily cap on nudges per driver.
    #[serde(default = "default_max_nudges_per_day")]
    pub max_per_day: i64,

    /// Earliest Johannesburg hour a nudge may be sent.
    #[serde(default = "default_nudge_start_hour")]
    pub start_hour: u32,

    /// Minute component of the start-of-day gate.
    #[serde(default)]
    pub start_minute: u32,

    /// Skip nudging on Sundays.
    #[serde(default)]
    pub skip_sundays: bool,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_nudge_interval_secs(),
            max_per_day: default_max_nudges_per_day(),
            start_hour: default_nudge_start_hour(),
            start_minute: 0,
            skip_sundays: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_nudge_interval_secs() -> u64 {
    3 * 3600
}

fn default_max_nudges_per_day() -> i64 {
    3
}

fn default_nudge_start_hour() -> u32 {
    9
}

/// Intraday checkpoint worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntradayConfig {
    /// Master switch for the intraday update worker.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Loop cadence in seconds. Emission only happens at checkpoint hours.
    #[serde(default = "default_intraday_interval_secs")]
    pub interval_secs: u64,

    /// Minutes after each checkpoint hour during which a slot may be claimed.
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,

    /// Floor applied to the derived daily finished-trips target.
    #[serde(default = "default_daily_min_finished")]
    pub daily_min_finished_orders: i64,
}

impl Default for IntradayConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_intraday_interval_secs(),
            grace_minutes: default_grace_minutes(),
            daily_min_finished_orders: default_daily_min_finished(),
        }
    }
}

fn default_intraday_interval_secs() -> u64 {
    600
}

fn default_grace_minutes() -> i64 {
    30
}

fn default_daily_min_finished() -> i64 {
    8
}

/// Engagement campaign and follow-up configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngagementConfig {
    /// Master switch for the campaign follow-up worker.
    #[serde(default = "default_true")]
    pub followup_enabled: bool,

    /// Hours after a campaign send before the follow-up fires.
    #[serde(default = "default_followup_delay_hours")]
    pub followup_delay_hours: i64,

    /// Days within which an inbound reply counts as a campaign response.
    #[serde(default = "default_response_window_days")]
    pub response_window_days: i64,

    /// Row cap applied during CSV parse.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Weekly online-hours commitment floor before the ratio is applied.
    #[serde(default = "default_target_online_hours_min")]
    pub target_online_hours_min: f64,

    /// Weekly trip-count commitment target.
    #[serde(default = "default_target_trips")]
    pub target_trips: i64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            followup_enabled: default_true(),
            followup_delay_hours: default_followup_delay_hours(),
            response_window_days: default_response_window_days(),
            max_rows: default_max_rows(),
            target_online_hours_min: default_target_online_hours_min(),
            target_trips: default_target_trips(),
        }
    }
}

fn default_followup_delay_hours() -> i64 {
    24
}

fn default_response_window_days() -> i64 {
    7
}

fn default_max_rows() -> usize {
    2000
}

fn default_target_online_hours_min() -> f64 {
    55.0
}

fn default_target_trips() -> i64 {
    122
}

/// Goal-commitment dialogue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GoalConfig {
    /// Fraction of the engagement targets accepted as a minimum commitment.
    #[serde(default = "default_target_min_ratio")]
    pub target_min_ratio: f64,

    /// Days a confirmed goal stays valid before re-prompting.
    #[serde(default = "default_target_ttl_days")]
    pub target_ttl_days: i64,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            target_min_ratio: default_target_min_ratio(),
            target_ttl_days: default_target_ttl_days(),
        }
    }
}

fn default_target_min_ratio() -> f64 {
    0.9
}

fn default_target_ttl_days() -> i64 {
    7
}

/// No-vehicle check-in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CheckinConfig {
    /// Master switch for the no-vehicle check-in worker.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Hours after a no-vehicle reason is logged before the check-in fires.
    #[serde(default = "default_checkin_delay_hours")]
    pub no_vehicle_delay_hours: i64,
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            no_vehicle_delay_hours: default_checkin_delay_hours(),
        }
    }
}

fn default_checkin_delay_hours() -> i64 {
    24
}

/// Intent classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntentConfig {
    /// Seconds a confirmed ambiguous intent stays memoised, skipping the
    /// yes/no confirmation gate for follow-ups.
    #[serde(default = "default_confirmation_ttl_secs")]
    pub confirmation_ttl_secs: i64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            confirmation_ttl_secs: default_confirmation_ttl_secs(),
        }
    }
}

fn default_confirmation_ttl_secs() -> i64 {
    600
}

/// Proof-of-payment dialogue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PopConfig {
    /// Hours a POP request stays pending before the marker expires.
    #[serde(default = "default_pop_pending_ttl_hours")]
    pub pending_ttl_hours: i64,
}

impl Default for PopConfig {
    fn default() -> Self {
        Self {
            pending_ttl_hours: default_pop_pending_ttl_hours(),
        }
    }
}

fn default_pop_pending_ttl_hours() -> i64 {
    48
}
