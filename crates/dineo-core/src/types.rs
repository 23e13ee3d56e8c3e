// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical domain types shared across the Dineo workspace.
//!
//! Intents, concern types and ticket statuses are tagged string variants;
//! the dialogue dispatcher is an exhaustive match over these enums, so new
//! variants surface every site that needs updating at compile time.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The closed intent vocabulary produced by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    // KPI family
    PerformanceSummary,
    ProgressUpdate,
    DailyTarget,
    AcceptanceRate,
    EarningsPerHour,
    TripCount,
    HotspotSummary,
    TopDriverTips,

    // Concern family
    MedicalPause,
    NoVehicle,
    CarProblem,
    AccidentReport,
    LowDemand,
    CashRides,
    AccountSuspension,
    AppIssue,
    BalanceDispute,
    VehicleRepossession,
    BrandingBonus,

    // Transactional
    AccountInquiry,
    CurrentDateTime,
    Greeting,
    Smalltalk,
    Identity,

    // Dialogue control
    Acknowledgement,
    Affirmation,
    Negation,
    OptIn,
    OptOut,
    GoalCommitment,
    TargetUpdate,
    ResolutionConfirmed,
    VoiceUnavailable,
    Clarify,
    Unknown,
}

impl Intent {
    /// The concern a ticket-creating intent opens, if any.
    pub fn concern(&self) -> Option<ConcernType> {
        match self {
            Intent::MedicalPause => Some(ConcernType::Medical),
            Intent::NoVehicle => Some(ConcernType::NoVehicle),
            Intent::CarProblem => Some(ConcernType::CarProblem),
            Intent::AccidentReport => Some(ConcernType::Accident),
            Intent::LowDemand => Some(ConcernType::LowDemand),
            Intent::CashRides => Some(ConcernType::CashPop),
            Intent::AccountSuspension => Some(ConcernType::AccountSuspension),
            Intent::AppIssue => Some(ConcernType::AppIssue),
            Intent::BalanceDispute => Some(ConcernType::BalanceDispute),
            Intent::VehicleRepossession => Some(ConcernType::Repossession),
            Intent::BrandingBonus => Some(ConcernType::BrandingBonus),
            _ => None,
        }
    }

    /// True for the short replies that never close an active concern.
    pub fn is_acknowledgement(&self) -> bool {
        matches!(self, Intent::Acknowledgement | Intent::Affirmation)
    }
}

/// A driver problem that warrants a durable ticket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConcernType {
    Medical,
    NoVehicle,
    Repossession,
    Accident,
    CarProblem,
    CashPop,
    BalanceDispute,
    LowDemand,
    AccountSuspension,
    AppIssue,
    BrandingBonus,
    /// Finance follow-up opened from the no-vehicle balance path.
    FinanceFollowup,
}

impl ConcernType {
    /// Context key prefix under which this concern's sub-state block lives.
    pub fn context_key(&self) -> &'static str {
        match self {
            ConcernType::Medical => "_medical_ticket",
            ConcernType::NoVehicle => "_no_vehicle_ticket",
            ConcernType::Repossession => "_repo_ticket",
            ConcernType::Accident => "_accident_case",
            ConcernType::CarProblem => "_car_ticket",
            ConcernType::CashPop => "_cash_ticket",
            ConcernType::BalanceDispute => "_balance_ticket",
            ConcernType::LowDemand => "_low_demand_ticket",
            ConcernType::AccountSuspension => "_suspension_ticket",
            ConcernType::AppIssue => "_app_issue_ticket",
            ConcernType::BrandingBonus => "_branding_ticket",
            ConcernType::FinanceFollowup => "_finance_ticket",
        }
    }
}

/// Well-known ticket statuses. The closed set in [`is_closed_status`] is the
/// authority for "closed" -- admin consoles write free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Collecting,
    PendingOps,
    DriverConfirmedResolved,
    Resolved,
    Closed,
}

/// Case-insensitive membership test for the closed-status family.
pub fn is_closed_status(status: &str) -> bool {
    const CLOSED: &[&str] = &[
        "closed",
        "resolved",
        "driver_confirmed_resolved",
        "complete",
        "completed",
        "done",
        "finished",
        "success",
        "successful",
    ];
    let lower = status.trim().to_ascii_lowercase();
    CLOSED.contains(&lower.as_str())
}

/// Direction of a logged WhatsApp event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageDirection {
    Inbound,
    Outbound,
    Status,
}

/// A geographic point attached to a message or ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub name: Option<String>,
    pub address: Option<String>,
}

/// The content of an inbound driver message after media resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageKind {
    Text(String),
    /// Image or document; `url` is resolved from the media id at ingress.
    Media {
        media_id: String,
        url: Option<String>,
        caption: Option<String>,
        mime_type: Option<String>,
    },
    /// Voice note; `transcript` is None when transcription was unavailable.
    Audio {
        media_id: String,
        transcript: Option<String>,
    },
    Location(Location),
}

impl MessageKind {
    /// The text the classifier operates on, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageKind::Text(t) => Some(t),
            MessageKind::Media { caption, .. } => caption.as_deref(),
            MessageKind::Audio { transcript, .. } => transcript.as_deref(),
            MessageKind::Location(_) => None,
        }
    }
}

/// An inbound driver message after webhook extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// WhatsApp message id, used for dedupe and nudge linkage.
    pub wa_message_id: String,
    /// Normalised E.164 sender id.
    pub wa_id: String,
    pub kind: MessageKind,
    /// ISO-8601 Johannesburg timestamp of receipt.
    pub received_at: String,
}

/// Template parameter formats supported by the Cloud API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterFormat {
    Positional,
    Named,
}

/// One rendered template parameter. `name` is required for NAMED templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: Option<String>,
    pub value: String,
}

/// A fully rendered outbound template send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSend {
    pub name: String,
    pub language: String,
    pub parameter_format: ParameterFormat,
    pub params: Vec<TemplateParam>,
    pub media_id: Option<String>,
}

/// Snapshot of the last outbound template, kept in context so a driver's
/// next reply can be interpreted against what we asked them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundTemplateSnapshot {
    pub id: String,
    pub sent_at: String,
    pub params_named: serde_json::Map<String, serde_json::Value>,
    pub parameter_format: ParameterFormat,
}

// --- Warehouse-derived types (read-only from the core's perspective) ---

/// A driver as resolved from the roster; never mutated by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Driver {
    pub wa_id: String,
    pub driver_id: Option<String>,
    pub personal_code: Option<String>,
    pub display_name: Option<String>,
    pub asset_model: Option<String>,
    pub car_reg_number: Option<String>,
    pub contact_ids: Vec<String>,
}

impl Driver {
    /// First name for greetings, falling back to the full display name.
    pub fn first_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
    }
}

/// Seven-day roll-up for a driver and report date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyKpis {
    pub report_date: String,
    pub online_hours: f64,
    pub finished_trips: i64,
    pub gross_earnings: f64,
    /// Normalised to the 0-100 range regardless of upstream encoding.
    pub acceptance_rate: f64,
    pub earnings_per_hour: f64,
    pub xero_balance: f64,
    pub payments_7d: f64,
}

/// Same-day aggregates computed over finished trip orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodayKpis {
    pub trips_sent: i64,
    pub trips_accepted: i64,
    pub trips_finished: i64,
    pub gmv: f64,
    pub cash_trips: i64,
    pub card_trips: i64,
    pub avg_distance_km: f64,
    pub avg_duration_min: f64,
}

/// Today-vs-7-day KPIs returned in one structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub weekly: WeeklyKpis,
    pub today: TodayKpis,
}

// --- Durable rows ---

/// A durable record of a concern with status, media, location and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub wa_id: String,
    pub issue_type: String,
    pub status: String,
    pub initial_message: Option<String>,
    /// Append-only JSON array of media URLs.
    pub media_urls: Vec<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_desc: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
    pub last_update_at: String,
}

impl Ticket {
    pub fn is_closed(&self) -> bool {
        is_closed_status(&self.status)
    }
}

/// Audit-trail entry for a ticket transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketLog {
    pub id: i64,
    pub ticket_id: i64,
    pub admin_email: Option<String>,
    pub action_type: String,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
}

/// One row of the append-only message log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageLogEntry {
    pub wa_id: String,
    pub direction: String,
    pub message_text: Option<String>,
    pub intent: Option<String>,
    pub wa_message_id: Option<String>,
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<String>,
    pub status: Option<String>,
    pub response_latency_sec: Option<i64>,
    /// Johannesburg local time, ISO-8601.
    pub logged_at: String,
}

/// Per-day nudge idempotency row, keyed by `(wa_id, date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NudgeRow {
    pub wa_id: String,
    pub nudge_date: String,
    pub nudge_count: i64,
    pub last_sent_at: Option<String>,
}

/// Analytics row linking one sent nudge to the driver's eventual reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NudgeEvent {
    pub id: i64,
    pub wa_id: String,
    pub nudge_date: String,
    pub sequence: i64,
    pub outbound_message_id: Option<String>,
    pub send_status: String,
    pub sent_at: String,
    pub delivery_status: Option<String>,
    pub response_message_id: Option<String>,
    pub response_latency_sec: Option<i64>,
    pub response_intent: Option<String>,
}

/// Intraday checkpoint claim, keyed by `(wa_id, date, slot_hour)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntradaySlot {
    pub wa_id: String,
    pub slot_date: String,
    pub slot_hour: i64,
    pub send_status: String,
    pub outbound_message_id: Option<String>,
    pub updated_at: String,
}

/// An engagement campaign: CSV provenance, template map and aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementCampaign {
    pub id: String,
    pub source_filename: Option<String>,
    pub template_map: serde_json::Value,
    pub total_rows: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub skipped_count: i64,
    pub status: String,
    pub created_at: String,
}

/// One driver row inside an engagement campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementRow {
    pub id: i64,
    pub campaign_id: String,
    pub wa_id: String,
    pub driver_type: Option<String>,
    pub template_id: Option<String>,
    pub rendered_params: serde_json::Value,
    pub send_status: String,
    pub send_error: Option<String>,
    pub outbound_message_id: Option<String>,
    pub sent_at: Option<String>,
    /// KPI snapshot captured at send time, for uplift comparison.
    pub baseline_metrics: serde_json::Value,
    pub followup_status: Option<String>,
    pub followup_message_id: Option<String>,
    pub followup_sent_at: Option<String>,
}

/// Mirrored context row in `whatsapp_context_memory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMemoryRow {
    pub wa_id: String,
    pub last_intent: Option<String>,
    pub last_reply: Option<String>,
    pub prefs_json: String,
    pub updated_at: String,
}
