// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reserved context keys. Underscore-prefixed keys are machine state; the
//! rest of the map is free-form preference storage.

/// Last classified intent, mirrored to the database row.
pub const LAST_INTENT: &str = "_last_intent";
/// Last reply text we sent, mirrored to the database row.
pub const LAST_REPLY: &str = "_last_reply";
/// ISO timestamp of the last outbound send, for duplicate suppression.
pub const LAST_REPLY_AT: &str = "_last_reply_at";
/// Text of the last inbound message, for duplicate suppression.
pub const LAST_INBOUND: &str = "_last_inbound";
/// Johannesburg date (`YYYY-MM-DD`) the driver was last greeted.
pub const LAST_GREET_DATE: &str = "_last_greet_date";
/// Set when the driver opted out of coaching messages.
pub const GLOBAL_OPT_OUT: &str = "_global_opt_out";
/// Pauses engagement follow-ups without a full opt-out.
pub const FOLLOWUP_PAUSED: &str = "_followup_paused";
/// Active concern descriptor: `{ "type": ..., "opened_at": ..., "message": ... }`.
pub const ACTIVE_CONCERN: &str = "_active_concern";
/// Pending yes/no or 1-4 confirmation gate:
/// `{ "intent": ..., "expires_at": ... }`.
pub const PENDING_INTENT: &str = "_pending_intent";
/// Last confirmed ambiguous intent: `{ "intent": ..., "expires_at": ... }`.
/// Follow-ups inside the TTL skip the yes/no gate.
pub const CONFIRMED_INTENT: &str = "_confirmed_intent";
/// Awaiting a numeric goal answer: value is `"online_hours"` or `"trip_count"`.
pub const PENDING_GOAL: &str = "_pending_goal";
/// Set while the goal machine waits for a yes/no on a proposed target.
pub const AWAITING_GOAL_CONFIRM: &str = "_awaiting_goal_confirm";
/// Set while waiting for an updated target after a below-minimum answer.
pub const AWAITING_TARGET_UPDATE: &str = "_awaiting_target_update";
/// Set while a cash-rides ticket waits for the proof of payment.
pub const POP_PENDING_CONFIRMATION: &str = "_pop_pending_confirmation";
/// Snapshot of the last outbound template send.
pub const LAST_OUTBOUND_TEMPLATE: &str = "_last_outbound_template";
/// Outbound id of the most recent zero-trip nudge, for response linkage.
pub const LAST_NUDGE_OUTBOUND_ID: &str = "_last_nudge_outbound_id";
/// Goal state.
pub const GOAL_ONLINE_HOURS: &str = "_goal_online_hours";
pub const GOAL_TRIP_COUNT: &str = "_goal_trip_count";
pub const GOAL_SET_AT: &str = "_goal_set_at";
/// Personal code echoed back once observed in conversation.
pub const PERSONAL_CODE: &str = "personal_code";
/// Variant-rotation memory: `{ "<bank>": <last index> }`.
pub const PHRASE_ROTATION: &str = "_phrase_rotation";
