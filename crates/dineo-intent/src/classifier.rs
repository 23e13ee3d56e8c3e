// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Priority-ordered rule classification.
//!
//! The stages run in a fixed order: opt-out gate, pending-prompt grammars,
//! whole-message control tokens, concern keywords, KPI families,
//! transactional matchers, then the clarify/unknown fallback. Media and
//! location messages resolve through the active concern before any text
//! matching.

use std::str::FromStr;

use dineo_context::{DriverContext, keys};
use dineo_core::types::{ConcernType, Intent, MessageKind};
use tracing::debug;

use crate::normalize::{is_bare_number, normalize_text};

/// Whole-message greeting tokens.
const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "howzit", "good morning", "good afternoon", "good evening",
    "morning", "afternoon", "evening", "molo", "sawubona", "dumela", "hi dineo", "hello dineo",
];

const AFFIRMATIONS: &[&str] = &[
    "yes", "yes please", "yeah", "yep", "yebo", "sure", "ok", "okay", "correct", "go ahead",
    "please do", "that's right", "confirm", "confirmed", "1",
];

const NEGATIONS: &[&str] = &[
    "no", "nope", "nah", "not yet", "no thanks", "never mind", "cancel", "2",
];

const ACKNOWLEDGEMENTS: &[&str] = &[
    "thanks", "thank you", "got it", "noted", "sharp", "will do", "on it", "ok thanks",
    "okay thanks", "going online now", "on my way", "understood", "cool",
];

const RESOLUTION_PHRASES: &[&str] = &[
    "sorted", "all sorted", "fixed", "it's fixed", "resolved", "problem solved", "working now",
    "it's working now", "got the car back", "car is back",
];

const OPT_OUT_PHRASES: &[&str] = &["stop", "unsubscribe", "opt out", "no more messages", "leave me alone"];
const OPT_IN_PHRASES: &[&str] = &["start", "opt in", "subscribe", "start again", "resume messages"];

/// `(keyword-set, intent)` pairs tested in order; earlier entries win, so
/// accident outranks car-problem and balance-dispute outranks the generic
/// account inquiry.
const CONCERN_KEYWORDS: &[(&[&str], Intent)] = &[
    (
        &["accident", "crash", "crashed", "collision", "hit another car", "someone hit me"],
        Intent::AccidentReport,
    ),
    (
        &["repossess", "repossessed", "repo ", "took my car", "car was taken", "they took the car"],
        Intent::VehicleRepossession,
    ),
    (
        &["sick", "doctor", "hospital", "clinic", "medical", "not feeling well", "unwell", "injured"],
        Intent::MedicalPause,
    ),
    (
        &["no car", "no vehicle", "without a car", "don't have a car", "dont have a car",
          "waiting for a car", "gave the car back", "need a car"],
        Intent::NoVehicle,
    ),
    (
        &["broke down", "breakdown", "won't start", "wont start", "car problem", "flat tyre",
          "puncture", "overheating", "warning light", "battery is dead", "engine"],
        Intent::CarProblem,
    ),
    (
        &["cash rides", "cash trips", "enable cash", "paid my balance", "i've paid", "i have paid",
          "proof of payment", "pop ", "made the payment", "payment made"],
        Intent::CashRides,
    ),
    (
        &["wrong balance", "balance is wrong", "incorrect balance", "dispute", "overcharged",
          "charged twice", "billing error"],
        Intent::BalanceDispute,
    ),
    (
        &["no requests", "no rides", "no trips coming", "low demand", "very quiet", "so quiet",
          "dead today", "nothing is coming"],
        Intent::LowDemand,
    ),
    (
        &["suspended", "suspension", "deactivated", "banned", "account blocked", "blocked my account"],
        Intent::AccountSuspension,
    ),
    (
        &["app not working", "app issue", "app keeps", "app crash", "can't go online",
          "cannot go online", "can't log in", "cannot log in", "login problem", "app is frozen"],
        Intent::AppIssue,
    ),
    (
        &["branding", "sticker", "decal", "branded car", "branding bonus"],
        Intent::BrandingBonus,
    ),
];

const KPI_KEYWORDS: &[(&[&str], Intent)] = &[
    (
        &["how am i doing", "my performance", "performance summary", "my stats", "my numbers",
          "weekly summary"],
        Intent::PerformanceSummary,
    ),
    (
        &["progress", "how far am i", "am i on track"],
        Intent::ProgressUpdate,
    ),
    (
        &["target for today", "daily target", "today's target", "what should i aim"],
        Intent::DailyTarget,
    ),
    (&["acceptance"], Intent::AcceptanceRate),
    (
        &["per hour", "hourly rate", "earnings per hour", "rand per hour", "rands per hour"],
        Intent::EarningsPerHour,
    ),
    (
        &["how many trips", "trip count", "trips did i", "trips have i", "number of trips"],
        Intent::TripCount,
    ),
    (
        &["where is busy", "where is it busy", "hotspot", "busy area", "busy areas",
          "where should i go", "where are the rides"],
        Intent::HotspotSummary,
    ),
    (
        &["top driver", "top drivers", "how do the best", "tips to earn", "advice to earn"],
        Intent::TopDriverTips,
    ),
];

const TRANSACTIONAL_KEYWORDS: &[(&[&str], Intent)] = &[
    (
        &["balance", "statement", "what do i owe", "how much do i owe", "my account",
          "account balance"],
        Intent::AccountInquiry,
    ),
    (
        &["what time", "what day", "what date", "today's date", "what is the date"],
        Intent::CurrentDateTime,
    ),
    (
        &["who are you", "your name", "are you a bot", "are you human", "what are you"],
        Intent::Identity,
    ),
    (
        &["how are you", "what's up", "whats up", "how's it going", "hows it going"],
        Intent::Smalltalk,
    ),
];

/// Goal phrasing that names a unit, e.g. "55 hours" or "120 trips".
const GOAL_UNIT_WORDS: &[&str] = &["hour", "hours", "hrs", "trip", "trips", "rides"];

/// Stateless rule classifier. All conversation state comes in via the
/// driver's context.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify one inbound message against the driver's context.
    pub fn classify(&self, kind: &MessageKind, ctx: &DriverContext) -> Intent {
        let intent = self.classify_inner(kind, ctx);
        debug!(%intent, "classified");
        intent
    }

    fn classify_inner(&self, kind: &MessageKind, ctx: &DriverContext) -> Intent {
        // Non-text payloads resolve through context before any matching.
        match kind {
            MessageKind::Audio { transcript: None, .. } => return Intent::VoiceUnavailable,
            MessageKind::Location(_) => {
                return active_concern_intent(ctx).unwrap_or(Intent::Unknown);
            }
            MessageKind::Media { caption, .. } => {
                if ctx.contains(keys::POP_PENDING_CONFIRMATION) {
                    return Intent::CashRides;
                }
                if let Some(intent) = active_concern_intent(ctx) {
                    return intent;
                }
                if caption.is_none() {
                    return Intent::Unknown;
                }
            }
            _ => {}
        }

        let Some(raw) = kind.text() else {
            return Intent::Unknown;
        };
        let text = normalize_text(raw);
        let lower = text.to_lowercase();
        if lower.is_empty() {
            return Intent::Unknown;
        }

        // Stage 1: global opt-out gate.
        if ctx.opted_out() {
            return if matches_any_exact(&lower, OPT_IN_PHRASES) {
                Intent::OptIn
            } else {
                Intent::OptOut
            };
        }
        if matches_any_exact(&lower, OPT_OUT_PHRASES) {
            return Intent::OptOut;
        }
        if matches_any_exact(&lower, OPT_IN_PHRASES) {
            return Intent::OptIn;
        }

        // Stage 2: pending-prompt grammars.
        if let Some(intent) = self.pending_prompt_intent(&lower, ctx) {
            return intent;
        }

        // Stage 3: whole-message control tokens.
        if matches_any_exact(&lower, GREETINGS) {
            return Intent::Greeting;
        }
        if matches_any_exact(&lower, RESOLUTION_PHRASES) {
            return Intent::ResolutionConfirmed;
        }
        if matches_any_exact(&lower, AFFIRMATIONS) {
            return Intent::Affirmation;
        }
        if matches_any_exact(&lower, NEGATIONS) {
            return Intent::Negation;
        }
        if matches_any_exact(&lower, ACKNOWLEDGEMENTS) {
            return Intent::Acknowledgement;
        }

        // Goal phrasing with an explicit unit ("20 hours", "110 trips").
        if crate::normalize::parse_first_number(&lower).is_some()
            && GOAL_UNIT_WORDS.iter().any(|u| contains_word(&lower, u))
            && lower.split_whitespace().count() <= 6
        {
            return Intent::GoalCommitment;
        }

        // Stage 4: concern keywords.
        for (keywords, intent) in CONCERN_KEYWORDS {
            if keywords.iter().any(|k| lower.contains(k)) {
                return *intent;
            }
        }

        // Stage 5: KPI families.
        for (keywords, intent) in KPI_KEYWORDS {
            if keywords.iter().any(|k| lower.contains(k)) {
                return *intent;
            }
        }

        // Stage 6: transactional.
        for (keywords, intent) in TRANSACTIONAL_KEYWORDS {
            if keywords.iter().any(|k| lower.contains(k)) {
                return *intent;
            }
        }

        // Stage 7: fallback.
        if lower.contains('?') || lower.split_whitespace().count() <= 3 {
            Intent::Clarify
        } else {
            Intent::Unknown
        }
    }

    /// Narrow grammars for active prompts: a bare number answers the goal
    /// question without re-asking the unit.
    fn pending_prompt_intent(&self, lower: &str, ctx: &DriverContext) -> Option<Intent> {
        if ctx.contains(keys::AWAITING_TARGET_UPDATE)
            && (is_bare_number(lower) || crate::normalize::parse_first_number(lower).is_some())
        {
            return Some(Intent::TargetUpdate);
        }
        if ctx.contains(keys::PENDING_GOAL) && is_bare_number(lower) {
            return Some(Intent::GoalCommitment);
        }
        if ctx.contains(keys::AWAITING_GOAL_CONFIRM) || ctx.contains(keys::PENDING_INTENT) {
            if matches_any_exact(lower, AFFIRMATIONS) {
                return Some(Intent::Affirmation);
            }
            if matches_any_exact(lower, NEGATIONS) {
                return Some(Intent::Negation);
            }
        }
        None
    }
}

/// The intent a media/location message inherits from the active concern.
fn active_concern_intent(ctx: &DriverContext) -> Option<Intent> {
    let concern = ctx
        .get_object(keys::ACTIVE_CONCERN)
        .and_then(|obj| obj.get("type"))
        .and_then(|v| v.as_str())?;
    let concern = ConcernType::from_str(concern).ok()?;
    Some(intent_for_concern(concern))
}

/// Reverse of [`Intent::concern`].
pub fn intent_for_concern(concern: ConcernType) -> Intent {
    match concern {
        ConcernType::Medical => Intent::MedicalPause,
        ConcernType::NoVehicle => Intent::NoVehicle,
        ConcernType::Repossession => Intent::VehicleRepossession,
        ConcernType::Accident => Intent::AccidentReport,
        ConcernType::CarProblem => Intent::CarProblem,
        ConcernType::CashPop => Intent::CashRides,
        ConcernType::BalanceDispute => Intent::BalanceDispute,
        ConcernType::LowDemand => Intent::LowDemand,
        ConcernType::AccountSuspension => Intent::AccountSuspension,
        ConcernType::AppIssue => Intent::AppIssue,
        ConcernType::BrandingBonus => Intent::BrandingBonus,
        ConcernType::FinanceFollowup => Intent::BalanceDispute,
    }
}

fn matches_any_exact(lower: &str, set: &[&str]) -> bool {
    let stripped = lower.trim_end_matches(['.', '!', '?', ',']).trim();
    set.contains(&stripped)
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> MessageKind {
        MessageKind::Text(s.into())
    }

    fn classify(s: &str, ctx: &DriverContext) -> Intent {
        IntentClassifier::new().classify(&text(s), ctx)
    }

    #[test]
    fn greeting_and_transactional() {
        let ctx = DriverContext::new();
        assert_eq!(classify("Hi", &ctx), Intent::Greeting);
        assert_eq!(classify("good morning!", &ctx), Intent::Greeting);
        assert_eq!(classify("what is my balance", &ctx), Intent::AccountInquiry);
        assert_eq!(classify("what time is it?", &ctx), Intent::CurrentDateTime);
        assert_eq!(classify("who are you", &ctx), Intent::Identity);
    }

    #[test]
    fn concern_priority_accident_beats_car_problem() {
        let ctx = DriverContext::new();
        assert_eq!(
            classify("I was in an accident, the car broke down", &ctx),
            Intent::AccidentReport
        );
        assert_eq!(classify("my car broke down on the N1", &ctx), Intent::CarProblem);
        assert_eq!(
            classify("the balance is wrong on my statement", &ctx),
            Intent::BalanceDispute
        );
        assert_eq!(classify("I've paid my balance", &ctx), Intent::CashRides);
    }

    #[test]
    fn kpi_family() {
        let ctx = DriverContext::new();
        assert_eq!(classify("how am I doing this week", &ctx), Intent::PerformanceSummary);
        assert_eq!(classify("what's my acceptance rate", &ctx), Intent::AcceptanceRate);
        assert_eq!(classify("where is it busy right now", &ctx), Intent::HotspotSummary);
    }

    #[test]
    fn opt_out_gate_short_circuits() {
        let mut ctx = DriverContext::new();
        ctx.set(keys::GLOBAL_OPT_OUT, true);
        assert_eq!(classify("how am I doing", &ctx), Intent::OptOut);
        assert_eq!(classify("start", &ctx), Intent::OptIn);
    }

    #[test]
    fn bare_number_resolves_pending_goal() {
        let mut ctx = DriverContext::new();
        ctx.set(keys::PENDING_GOAL, "online_hours");
        assert_eq!(classify("25", &ctx), Intent::GoalCommitment);
        // Without the pending flag a bare number is just unclear.
        assert_eq!(classify("25", &DriverContext::new()), Intent::Clarify);
    }

    #[test]
    fn goal_with_unit_is_commitment_anywhere() {
        let ctx = DriverContext::new();
        assert_eq!(classify("20 hours", &ctx), Intent::GoalCommitment);
        assert_eq!(classify("110 trips this week", &ctx), Intent::GoalCommitment);
    }

    #[test]
    fn confirmation_grammar_when_gate_pending() {
        let mut ctx = DriverContext::new();
        ctx.set(keys::PENDING_INTENT, json!({"intent": "car_problem"}));
        assert_eq!(classify("yes", &ctx), Intent::Affirmation);
        assert_eq!(classify("2", &ctx), Intent::Negation);
    }

    #[test]
    fn resolution_phrases_do_not_close_implicitly() {
        let ctx = DriverContext::new();
        assert_eq!(classify("sorted", &ctx), Intent::ResolutionConfirmed);
        assert_eq!(classify("thanks", &ctx), Intent::Acknowledgement);
    }

    #[test]
    fn media_inherits_active_concern() {
        let mut ctx = DriverContext::new();
        ctx.set(keys::ACTIVE_CONCERN, json!({"type": "car_problem"}));
        let media = MessageKind::Media {
            media_id: "m1".into(),
            url: None,
            caption: None,
            mime_type: Some("image/jpeg".into()),
        };
        assert_eq!(IntentClassifier::new().classify(&media, &ctx), Intent::CarProblem);
    }

    #[test]
    fn pop_pending_wins_over_active_concern_for_media() {
        let mut ctx = DriverContext::new();
        ctx.set(keys::ACTIVE_CONCERN, json!({"type": "cash_pop"}));
        ctx.set(keys::POP_PENDING_CONFIRMATION, true);
        let media = MessageKind::Media {
            media_id: "m1".into(),
            url: None,
            caption: None,
            mime_type: Some("application/pdf".into()),
        };
        assert_eq!(IntentClassifier::new().classify(&media, &ctx), Intent::CashRides);
    }

    #[test]
    fn failed_voice_note_is_flagged() {
        let audio = MessageKind::Audio {
            media_id: "a1".into(),
            transcript: None,
        };
        assert_eq!(
            IntentClassifier::new().classify(&audio, &DriverContext::new()),
            Intent::VoiceUnavailable
        );
    }

    #[test]
    fn location_without_concern_is_unknown() {
        let loc = MessageKind::Location(dineo_core::types::Location {
            lat: -26.1,
            lng: 28.05,
            name: None,
            address: None,
        });
        assert_eq!(
            IntentClassifier::new().classify(&loc, &DriverContext::new()),
            Intent::Unknown
        );
    }

    #[test]
    fn fallback_split() {
        let ctx = DriverContext::new();
        assert_eq!(classify("can you maybe", &ctx), Intent::Clarify);
        assert_eq!(
            classify("the weather in durban was lovely last weekend honestly", &ctx),
            Intent::Unknown
        );
    }
}
