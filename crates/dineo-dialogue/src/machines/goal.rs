// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weekly goal commitment: disambiguate hours vs trips, enforce the
//! minimum commitment, and run the blocker-diagnosis detour when the
//! driver aims below it.

use dineo_context::{DriverContext, keys};
use dineo_core::DineoError;
use dineo_core::time::iso;
use dineo_core::types::Intent;
use dineo_intent::{normalize_text, parse_first_number};
use serde_json::json;

use crate::dispatcher::{Dispatcher, Turn};

/// Waiting for the blocker answer (time / fuel / demand / ...).
const BLOCKER_PENDING: &str = "_goal_blocker_pending";
/// A number we could not attribute to hours or trips yet.
const AMBIGUOUS_VALUE: &str = "_goal_ambiguous_value";
const PROPOSED_HOURS: &str = "_goal_proposed_hours";
const PROPOSED_TRIPS: &str = "_goal_proposed_trips";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Hours,
    Trips,
}

impl Unit {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "online_hours" => Some(Unit::Hours),
            "trip_count" => Some(Unit::Trips),
            _ => None,
        }
    }
}

/// True when any goal-dialogue marker is live, so free text routes here.
pub fn has_pending(ctx: &DriverContext) -> bool {
    ctx.contains(keys::PENDING_GOAL)
        || ctx.contains(keys::AWAITING_GOAL_CONFIRM)
        || ctx.contains(keys::AWAITING_TARGET_UPDATE)
        || ctx.get_bool(BLOCKER_PENDING).unwrap_or(false)
        || ctx.contains(AMBIGUOUS_VALUE)
}

pub async fn step(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
) -> Result<Option<String>, DineoError> {
    let text = normalize_text(turn.text()).to_lowercase();

    // Blocker answer first: any free text while the question is open.
    if ctx.get_bool(BLOCKER_PENDING).unwrap_or(false) && !text.is_empty() {
        ctx.remove(BLOCKER_PENDING);
        ctx.set(keys::AWAITING_TARGET_UPDATE, "online_hours");
        return Ok(Some(format!(
            "{} With that in mind, how many hours online feel doable this week?",
            recovery_plan(&text)
        )));
    }

    // "1 for hours, 2 for trips" disambiguation.
    if let Some(value) = ctx.get_f64(AMBIGUOUS_VALUE) {
        let unit = match turn.intent {
            Intent::Affirmation => Some(Unit::Hours),
            Intent::Negation => Some(Unit::Trips),
            _ => None,
        };
        if let Some(unit) = unit {
            ctx.remove(AMBIGUOUS_VALUE);
            return handle_number(d, ctx, value, unit, false).map(Some);
        }
    }

    // Yes/no on the proposed pair.
    if let Some(confirm) = ctx.get_object(keys::AWAITING_GOAL_CONFIRM).cloned() {
        match turn.intent {
            Intent::Affirmation => {
                let hours = confirm.get("online_hours").and_then(|v| v.as_f64()).unwrap_or(0.0);
                let trips = confirm.get("trip_count").and_then(|v| v.as_i64()).unwrap_or(0);
                ctx.remove(keys::AWAITING_GOAL_CONFIRM);
                ctx.remove(PROPOSED_HOURS);
                ctx.remove(PROPOSED_TRIPS);
                ctx.set(keys::GOAL_ONLINE_HOURS, hours);
                ctx.set(keys::GOAL_TRIP_COUNT, trips);
                ctx.set(keys::GOAL_SET_AT, iso(turn.now));
                return Ok(Some(format!(
                    "Locked in: {:.0} hours online and {} trips this week. I'll check in \
                     along the way and help you stay on track.",
                    hours, trips
                )));
            }
            Intent::Negation => {
                ctx.remove(keys::AWAITING_GOAL_CONFIRM);
                ctx.remove(PROPOSED_HOURS);
                ctx.remove(PROPOSED_TRIPS);
                ctx.set(keys::PENDING_GOAL, "online_hours");
                return Ok(Some(
                    "No problem, let's adjust. How many hours online would you rather aim \
                     for this week?"
                        .to_string(),
                ));
            }
            _ => {}
        }
    }

    // Numeric answer, with the unit from the text or the open question.
    if let Some(value) = parse_first_number(&text) {
        let lenient = ctx.contains(keys::AWAITING_TARGET_UPDATE);
        let unit = unit_from_text(&text)
            .or_else(|| {
                ctx.get_str(keys::AWAITING_TARGET_UPDATE)
                    .and_then(Unit::from_key)
            })
            .or_else(|| ctx.get_str(keys::PENDING_GOAL).and_then(Unit::from_key));
        return match unit {
            Some(unit) => handle_number(d, ctx, value, unit, lenient).map(Some),
            None => {
                ctx.set(AMBIGUOUS_VALUE, value);
                Ok(Some(format!(
                    "Quick check - is that {0:.0} hours online or {0:.0} trips? Reply 1 \
                     for hours or 2 for trips.",
                    value
                )))
            }
        };
    }

    // No number yet: open the dialogue.
    ctx.set(keys::PENDING_GOAL, "online_hours");
    Ok(Some(format!(
        "Let's set your goal for the week. Drivers who make it work aim for at least {} \
         hours online and {} trips. How many hours online can you commit to?",
        d.config.min_hours(),
        d.config.min_trips()
    )))
}

/// Apply one numeric answer. `lenient` accepts below-minimum values, used
/// after the blocker detour so the driver is never asked twice.
fn handle_number(
    d: &Dispatcher,
    ctx: &mut DriverContext,
    value: f64,
    unit: Unit,
    lenient: bool,
) -> Result<String, DineoError> {
    ctx.remove(keys::PENDING_GOAL);
    ctx.remove(keys::AWAITING_TARGET_UPDATE);

    let below = match unit {
        Unit::Hours => value < d.config.min_hours() as f64,
        Unit::Trips => (value as i64) < d.config.min_trips(),
    };
    if below && !lenient {
        ctx.set(BLOCKER_PENDING, true);
        let unit_word = match unit {
            Unit::Hours => "hours",
            Unit::Trips => "trips",
        };
        return Ok(format!(
            "Thanks for being honest - {:.0} {} is a tough base to earn from. To make the \
             week work we're aiming for at least {} hours and {} trips this week. What's \
             making it hard to get there: time, fuel, demand, distance, safety, or the app?",
            value,
            unit_word,
            d.config.min_hours(),
            d.config.min_trips()
        ));
    }

    match unit {
        Unit::Hours => ctx.set(PROPOSED_HOURS, value),
        Unit::Trips => ctx.set(PROPOSED_TRIPS, value as i64),
    }

    let hours = ctx.get_f64(PROPOSED_HOURS);
    let trips = ctx.get_i64(PROPOSED_TRIPS);
    match (hours, trips) {
        (Some(hours), Some(trips)) => {
            ctx.set(
                keys::AWAITING_GOAL_CONFIRM,
                json!({"online_hours": hours, "trip_count": trips}),
            );
            Ok(format!(
                "So that's {:.0} hours online and {} trips this week - shall I lock that \
                 in? (yes/no)",
                hours, trips
            ))
        }
        (Some(hours), None) => {
            ctx.set(keys::PENDING_GOAL, "trip_count");
            Ok(format!(
                "Nice - {:.0} hours it is. And how many trips are you aiming to finish?",
                hours
            ))
        }
        (None, Some(trips)) => {
            ctx.set(keys::PENDING_GOAL, "online_hours");
            Ok(format!(
                "{} trips, got it. And how many hours online will you put in to get there?",
                trips
            ))
        }
        (None, None) => {
            // Unreachable in practice; re-open the dialogue.
            ctx.set(keys::PENDING_GOAL, "online_hours");
            Ok("How many hours online can you commit to this week?".to_string())
        }
    }
}

fn unit_from_text(text: &str) -> Option<Unit> {
    let has = |words: &[&str]| {
        text.split(|c: char| !c.is_alphanumeric())
            .any(|w| words.contains(&w))
    };
    if has(&["hour", "hours", "hrs", "hr"]) {
        Some(Unit::Hours)
    } else if has(&["trip", "trips", "rides", "orders"]) {
        Some(Unit::Trips)
    } else {
        None
    }
}

/// One concrete suggestion per blocker family.
fn recovery_plan(text: &str) -> &'static str {
    if text.contains("time") || text.contains("busy") || text.contains("family") {
        "If time is tight, work the morning and evening peaks - two focused blocks beat \
         one long idle day."
    } else if text.contains("fuel") || text.contains("petrol") {
        "To stretch fuel, stay inside one busy area instead of roaming - shorter pickups \
         mean less dead mileage."
    } else if text.contains("demand") || text.contains("quiet") || text.contains("requests") {
        "When it's quiet where you are, ask me where it's busy - positioning before the \
         peaks makes the biggest difference."
    } else if text.contains("distance") || text.contains("far") {
        "Try starting in the busy area closest to home - less empty driving on both ends \
         of your day."
    } else if text.contains("safety") || text.contains("safe") || text.contains("night") {
        "Your safety comes first - stick to daylight hours and well-lit areas; steady \
         days still add up."
    } else if text.contains("app") || text.contains("phone") {
        "Let's log that app problem so it stops costing you hours - in the meantime a \
         phone restart clears most glitches."
    } else {
        "Thanks for telling me - I've made a note of it for the team."
    }
}
