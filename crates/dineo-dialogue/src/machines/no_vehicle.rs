// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! No-vehicle: classify the reason, branch to finance or workshop slots,
//! and schedule the 24-hour check-in on the ticket.

use chrono::Duration;
use dineo_context::{DriverContext, keys};
use dineo_core::DineoError;
use dineo_core::time::iso;
use dineo_core::types::ConcernType;
use serde_json::json;

use super::{clear, enter, save_block, set_stage, stage};
use crate::dispatcher::{Dispatcher, Turn};

const STAGE_REASON: &str = "awaiting_reason";
const STAGE_WORKSHOP: &str = "awaiting_workshop";

/// The reason families ops reporting groups by.
fn classify_reason(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if any(&["workshop", "mechanic", "service", "repair", "being fixed", "panel beater"]) {
        "workshop"
    } else if any(&["replacement", "new car", "swap", "waiting for a car", "waiting for the car"]) {
        "replacement"
    } else if any(&["balance", "owe", "arrears", "behind on", "payment", "money"]) {
        "balance"
    } else if any(&["blocked", "suspended", "deactivated"]) {
        "blocked"
    } else if any(&["sick", "doctor", "hospital", "medical"]) {
        "medical"
    } else {
        "other"
    }
}

pub async fn step(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
) -> Result<Option<String>, DineoError> {
    let concern = ConcernType::NoVehicle;
    let (ticket, mut blk, created) = enter(d, turn, ctx, concern).await?;

    if created {
        set_stage(&mut blk, STAGE_REASON);
        save_block(ctx, concern, blk);
        return Ok(Some(
            "Sorry to hear you're off the road. What happened - is the car in the \
             workshop, are you waiting for a replacement, or is it about your balance?"
                .to_string(),
        ));
    }

    match stage(&blk) {
        STAGE_REASON => {
            let reason = classify_reason(turn.text());
            let checkin_due = iso(turn.now + Duration::hours(d.config.no_vehicle_checkin_delay_hours));
            d.tickets
                .update_metadata(
                    ticket.id,
                    &json!({
                        "reason": reason,
                        "reason_note": turn.text(),
                        "reason_logged_at": iso(turn.now),
                        "checkin_due_at": checkin_due,
                    }),
                )
                .await?;

            match reason {
                "workshop" => {
                    set_stage(&mut blk, STAGE_WORKSHOP);
                    save_block(ctx, concern, blk);
                    Ok(Some(
                        "Which workshop is it at, and did they give you an idea of when \
                         it'll be ready?"
                            .to_string(),
                    ))
                }
                "balance" => {
                    d.tickets
                        .update_status(ticket.id, "pending_ops", None, Some("balance reason"))
                        .await?;
                    clear(ctx, concern);
                    // Hand over to a finance follow-up with its own ticket.
                    let (finance, _) = d
                        .tickets
                        .open_or_reuse(turn.wa_id, ConcernType::FinanceFollowup, Some(turn.text()))
                        .await?;
                    let mut finance_blk = serde_json::Map::new();
                    finance_blk.insert("ticket_id".into(), json!(finance.id));
                    set_stage(&mut finance_blk, "awaiting_contact_time");
                    save_block(ctx, ConcernType::FinanceFollowup, finance_blk);
                    ctx.set(
                        keys::ACTIVE_CONCERN,
                        json!({
                            "type": ConcernType::FinanceFollowup.to_string(),
                            "opened_at": iso(turn.now),
                            "message": turn.text(),
                        }),
                    );
                    Ok(Some(
                        "I understand - let me get Finance to call you so you can sort the \
                         balance out together. When is a good time to reach you?"
                            .to_string(),
                    ))
                }
                _ => {
                    d.tickets
                        .update_status(ticket.id, "pending_ops", None, Some("reason logged"))
                        .await?;
                    clear(ctx, concern);
                    Ok(Some(
                        "Thanks for letting me know - I've flagged it with the team. I'll \
                         check in with you tomorrow to see if you're back on the road."
                            .to_string(),
                    ))
                }
            }
        }
        STAGE_WORKSHOP => {
            d.tickets
                .update_metadata(ticket.id, &json!({"workshop_details": turn.text()}))
                .await?;
            d.tickets
                .update_status(ticket.id, "pending_ops", None, Some("workshop details logged"))
                .await?;
            clear(ctx, concern);
            Ok(Some(
                "Thanks. I'll check in with you tomorrow - and reply 'got the car back' \
                 the moment you're back on the road."
                    .to_string(),
            ))
        }
        _ => {
            set_stage(&mut blk, STAGE_REASON);
            save_block(ctx, concern, blk);
            Ok(Some(
                "What's keeping you off the road - workshop, replacement, or your balance?"
                    .to_string(),
            ))
        }
    }
}
