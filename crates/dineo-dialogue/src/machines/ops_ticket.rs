// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suspension, app-issue and branding-bonus concerns share one shape:
//! open the ticket, capture whatever the driver sends, pass to ops.

use dineo_context::DriverContext;
use dineo_core::DineoError;
use dineo_core::types::{ConcernType, MessageKind};
use serde_json::json;

use super::{clear, enter, save_block, set_stage};
use crate::dispatcher::{Dispatcher, Turn};

const STAGE_COLLECTING: &str = "collecting";

fn entry_prompt(concern: ConcernType) -> &'static str {
    match concern {
        ConcernType::AccountSuspension => {
            "I'm sorry about that - let's get your account looked at. Send me a screenshot \
             of what you see in the app, plus anything you were told, and I'll get the \
             team to review it."
        }
        ConcernType::AppIssue => {
            "Let's get that sorted. Send me a screenshot of the error and tell me what you \
             were trying to do when it happened."
        }
        _ => {
            "Happy to help with the branding bonus. Send me a photo of the branding on \
             your car along with your registration number."
        }
    }
}

pub async fn step(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
    concern: ConcernType,
) -> Result<Option<String>, DineoError> {
    let (ticket, mut blk, created) = enter(d, turn, ctx, concern).await?;

    if created {
        set_stage(&mut blk, STAGE_COLLECTING);
        save_block(ctx, concern, blk);
        return Ok(Some(entry_prompt(concern).to_string()));
    }

    match turn.kind {
        MessageKind::Media { url, .. } => {
            if let Some(url) = url {
                d.tickets.append_media(ticket.id, url).await?;
            }
            d.tickets
                .update_metadata(ticket.id, &json!({"photos_received": true}))
                .await?;
        }
        _ => {
            d.tickets
                .update_metadata(ticket.id, &json!({"details": turn.text()}))
                .await?;
        }
    }
    d.tickets
        .update_status(ticket.id, "pending_ops", None, Some("details captured"))
        .await?;
    clear(ctx, concern);
    Ok(Some(
        "Got it - I've passed this to the team. They'll come back to you right here."
            .to_string(),
    ))
}
