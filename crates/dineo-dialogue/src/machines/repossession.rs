// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vehicle repossession: capture the reason, flag management.

use dineo_context::DriverContext;
use dineo_core::DineoError;
use dineo_core::types::ConcernType;
use serde_json::json;

use super::{clear, enter, save_block, set_stage, stage};
use crate::dispatcher::{Dispatcher, Turn};

const STAGE_REASON: &str = "awaiting_reason";

fn classify_reason(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let outstanding = ["balance", "outstanding", "owe", "money", "payment", "arrears"]
        .iter()
        .any(|w| lower.contains(w));
    let behavior = ["behaviour", "behavior", "driving", "rating", "complaint", "speeding"]
        .iter()
        .any(|w| lower.contains(w));
    match (outstanding, behavior) {
        (true, true) => "both",
        (true, false) => "outstanding",
        (false, true) => "behavior",
        (false, false) => {
            if lower.contains("both") {
                "both"
            } else {
                "unclear"
            }
        }
    }
}

pub async fn step(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
) -> Result<Option<String>, DineoError> {
    let concern = ConcernType::Repossession;
    let (ticket, mut blk, created) = enter(d, turn, ctx, concern).await?;

    if created {
        set_stage(&mut blk, STAGE_REASON);
        save_block(ctx, concern, blk);
        return Ok(Some(
            "I'm sorry to hear about the car. Can I ask - was it about the outstanding \
             balance, something about driving behaviour, or both?"
                .to_string(),
        ));
    }

    if stage(&blk) == STAGE_REASON {
        let reason = classify_reason(turn.text());
        d.tickets
            .update_metadata(
                ticket.id,
                &json!({"reason": reason, "reason_note": turn.text()}),
            )
            .await?;
        d.tickets
            .update_status(ticket.id, "pending_ops", None, Some("repossession reason logged"))
            .await?;
        clear(ctx, concern);
        return Ok(Some(
            "Thank you for being straight with me. I've flagged this with management - \
             they'll be in touch with you about the way forward."
                .to_string(),
        ));
    }

    save_block(ctx, concern, blk);
    Ok(Some(
        "Was the repossession about the outstanding balance, driving behaviour, or both?"
            .to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machines::{block, ticket_id};
    use crate::testutil::{dispatcher, turn};
    use dineo_core::types::{Intent, MessageKind};

    #[test]
    fn reason_classification() {
        assert_eq!(classify_reason("I was behind on the balance"), "outstanding");
        assert_eq!(classify_reason("they said my driving was bad"), "behavior");
        assert_eq!(classify_reason("the money I owe and my rating"), "both");
        assert_eq!(classify_reason("both"), "both");
        assert_eq!(classify_reason("no idea"), "unclear");
    }

    #[tokio::test]
    async fn reason_is_logged_and_flagged() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let open = MessageKind::Text("they took my car this morning".into());
        let reply = d
            .dispatch(&turn(&open, Intent::VehicleRepossession), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("outstanding"), "{reply}");
        let id = ticket_id(&block(&ctx, ConcernType::Repossession)).unwrap();

        let reason = MessageKind::Text("I fell behind on the payments".into());
        let reply = d
            .dispatch(&turn(&reason, Intent::Unknown), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("management"), "{reply}");

        let ticket = d.tickets.get(id).await.unwrap();
        assert_eq!(ticket.status, "pending_ops");
        assert_eq!(ticket.metadata["reason"], "outstanding");
        assert!(!ctx.contains(ConcernType::Repossession.context_key()));
    }
}
