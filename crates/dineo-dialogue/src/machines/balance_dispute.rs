// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Balance disputes and finance follow-ups. Both run on finance tickets;
//! the follow-up variant only needs a callback time.

use dineo_context::{DriverContext, keys};
use dineo_core::DineoError;
use dineo_core::time::iso;
use dineo_core::types::ConcernType;
use serde_json::json;

use super::{clear, enter, save_block, set_stage, stage};
use crate::dispatcher::{Dispatcher, Turn, active_concern};

const STAGE_DETAILS: &str = "awaiting_details";
const STAGE_UPDATES: &str = "updates";
const STAGE_CONTACT_TIME: &str = "awaiting_contact_time";

pub async fn step(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
) -> Result<Option<String>, DineoError> {
    // The no-vehicle balance path parks a finance follow-up here.
    let concern = if active_concern(ctx) == Some(ConcernType::FinanceFollowup) {
        ConcernType::FinanceFollowup
    } else {
        ConcernType::BalanceDispute
    };
    let (ticket, mut blk, created) = enter(d, turn, ctx, concern).await?;

    if concern == ConcernType::FinanceFollowup {
        if stage(&blk) == STAGE_CONTACT_TIME && !turn.text().is_empty() {
            d.tickets
                .update_metadata(ticket.id, &json!({"callback_time": turn.text()}))
                .await?;
            d.tickets
                .update_status(ticket.id, "pending_ops", None, Some("callback time captured"))
                .await?;
            clear(ctx, concern);
            return Ok(Some(
                "Perfect - Finance will call you then. If the time stops working for you, \
                 just tell me."
                    .to_string(),
            ));
        }
        set_stage(&mut blk, STAGE_CONTACT_TIME);
        save_block(ctx, concern, blk);
        return Ok(Some(
            "When is a good time for Finance to call you about your balance?".to_string(),
        ));
    }

    if created {
        set_stage(&mut blk, STAGE_DETAILS);
        save_block(ctx, concern, blk);
        return Ok(Some(
            "Let's get that looked at properly. Send me your personal code and a short \
             note on what looks wrong, and I'll open it with Finance."
                .to_string(),
        ));
    }

    match stage(&blk) {
        STAGE_DETAILS => {
            let mut patch = json!({"details": turn.text()});
            if let Some(code) = extract_personal_code(turn.text()) {
                patch["personal_code"] = json!(code);
                ctx.set(keys::PERSONAL_CODE, code);
            }
            d.tickets.update_metadata(ticket.id, &patch).await?;
            d.tickets
                .update_status(ticket.id, "pending_ops", None, Some("dispute details captured"))
                .await?;
            set_stage(&mut blk, STAGE_UPDATES);
            save_block(ctx, concern, blk);
            Ok(Some(
                "Thanks - Finance will review your account and come back to you here. If \
                 you spot anything else, just message me."
                    .to_string(),
            ))
        }
        _ => {
            // Every later message patches the open ticket.
            d.tickets
                .update_metadata(
                    ticket.id,
                    &json!({"latest_update": turn.text(), "latest_update_at": iso(turn.now)}),
                )
                .await?;
            save_block(ctx, concern, blk);
            Ok(Some(
                "Noted - I've added that to your ticket for Finance.".to_string(),
            ))
        }
    }
}

/// A token that looks like a roster personal code: 4+ characters with at
/// least one digit, e.g. `DRV1234` or `88412`.
fn extract_personal_code(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .find(|token| token.len() >= 4 && token.len() <= 10 && token.chars().any(|c| c.is_ascii_digit()))
        .map(|token| token.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machines::{block, ticket_id};
    use crate::testutil::{dispatcher, turn};
    use dineo_core::types::{Intent, MessageKind};

    #[test]
    fn personal_code_extraction() {
        assert_eq!(extract_personal_code("my code is DRV1234"), Some("DRV1234".into()));
        assert_eq!(extract_personal_code("88412 - charged twice"), Some("88412".into()));
        assert_eq!(extract_personal_code("charged twice this week"), None);
    }

    #[tokio::test]
    async fn dispute_captures_code_then_patches_updates() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let open = MessageKind::Text("my balance is wrong, I was overcharged".into());
        let reply = d
            .dispatch(&turn(&open, Intent::BalanceDispute), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("personal code"), "{reply}");

        let id = ticket_id(&block(&ctx, ConcernType::BalanceDispute)).unwrap();
        let details = MessageKind::Text("DRV9931, I was charged twice for Monday".into());
        d.dispatch(&turn(&details, Intent::Unknown), &mut ctx)
            .await
            .unwrap();

        let ticket = d.tickets.get(id).await.unwrap();
        assert_eq!(ticket.status, "pending_ops");
        assert_eq!(ticket.metadata["personal_code"], "DRV9931");
        assert_eq!(ctx.get_str(keys::PERSONAL_CODE), Some("DRV9931"));

        // A later message lands on the same ticket.
        let more = MessageKind::Text("it also shows the wrong week".into());
        let reply = d
            .dispatch(&turn(&more, Intent::Unknown), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("added that"), "{reply}");
        let ticket = d.tickets.get(id).await.unwrap();
        assert!(ticket.metadata["latest_update"].as_str().unwrap().contains("wrong week"));
    }
}
