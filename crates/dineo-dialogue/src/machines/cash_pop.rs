// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cash-rides enablement: ask for a proof of payment, attach it when it
//! arrives, and hand the ticket to Finance.

use chrono::Duration;
use dineo_context::{DriverContext, keys};
use dineo_core::DineoError;
use dineo_core::time::iso;
use dineo_core::types::{ConcernType, MessageKind};
use serde_json::json;

use super::{clear, enter, save_block, set_stage};
use crate::dispatcher::{Dispatcher, Turn};

const STAGE_AWAITING_POP: &str = "awaiting_pop";

pub async fn step(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
) -> Result<Option<String>, DineoError> {
    let concern = ConcernType::CashPop;
    let (ticket, mut blk, created) = enter(d, turn, ctx, concern).await?;

    if created {
        set_stage(&mut blk, STAGE_AWAITING_POP);
        save_block(ctx, concern, blk);
        let expires = turn.now + Duration::hours(d.config.pop_pending_ttl_hours);
        ctx.set(
            keys::POP_PENDING_CONFIRMATION,
            json!({"ticket_id": ticket.id, "expires_at": iso(expires)}),
        );
        return Ok(Some(
            "Great - to get cash rides switched on, Finance just needs your proof of \
             payment. Send me a photo or PDF of it here and I'll pass it straight on."
                .to_string(),
        ));
    }

    if let MessageKind::Media { url, .. } = turn.kind {
        if let Some(url) = url {
            d.tickets.append_media(ticket.id, url).await?;
        }
        d.tickets
            .update_metadata(
                ticket.id,
                &json!({
                    "shared_with_finance": true,
                    "closed": true,
                    "pop_received_at": iso(turn.now),
                }),
            )
            .await?;
        d.tickets
            .update_status(ticket.id, "pending_ops", None, Some("proof of payment received"))
            .await?;
        ctx.remove(keys::POP_PENDING_CONFIRMATION);
        clear(ctx, concern);
        return Ok(Some(
            "Got it, thank you! I've shared your proof of payment with Finance. The amount \
             will be allocated to your account once it's validated, and cash rides will be \
             switched on from there."
                .to_string(),
        ));
    }

    // Still waiting for the document.
    save_block(ctx, concern, blk);
    Ok(Some(
        "No rush - whenever you're ready, send the proof of payment as a photo or PDF and \
         I'll send it to Finance."
            .to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machines::{block, ticket_id};
    use crate::testutil::{dispatcher, turn};
    use dineo_core::types::Intent;
    use dineo_reply::banks;

    fn pop_image() -> MessageKind {
        MessageKind::Media {
            media_id: "m9".into(),
            url: Some("https://cdn.example/pop.jpg".into()),
            caption: None,
            mime_type: Some("image/jpeg".into()),
        }
    }

    #[tokio::test]
    async fn pop_image_attaches_and_closes_the_branch() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let open = MessageKind::Text("I've paid my balance".into());
        let reply = d
            .dispatch(&turn(&open, Intent::CashRides), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("proof of payment"), "{reply}");
        assert!(ctx.contains(keys::POP_PENDING_CONFIRMATION));
        let id = ticket_id(&block(&ctx, ConcernType::CashPop)).unwrap();

        // Image while awaiting POP classifies as cash-rides and attaches.
        let image = pop_image();
        let reply = d
            .dispatch(&turn(&image, Intent::CashRides), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("allocated"), "{reply}");

        let ticket = d.tickets.get(id).await.unwrap();
        assert_eq!(ticket.status, "pending_ops");
        assert_eq!(ticket.metadata["shared_with_finance"], true);
        assert_eq!(ticket.metadata["closed"], true);
        assert_eq!(ticket.media_urls, vec!["https://cdn.example/pop.jpg"]);
        assert!(!ctx.contains(keys::POP_PENDING_CONFIRMATION));
        assert!(!ctx.contains(ConcernType::CashPop.context_key()));

        // A second image no longer resolves to cash rides; nothing reopens.
        let second = pop_image();
        let reply = d
            .dispatch(&turn(&second, Intent::Unknown), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(banks::UNKNOWN_FALLBACKS.contains(&reply.as_str()));
        assert!(!ctx.contains(ConcernType::CashPop.context_key()));
    }

    #[tokio::test]
    async fn text_while_awaiting_pop_reminds() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let open = MessageKind::Text("please enable cash rides, I have paid".into());
        d.dispatch(&turn(&open, Intent::CashRides), &mut ctx)
            .await
            .unwrap();

        let later = MessageKind::Text("I'll send it tonight".into());
        let reply = d
            .dispatch(&turn(&later, Intent::CashRides), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("photo or PDF"), "{reply}");
        assert!(ctx.contains(keys::POP_PENDING_CONFIRMATION));
    }
}
