// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Medical pause: decision, vehicle location, certificate, commitment.

use dineo_context::DriverContext;
use dineo_core::DineoError;
use dineo_core::types::{ConcernType, MessageKind};
use serde_json::json;

use super::{clear, enter, save_block, set_stage, stage};
use crate::dispatcher::{Dispatcher, Turn};

const STAGE_DECISION: &str = "awaiting_decision";
const STAGE_LOCATION: &str = "awaiting_location";
const STAGE_CERTIFICATE: &str = "awaiting_certificate";
const STAGE_COMMITMENT: &str = "awaiting_commitment";

pub async fn step(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
) -> Result<Option<String>, DineoError> {
    let concern = ConcernType::Medical;
    let (ticket, mut blk, created) = enter(d, turn, ctx, concern).await?;

    if created {
        set_stage(&mut blk, STAGE_DECISION);
        save_block(ctx, concern, blk);
        return Ok(Some(
            "Sorry to hear you're not well - health comes first. Are you able to keep \
             driving this week, or do you need to hand the car back while you recover?"
                .to_string(),
        ));
    }

    let reply = match stage(&blk) {
        STAGE_DECISION => {
            d.tickets
                .update_metadata(ticket.id, &json!({"decision": turn.text()}))
                .await?;
            set_stage(&mut blk, STAGE_LOCATION);
            "Thanks for letting me know. Where is the car right now? A location pin works \
             best, or just type the address."
        }
        STAGE_LOCATION => {
            match turn.kind {
                MessageKind::Location(loc) => d.tickets.update_location(ticket.id, loc).await?,
                _ => {
                    d.tickets
                        .update_metadata(ticket.id, &json!({"location_note": turn.text()}))
                        .await?;
                }
            }
            // Decision and location captured: ops can act from here.
            d.tickets
                .update_status(ticket.id, "pending_ops", None, Some("decision and location captured"))
                .await?;
            set_stage(&mut blk, STAGE_CERTIFICATE);
            "Got it, thank you. Please also send a photo of your medical certificate when \
             you have it."
        }
        STAGE_CERTIFICATE => match turn.kind {
            MessageKind::Media { url, .. } => {
                if let Some(url) = url {
                    d.tickets.append_media(ticket.id, url).await?;
                }
                d.tickets
                    .update_metadata(ticket.id, &json!({"certificate_received": true}))
                    .await?;
                set_stage(&mut blk, STAGE_COMMITMENT);
                "Thank you, that's the paperwork done. Once you're back on your feet, what \
                 feels doable for the rest of the week?"
            }
            _ => {
                "No problem - send the certificate photo whenever you can. The team has \
                 everything else they need."
            }
        },
        STAGE_COMMITMENT => {
            d.tickets
                .update_metadata(ticket.id, &json!({"weekly_commitment": turn.text()}))
                .await?;
            clear(ctx, concern);
            return Ok(Some(
                "That sounds sensible - rest up and come back strong. Everything is logged \
                 and the team knows you're off. Message me the moment you're back on the \
                 road."
                    .to_string(),
            ));
        }
        _ => {
            set_stage(&mut blk, STAGE_DECISION);
            "Are you able to keep driving this week, or do you need to hand the car back \
             while you recover?"
        }
    };

    save_block(ctx, concern, blk);
    Ok(Some(reply.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machines::{block, ticket_id};
    use crate::testutil::{dispatcher, turn};
    use dineo_core::types::{Intent, Location};

    #[tokio::test]
    async fn decision_and_location_move_to_pending_ops() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let open = MessageKind::Text("I'm sick and need to see a doctor".into());
        let reply = d
            .dispatch(&turn(&open, Intent::MedicalPause), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("hand the car back"), "{reply}");

        let decision = MessageKind::Text("I need to hand the car back for a week".into());
        let reply = d
            .dispatch(&turn(&decision, Intent::Unknown), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("location pin"), "{reply}");

        let id = ticket_id(&block(&ctx, ConcernType::Medical)).unwrap();
        let pin = MessageKind::Location(Location {
            lat: -26.19,
            lng: 28.03,
            name: Some("home".into()),
            address: None,
        });
        let reply = d
            .dispatch(&turn(&pin, Intent::MedicalPause), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("medical certificate"), "{reply}");

        let ticket = d.tickets.get(id).await.unwrap();
        assert_eq!(ticket.status, "pending_ops");
        assert!(ticket.metadata["decision"].as_str().unwrap().contains("hand the car back"));
    }

    #[tokio::test]
    async fn certificate_then_commitment_ends_the_dialogue() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let open = MessageKind::Text("not feeling well at all today".into());
        d.dispatch(&turn(&open, Intent::MedicalPause), &mut ctx)
            .await
            .unwrap();
        let decision = MessageKind::Text("I'll keep driving, just slower".into());
        d.dispatch(&turn(&decision, Intent::Unknown), &mut ctx)
            .await
            .unwrap();
        let addr = MessageKind::Text("14 Main Road, Soweto".into());
        d.dispatch(&turn(&addr, Intent::Unknown), &mut ctx)
            .await
            .unwrap();

        let id = ticket_id(&block(&ctx, ConcernType::Medical)).unwrap();
        let cert = MessageKind::Media {
            media_id: "c1".into(),
            url: Some("https://cdn.example/cert.jpg".into()),
            caption: None,
            mime_type: Some("image/jpeg".into()),
        };
        let reply = d
            .dispatch(&turn(&cert, Intent::MedicalPause), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("doable"), "{reply}");

        let commit = MessageKind::Text("I can do 30 hours once I'm better".into());
        d.dispatch(&turn(&commit, Intent::Unknown), &mut ctx)
            .await
            .unwrap();

        let ticket = d.tickets.get(id).await.unwrap();
        assert_eq!(ticket.metadata["certificate_received"], true);
        assert!(ticket.metadata["weekly_commitment"].as_str().unwrap().contains("30 hours"));
        assert!(!ctx.contains(ConcernType::Medical.context_key()));
    }
}
