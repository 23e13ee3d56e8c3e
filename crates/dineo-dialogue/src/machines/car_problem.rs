// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Car problems: collect one photo and one location, hand to ops, and close
//! only after an explicit yes.

use dineo_context::DriverContext;
use dineo_core::DineoError;
use dineo_core::types::{ConcernType, Intent, MessageKind};
use serde_json::json;

use super::{block, clear, enter, save_block, set_stage, stage, ticket_id};
use crate::dispatcher::{Dispatcher, Turn};

const STAGE_COLLECTING: &str = "collecting";
const STAGE_PENDING_OPS: &str = "pending_ops";
const STAGE_CONFIRM_CLOSE: &str = "confirm_close";

pub async fn step(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
) -> Result<Option<String>, DineoError> {
    let concern = ConcernType::CarProblem;

    // Resolution phrases and the close confirmation act on the existing
    // block without re-entering.
    let existing = block(ctx, concern);
    if let Some(id) = ticket_id(&existing) {
        if turn.intent == Intent::ResolutionConfirmed {
            let mut blk = existing;
            set_stage(&mut blk, STAGE_CONFIRM_CLOSE);
            save_block(ctx, concern, blk);
            return Ok(Some(
                "That's great news! Shall I close the ticket? (yes/no)".to_string(),
            ));
        }
        if stage(&existing) == STAGE_CONFIRM_CLOSE {
            if turn.intent == Intent::Affirmation {
                d.tickets
                    .update_status(id, "driver_confirmed_resolved", None, Some("driver confirmed"))
                    .await?;
                clear(ctx, concern);
                // The ticket service already messaged the driver on closure.
                return Ok(None);
            }
            if turn.intent == Intent::Negation {
                let mut blk = existing;
                set_stage(&mut blk, STAGE_PENDING_OPS);
                save_block(ctx, concern, blk);
                return Ok(Some(
                    "No problem, I'll keep the ticket open. Let me know once it's properly \
                     sorted."
                        .to_string(),
                ));
            }
        }
    }

    let (ticket, mut blk, created) = enter(d, turn, ctx, concern).await?;
    if created {
        set_stage(&mut blk, STAGE_COLLECTING);
        save_block(ctx, concern, blk);
        return Ok(Some(
            "Sorry to hear the car is giving trouble. Please send me a photo of the \
             problem and a location pin (or the street and suburb) so the team can help."
                .to_string(),
        ));
    }

    match turn.kind {
        MessageKind::Media { url, .. } => {
            if let Some(url) = url {
                d.tickets.append_media(ticket.id, url).await?;
            }
            d.tickets
                .update_metadata(ticket.id, &json!({"photos_received": true}))
                .await?;
            blk.insert("photo".into(), json!(true));
        }
        MessageKind::Location(loc) => {
            d.tickets.update_location(ticket.id, loc).await?;
            blk.insert("location".into(), json!(true));
        }
        _ if !turn.text().is_empty() => {
            // Free text doubles as a typed address once we have the photo.
            if blk.get("photo").and_then(|v| v.as_bool()).unwrap_or(false) {
                d.tickets
                    .update_metadata(ticket.id, &json!({"location_note": turn.text()}))
                    .await?;
                blk.insert("location".into(), json!(true));
            } else {
                d.tickets
                    .update_metadata(ticket.id, &json!({"problem_details": turn.text()}))
                    .await?;
            }
        }
        _ => {}
    }

    let has_photo = blk.get("photo").and_then(|v| v.as_bool()).unwrap_or(false);
    let has_location = blk.get("location").and_then(|v| v.as_bool()).unwrap_or(false);
    let reply = if has_photo && has_location {
        if stage(&blk) != STAGE_PENDING_OPS {
            d.tickets
                .update_status(ticket.id, "pending_ops", None, Some("photo and location received"))
                .await?;
            set_stage(&mut blk, STAGE_PENDING_OPS);
        }
        "Thanks, I've got the photo and the location. The team is on it - reply 'sorted' \
         here once the problem is fixed."
    } else if has_photo {
        "Got the photo, thanks. Now share a location pin or type the street and suburb."
    } else if has_location {
        "Got your location. Please also send a photo of the problem."
    } else {
        "Noted. Please send a photo of the problem and a location pin when you can."
    };
    save_block(ctx, concern, blk);
    Ok(Some(reply.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{dispatcher, turn};
    use dineo_core::types::Location;

    fn photo() -> MessageKind {
        MessageKind::Media {
            media_id: "m1".into(),
            url: Some("https://cdn.example/m1.jpg".into()),
            caption: None,
            mime_type: Some("image/jpeg".into()),
        }
    }

    #[tokio::test]
    async fn photo_and_location_move_ticket_to_pending_ops() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let open = MessageKind::Text("my car broke down this morning".into());
        let reply = d
            .dispatch(&turn(&open, Intent::CarProblem), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("photo"), "{reply}");

        let pic = photo();
        let reply = d
            .dispatch(&turn(&pic, Intent::CarProblem), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("location"), "{reply}");

        let pin = MessageKind::Location(Location {
            lat: -26.1,
            lng: 28.0,
            name: None,
            address: None,
        });
        let id = ticket_id(&block(&ctx, ConcernType::CarProblem)).unwrap();
        let reply = d
            .dispatch(&turn(&pin, Intent::CarProblem), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("sorted"), "{reply}");

        let ticket = d.tickets.get(id).await.unwrap();
        assert_eq!(ticket.status, "pending_ops");
        assert_eq!(ticket.media_urls, vec!["https://cdn.example/m1.jpg"]);
        assert_eq!(ticket.metadata["photos_received"], true);
    }

    #[tokio::test]
    async fn sorted_requires_explicit_yes_to_close() {
        let (d, adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let open = MessageKind::Text("flat tyre on the N1".into());
        d.dispatch(&turn(&open, Intent::CarProblem), &mut ctx)
            .await
            .unwrap();
        let id = ticket_id(&block(&ctx, ConcernType::CarProblem)).unwrap();

        let sorted = MessageKind::Text("sorted".into());
        let reply = d
            .dispatch(&turn(&sorted, Intent::ResolutionConfirmed), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("close the ticket"), "{reply}");
        // Not closed yet.
        assert!(!d.tickets.get(id).await.unwrap().is_closed());

        // "no" keeps it open.
        let no = MessageKind::Text("no".into());
        d.dispatch(&turn(&no, Intent::Negation), &mut ctx)
            .await
            .unwrap();
        assert!(!d.tickets.get(id).await.unwrap().is_closed());

        // "sorted" again, then "yes" closes and the service notifies.
        d.dispatch(&turn(&sorted, Intent::ResolutionConfirmed), &mut ctx)
            .await
            .unwrap();
        let yes = MessageKind::Text("yes".into());
        d.dispatch(&turn(&yes, Intent::Affirmation), &mut ctx)
            .await
            .unwrap();
        let ticket = d.tickets.get(id).await.unwrap();
        assert_eq!(ticket.status, "driver_confirmed_resolved");
        assert!(!ctx.contains(ConcernType::CarProblem.context_key()));
        assert_eq!(adapter.sent_texts().len(), 1);
    }
}
