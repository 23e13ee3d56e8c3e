// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accident reporting: safety check, location, other-vehicle details,
//! wrap-up. The stage progression is a pure function of the case state.

use dineo_context::DriverContext;
use dineo_core::DineoError;
use dineo_core::types::{ConcernType, Intent, MessageKind};
use serde_json::json;

use super::{enter, save_block, set_stage, stage};
use crate::dispatcher::{Dispatcher, Turn};

const STAGE_SAFETY: &str = "safety";
const STAGE_LOCATION: &str = "location";
const STAGE_OTHER_VEHICLE: &str = "other_vehicle";
const STAGE_OTHER_VEHICLE_DETAILS: &str = "other_vehicle_details";
const STAGE_OTHER_DRIVER_DETAILS: &str = "other_driver_details";

/// The stage after `current`. `None` means the case is complete.
fn next_stage(current: &str, other_vehicle_involved: bool) -> Option<&'static str> {
    match current {
        "" => Some(STAGE_SAFETY),
        STAGE_SAFETY => Some(STAGE_LOCATION),
        STAGE_LOCATION => Some(STAGE_OTHER_VEHICLE),
        STAGE_OTHER_VEHICLE if other_vehicle_involved => Some(STAGE_OTHER_VEHICLE_DETAILS),
        STAGE_OTHER_VEHICLE_DETAILS => Some(STAGE_OTHER_DRIVER_DETAILS),
        _ => None,
    }
}

/// The question asked when entering a stage.
fn prompt_for(stage: &str) -> &'static str {
    match stage {
        STAGE_SAFETY => {
            "I'm really sorry to hear that. First things first - is anyone injured? If \
             anyone needs medical help, call 112 right away."
        }
        STAGE_LOCATION => {
            "Thank you. Please share a location pin of where you are so we can get someone \
             to you."
        }
        STAGE_OTHER_VEHICLE => "Got it. Was another vehicle involved? (yes/no)",
        STAGE_OTHER_VEHICLE_DETAILS => {
            "Please send the other vehicle's details: make, colour and registration number."
        }
        _ => "And the other driver's name and phone number, if you have them.",
    }
}

pub async fn step(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
) -> Result<Option<String>, DineoError> {
    let concern = ConcernType::Accident;
    let (ticket, mut block, created) = enter(d, turn, ctx, concern).await?;
    let current = if created { String::new() } else { stage(&block).to_string() };

    // Record the answer for the stage we're in.
    let mut other_vehicle_involved = false;
    match current.as_str() {
        "" => {}
        STAGE_SAFETY => {
            d.tickets
                .update_metadata(ticket.id, &json!({"injuries": turn.text()}))
                .await?;
        }
        STAGE_LOCATION => match turn.kind {
            MessageKind::Location(loc) => d.tickets.update_location(ticket.id, loc).await?,
            _ if !turn.text().is_empty() => {
                d.tickets
                    .update_metadata(ticket.id, &json!({"location_note": turn.text()}))
                    .await?;
            }
            _ => {
                save_block(ctx, concern, block);
                return Ok(Some(
                    "I still need your location - a pin works best, or type the street \
                     and suburb."
                        .to_string(),
                ));
            }
        },
        STAGE_OTHER_VEHICLE => {
            other_vehicle_involved = !says_no(turn);
            d.tickets
                .update_metadata(
                    ticket.id,
                    &json!({"other_vehicle_involved": other_vehicle_involved}),
                )
                .await?;
        }
        STAGE_OTHER_VEHICLE_DETAILS => {
            other_vehicle_involved = true;
            d.tickets
                .update_metadata(ticket.id, &json!({"other_vehicle_details": turn.text()}))
                .await?;
        }
        _ => {
            d.tickets
                .update_metadata(ticket.id, &json!({"other_driver_details": turn.text()}))
                .await?;
        }
    }

    match next_stage(&current, other_vehicle_involved) {
        Some(next) => {
            set_stage(&mut block, next);
            save_block(ctx, concern, block);
            Ok(Some(prompt_for(next).to_string()))
        }
        None => finish(d, ticket.id, ctx).await,
    }
}

/// Hand the case to ops and drop the concern from context.
async fn finish(
    d: &Dispatcher,
    ticket_id: i64,
    ctx: &mut DriverContext,
) -> Result<Option<String>, DineoError> {
    d.tickets
        .update_status(ticket_id, "pending_ops", None, Some("accident details collected"))
        .await?;
    super::clear(ctx, ConcernType::Accident);
    Ok(Some(
        "Thank you - I've logged everything and the team will call you shortly. Please \
         don't drive the car until it's been checked. Message me here if anything changes."
            .to_string(),
    ))
}

fn says_no(turn: &Turn<'_>) -> bool {
    if turn.intent == Intent::Negation {
        return true;
    }
    let lower = turn.text().to_lowercase();
    lower.starts_with("no") || lower.starts_with("nope") || lower.starts_with("just me")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machines::{block, ticket_id};
    use crate::testutil::{dispatcher, turn};
    use dineo_context::keys;
    use dineo_core::types::Location;

    #[test]
    fn stage_progression_is_pure() {
        assert_eq!(next_stage("", false), Some(STAGE_SAFETY));
        assert_eq!(next_stage(STAGE_SAFETY, false), Some(STAGE_LOCATION));
        assert_eq!(next_stage(STAGE_LOCATION, true), Some(STAGE_OTHER_VEHICLE));
        assert_eq!(
            next_stage(STAGE_OTHER_VEHICLE, true),
            Some(STAGE_OTHER_VEHICLE_DETAILS)
        );
        assert_eq!(next_stage(STAGE_OTHER_VEHICLE, false), None);
        assert_eq!(
            next_stage(STAGE_OTHER_VEHICLE_DETAILS, true),
            Some(STAGE_OTHER_DRIVER_DETAILS)
        );
        assert_eq!(next_stage(STAGE_OTHER_DRIVER_DETAILS, false), None);
    }

    #[tokio::test]
    async fn full_flow_without_other_vehicle() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let open = MessageKind::Text("I was in an accident".into());
        let reply = d
            .dispatch(&turn(&open, Intent::AccidentReport), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("injured"));
        assert!(reply.contains("112"));

        let fine = MessageKind::Text("everyone is fine".into());
        let reply = d
            .dispatch(&turn(&fine, Intent::Clarify), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("location pin"), "{reply}");

        let pin = MessageKind::Location(Location {
            lat: -26.2041,
            lng: 28.0473,
            name: None,
            address: None,
        });
        let id = ticket_id(&block(&ctx, ConcernType::Accident)).unwrap();
        let reply = d
            .dispatch(&turn(&pin, Intent::AccidentReport), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("another vehicle"), "{reply}");
        let ticket = d.tickets.get(id).await.unwrap();
        assert_eq!(ticket.location_lat, Some(-26.2041));

        let no = MessageKind::Text("no".into());
        let reply = d
            .dispatch(&turn(&no, Intent::Negation), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("team will call"), "{reply}");

        let ticket = d.tickets.get(id).await.unwrap();
        assert_eq!(ticket.status, "pending_ops");
        assert_eq!(ticket.metadata["injuries"], "everyone is fine");
        assert_eq!(ticket.metadata["other_vehicle_involved"], false);
        assert!(!ctx.contains(ConcernType::Accident.context_key()));
        assert!(!ctx.contains(keys::ACTIVE_CONCERN));
    }

    #[tokio::test]
    async fn other_vehicle_branch_collects_details() {
        let (d, _adapter, _dir) = dispatcher().await;
        let mut ctx = DriverContext::new();

        let open = MessageKind::Text("someone hit me at the robot".into());
        d.dispatch(&turn(&open, Intent::AccidentReport), &mut ctx)
            .await
            .unwrap();
        let fine = MessageKind::Text("no injuries".into());
        d.dispatch(&turn(&fine, Intent::Clarify), &mut ctx)
            .await
            .unwrap();
        let addr = MessageKind::Text("corner of Jan Smuts and 7th, Rosebank".into());
        d.dispatch(&turn(&addr, Intent::Unknown), &mut ctx)
            .await
            .unwrap();

        let yes = MessageKind::Text("yes".into());
        let reply = d
            .dispatch(&turn(&yes, Intent::Affirmation), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("registration"), "{reply}");

        let details = MessageKind::Text("white Corolla, ND 123-456".into());
        let reply = d
            .dispatch(&turn(&details, Intent::Unknown), &mut ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("name and phone"), "{reply}");

        let id = ticket_id(&block(&ctx, ConcernType::Accident)).unwrap();
        let driver_details = MessageKind::Text("Sipho, 0821112222".into());
        d.dispatch(&turn(&driver_details, Intent::Unknown), &mut ctx)
            .await
            .unwrap();

        let ticket = d.tickets.get(id).await.unwrap();
        assert_eq!(ticket.status, "pending_ops");
        assert_eq!(ticket.metadata["other_vehicle_details"], "white Corolla, ND 123-456");
        assert!(!ctx.contains(ConcernType::Accident.context_key()));
    }
}
