// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low demand: everywhere vs one area, with a busy-suburb lookup for the
//! one-area answer.

use dineo_context::DriverContext;
use dineo_core::DineoError;
use dineo_core::time::day_bounds_iso;
use dineo_core::types::ConcernType;
use dineo_storage::queries::warehouse;
use serde_json::json;

use super::{clear, enter, save_block, set_stage, stage};
use crate::dispatcher::{Dispatcher, Turn};

const STAGE_SCOPE: &str = "awaiting_scope";

pub async fn step(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
) -> Result<Option<String>, DineoError> {
    let concern = ConcernType::LowDemand;
    let (ticket, mut blk, created) = enter(d, turn, ctx, concern).await?;

    if created {
        set_stage(&mut blk, STAGE_SCOPE);
        save_block(ctx, concern, blk);
        return Ok(Some(
            "That's frustrating - let's see what's going on. Is it quiet everywhere, or \
             just in the area you're working now? Tell me the suburb and I'll check what's \
             busy."
                .to_string(),
        ));
    }

    if stage(&blk) == STAGE_SCOPE {
        let text = turn.text().to_lowercase();
        let everywhere = ["everywhere", "all over", "whole city", "the whole"]
            .iter()
            .any(|w| text.contains(w));

        if everywhere {
            d.tickets
                .update_metadata(ticket.id, &json!({"scope": "everywhere"}))
                .await?;
            d.tickets
                .update_status(ticket.id, "pending_ops", None, Some("city-wide low demand"))
                .await?;
            clear(ctx, concern);
            return Ok(Some(
                "Thanks - I've flagged the slow day with the team. Stay online; I'll let \
                 you know the moment it picks up."
                    .to_string(),
            ));
        }

        d.tickets
            .update_metadata(ticket.id, &json!({"scope": "area", "area": turn.text()}))
            .await?;
        d.tickets
            .update_status(ticket.id, "pending_ops", None, Some("area noted"))
            .await?;
        clear(ctx, concern);

        let (day_start, day_end) = day_bounds_iso(turn.now.date_naive());

        // Check the named area first; only an area with no finished trips
        // falls back to the global busy list.
        let named =
            warehouse::busy_suburbs_matching(&d.db, turn.text(), &day_start, &day_end, 3).await?;
        if let Some((name, _)) = named.first() {
            let trips: i64 = named.iter().map(|(_, n)| n).sum();
            return Ok(Some(format!(
                "I checked {name}: {trips} trips finished there today, so orders are \
                 still coming through. Stay online and keep near the main roads."
            )));
        }

        let suburbs = warehouse::busy_suburbs(&d.db, &day_start, &day_end, 3).await?;
        if suburbs.is_empty() {
            return Ok(Some(
                "It looks quiet across the board right now, not just your area. Stay \
                 online and hang in there - I'll point you at the busy spots as soon as \
                 orders pick up."
                    .to_string(),
            ));
        }
        let names: Vec<&str> = suburbs.iter().map(|(name, _)| name.as_str()).collect();
        return Ok(Some(format!(
            "It has been slow around there. Busiest areas right now: {}. Worth heading \
             that way.",
            names.join(", ")
        )));
    }

    save_block(ctx, concern, blk);
    Ok(Some(
        "Is it quiet everywhere, or just in one area? Tell me the suburb and I'll check."
            .to_string(),
    ))
}
