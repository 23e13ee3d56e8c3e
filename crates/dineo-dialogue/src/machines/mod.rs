// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared plumbing for the concern machines.
//!
//! Every machine follows the same pattern: on entry set the active-concern
//! marker, create or reuse a ticket, then ask for the next missing slot on
//! each turn. The context block under [`ConcernType::context_key`] holds
//! only the ticket id and the stage; everything durable goes on the ticket.

pub mod accident;
pub mod balance_dispute;
pub mod car_problem;
pub mod cash_pop;
pub mod goal;
pub mod low_demand;
pub mod medical;
pub mod no_vehicle;
pub mod ops_ticket;
pub mod repossession;

use dineo_context::{DriverContext, keys};
use dineo_core::DineoError;
use dineo_core::time::iso;
use dineo_core::types::{ConcernType, Ticket};
use serde_json::{Map, Value, json};
use strum::IntoEnumIterator;

use crate::dispatcher::{Dispatcher, Turn};

/// The machine's sub-state block, cloned out of context.
pub(crate) fn block(ctx: &DriverContext, concern: ConcernType) -> Map<String, Value> {
    ctx.get_object(concern.context_key())
        .cloned()
        .unwrap_or_default()
}

pub(crate) fn save_block(ctx: &mut DriverContext, concern: ConcernType, block: Map<String, Value>) {
    ctx.set(concern.context_key(), Value::Object(block));
}

pub(crate) fn stage(block: &Map<String, Value>) -> &str {
    block.get("stage").and_then(Value::as_str).unwrap_or("")
}

pub(crate) fn set_stage(block: &mut Map<String, Value>, stage: &str) {
    block.insert("stage".into(), json!(stage));
}

pub(crate) fn ticket_id(block: &Map<String, Value>) -> Option<i64> {
    block.get("ticket_id").and_then(Value::as_i64)
}

/// Remove this concern's block and, if it pointed there, the active marker.
pub(crate) fn clear(ctx: &mut DriverContext, concern: ConcernType) {
    ctx.clear_concern_blocks(&[concern.context_key()]);
}

/// Enter (or resume) a concern: open or reuse the ticket, drop any other
/// concern's block so at most one exists, and mark the concern active.
/// Returns the ticket, the sub-state block, and whether the ticket is new.
pub(crate) async fn enter(
    d: &Dispatcher,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
    concern: ConcernType,
) -> Result<(Ticket, Map<String, Value>, bool), DineoError> {
    let initial = turn.text();
    let (ticket, created) = d
        .tickets
        .open_or_reuse(
            turn.wa_id,
            concern,
            if initial.is_empty() { None } else { Some(initial) },
        )
        .await?;

    let others: Vec<&str> = ConcernType::iter()
        .filter(|c| *c != concern)
        .map(|c| c.context_key())
        .collect();
    ctx.clear_concern_blocks(&others);

    let mut block = block(ctx, concern);
    if created || ticket_id(&block) != Some(ticket.id) {
        block = Map::new();
        block.insert("ticket_id".into(), json!(ticket.id));
        ctx.set(
            keys::ACTIVE_CONCERN,
            json!({
                "type": concern.to_string(),
                "opened_at": iso(turn.now),
                "message": initial,
            }),
        );
    }
    Ok((ticket, block, created))
}
