// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! KPI-family replies built from the warehouse snapshot.

use dineo_context::{DriverContext, keys};
use dineo_core::DineoError;
use dineo_core::time::day_bounds_iso;
use dineo_core::types::Intent;
use dineo_reply::pick_variant;
use dineo_storage::queries::warehouse;

use crate::dispatcher::{Dispatcher, Turn};

const UNLINKED: &str = "I couldn't find your numbers on my side. Send me your personal code \
                        and I'll link your WhatsApp number to your profile.";

const TIPS: &[&str] = &[
    "The top drivers keep acceptance above 90%, start before 07:00, and stay online through \
     the lunch rush. Small consistent days beat one big push.",
    "What the best earners have in common: they accept nearly everything, position near busy \
     areas before peak times, and take short breaks instead of long ones.",
];

/// Build the reply for a KPI-family intent.
pub async fn reply(
    d: &Dispatcher,
    intent: Intent,
    turn: &Turn<'_>,
    ctx: &mut DriverContext,
) -> Result<String, DineoError> {
    let (day_start, day_end) = day_bounds_iso(turn.now.date_naive());

    match intent {
        Intent::HotspotSummary => return hotspots(d, &day_start, &day_end).await,
        Intent::TopDriverTips => return Ok(pick_variant(ctx, "tips", TIPS)),
        _ => {}
    }

    let Some(snapshot) = d
        .resolver
        .kpi_snapshot(turn.wa_id, &day_start, &day_end)
        .await?
    else {
        return Ok(UNLINKED.to_string());
    };
    let weekly = &snapshot.weekly;
    let today = &snapshot.today;

    let goal_trips = ctx
        .get_i64(keys::GOAL_TRIP_COUNT)
        .unwrap_or(d.config.target_trips);
    let goal_hours = ctx
        .get_f64(keys::GOAL_ONLINE_HOURS)
        .unwrap_or(d.config.target_online_hours_min);

    Ok(match intent {
        Intent::PerformanceSummary => format!(
            "This week so far: {:.1} hours online, {} trips finished, R{:.0} earned, \
             acceptance at {:.0}%. Today you've finished {} trips.",
            weekly.online_hours,
            weekly.finished_trips,
            weekly.gross_earnings,
            weekly.acceptance_rate,
            today.trips_finished
        ),
        Intent::ProgressUpdate => {
            let trips_left = (goal_trips - weekly.finished_trips).max(0);
            if trips_left == 0 {
                format!(
                    "You've hit your {} trip goal for the week - excellent work. \
                     Hours online: {:.1} of {:.0}.",
                    goal_trips, weekly.online_hours, goal_hours
                )
            } else {
                format!(
                    "You're at {} of {} trips and {:.1} of {:.0} hours for the week. \
                     {} trips to go - very doable.",
                    weekly.finished_trips, goal_trips, weekly.online_hours, goal_hours, trips_left
                )
            }
        }
        Intent::DailyTarget => {
            let daily = (goal_trips as f64 / 6.0).ceil() as i64;
            let daily = daily.max(d.config.daily_min_finished_orders);
            let remaining = (daily - today.trips_finished).max(0);
            if remaining == 0 {
                format!(
                    "Today's target was {} trips and you've already finished {}. \
                     Anything more is a bonus!",
                    daily, today.trips_finished
                )
            } else {
                format!(
                    "Aim for {} finished trips today. You're at {} so far, so {} more to go.",
                    daily, today.trips_finished, remaining
                )
            }
        }
        Intent::AcceptanceRate => {
            if weekly.acceptance_rate >= 90.0 {
                format!(
                    "Your acceptance rate is {:.0}% this week - that's where the top \
                     drivers sit. Keep it up.",
                    weekly.acceptance_rate
                )
            } else {
                format!(
                    "Your acceptance rate is {:.0}% this week. Accepting more of the \
                     requests you get is the quickest way to lift your earnings.",
                    weekly.acceptance_rate
                )
            }
        }
        Intent::EarningsPerHour => format!(
            "You're earning about R{:.0} per hour online over the last 7 days.",
            weekly.earnings_per_hour
        ),
        Intent::TripCount => format!(
            "You've finished {} trips today and {} over the last 7 days.",
            today.trips_finished, weekly.finished_trips
        ),
        // Handled above; kept for totality.
        _ => UNLINKED.to_string(),
    })
}

async fn hotspots(d: &Dispatcher, day_start: &str, day_end: &str) -> Result<String, DineoError> {
    let suburbs = warehouse::busy_suburbs(&d.db, day_start, day_end, 3).await?;
    if suburbs.is_empty() {
        return Ok(
            "It's fairly quiet across the board right now. Stay online - I'll point you at \
             the busy areas as soon as orders pick up."
                .to_string(),
        );
    }
    let names: Vec<&str> = suburbs.iter().map(|(name, _)| name.as_str()).collect();
    Ok(format!(
        "Busiest areas right now: {}. Worth heading that way.",
        names.join(", ")
    ))
}
