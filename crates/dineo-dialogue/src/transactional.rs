// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-turn transactional replies: balance, date, identity, smalltalk.

use chrono::{DateTime, FixedOffset};
use dineo_core::DineoError;

use crate::dispatcher::{Dispatcher, Turn};

/// Balance figure plus the self-service portal pointer. Always names the
/// login URL and the personal code; the figure is best-effort.
pub async fn account_inquiry(d: &Dispatcher, turn: &Turn<'_>) -> Result<String, DineoError> {
    let weekly = d.resolver.weekly_kpis(turn.wa_id).await?;
    let url = &d.config.login_url;
    Ok(match weekly {
        Some(kpis) => format!(
            "Your latest account balance is R{:.2}. For the full statement, log in at {} \
             with your personal code.",
            kpis.xero_balance, url
        ),
        None => format!(
            "You can see your balance and full statement by logging in at {} with your \
             personal code. If you send me your personal code I can link your number too.",
            url
        ),
    })
}

pub fn current_datetime(now: DateTime<FixedOffset>) -> String {
    format!(
        "It's {} in Johannesburg right now.",
        now.format("%A %d %B %Y, %H:%M")
    )
}

pub fn identity(assistant_name: &str) -> String {
    format!(
        "I'm {}, the driver support assistant. I can check your performance numbers and \
         balance, and log problems with the car, the app or your account for the team.",
        assistant_name
    )
}

pub fn smalltalk() -> String {
    "All good this side, thanks for asking! How's the road treating you today?".to_string()
}
