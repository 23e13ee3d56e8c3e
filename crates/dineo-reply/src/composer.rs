// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply composition rules.
//!
//! Deterministic templates are the contract. The composer layers on the
//! greeting-once-per-day rule, leading-name stripping, directive softening,
//! variant rotation and the 15-minute duplicate-suppression window; the
//! optional paraphraser only rewrites tone and is dropped on any failure.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use dineo_context::{DriverContext, keys};
use dineo_core::Paraphraser;
use dineo_core::types::Driver;
use serde_json::json;
use tracing::{debug, warn};

/// Suppress a byte-identical reply to the same inbound inside this window.
const DUPLICATE_WINDOW_SECS: i64 = 15 * 60;

/// Directive words softened before sending. Coaching, not instructing.
const SOFTENERS: &[(&str, &str)] = &[
    ("you must", "you could"),
    ("must", "could"),
    ("always", "often"),
    ("never", "rarely"),
    ("you should", "you might want to"),
    ("do not", "try not to"),
    ("don't forget", "remember"),
];

pub struct ReplyComposer {
    assistant_name: String,
    paraphraser: Option<Arc<dyn Paraphraser>>,
}

impl ReplyComposer {
    pub fn new(assistant_name: impl Into<String>, paraphraser: Option<Arc<dyn Paraphraser>>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            paraphraser,
        }
    }

    /// Compose the final outbound text for one turn. `None` means the turn
    /// produces no send (duplicate suppression). Updates the context's reply
    /// bookkeeping when a send goes ahead.
    pub async fn compose(
        &self,
        ctx: &mut DriverContext,
        driver: Option<&Driver>,
        inbound_text: &str,
        body: &str,
        now: DateTime<FixedOffset>,
    ) -> Option<String> {
        let first_name = driver.and_then(Driver::first_name);
        let mut text = strip_leading_greeting_or_name(body, first_name);
        text = soften(&text);

        if self.should_greet(ctx, now) {
            let greeting = match first_name {
                Some(name) => format!("Hi {name},"),
                None => "Hi,".to_string(),
            };
            text = format!("{greeting} {text}");
            ctx.set(keys::LAST_GREET_DATE, now.date_naive().to_string());
        }

        if let Some(paraphraser) = &self.paraphraser {
            text = self.try_paraphrase(paraphraser.as_ref(), &text).await;
        }

        if self.is_duplicate(ctx, inbound_text, &text, now) {
            debug!("duplicate reply suppressed");
            return None;
        }

        ctx.set(keys::LAST_REPLY, text.clone());
        ctx.set(keys::LAST_REPLY_AT, now.to_rfc3339());
        ctx.set(keys::LAST_INBOUND, inbound_text);
        Some(text)
    }

    /// Greet at most once per Johannesburg calendar day.
    pub fn should_greet(&self, ctx: &DriverContext, now: DateTime<FixedOffset>) -> bool {
        ctx.get_str(keys::LAST_GREET_DATE) != Some(now.date_naive().to_string().as_str())
    }

    /// Pick a variant from a bank, avoiding the previous pick.
    pub fn pick_phrase(&self, ctx: &mut DriverContext, bank: &str, variants: &[&str]) -> String {
        pick_variant(ctx, bank, variants)
    }

    async fn try_paraphrase(&self, paraphraser: &dyn Paraphraser, text: &str) -> String {
        let system = format!(
            "You are {}, a warm, concise WhatsApp coach for fleet drivers in Johannesburg. \
             Rewrite the message in your voice. Keep every number, name, URL and instruction \
             exactly as given. Use contractions. One short message, no markdown.",
            self.assistant_name
        );
        match paraphraser.paraphrase(&system, text).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => rewritten.trim().to_string(),
            Ok(_) => text.to_string(),
            Err(e) => {
                warn!(error = %e, "paraphrase failed, using template");
                text.to_string()
            }
        }
    }

    fn is_duplicate(
        &self,
        ctx: &DriverContext,
        inbound_text: &str,
        composed: &str,
        now: DateTime<FixedOffset>,
    ) -> bool {
        let same_reply = ctx.get_str(keys::LAST_REPLY) == Some(composed);
        let same_inbound = ctx.get_str(keys::LAST_INBOUND) == Some(inbound_text);
        if !(same_reply && same_inbound) {
            return false;
        }
        ctx.get_str(keys::LAST_REPLY_AT)
            .and_then(|at| DateTime::parse_from_rfc3339(at).ok())
            .is_some_and(|at| (now - at).num_seconds() < DUPLICATE_WINDOW_SECS)
    }
}

/// Pick a variant from a bank, avoiding the previous pick. Rotation state
/// lives in the driver's context so the memory survives restarts.
pub fn pick_variant(ctx: &mut DriverContext, bank: &str, variants: &[&str]) -> String {
    if variants.is_empty() {
        return String::new();
    }
    let previous = ctx
        .get_object(keys::PHRASE_ROTATION)
        .and_then(|m| m.get(bank))
        .and_then(|v| v.as_i64());
    let next = match previous {
        Some(p) if variants.len() > 1 => ((p + 1) as usize) % variants.len(),
        Some(p) => (p as usize) % variants.len(),
        None => 0,
    };

    let mut rotation = ctx
        .get_object(keys::PHRASE_ROTATION)
        .cloned()
        .unwrap_or_default();
    rotation.insert(bank.to_string(), json!(next as i64));
    ctx.set(keys::PHRASE_ROTATION, serde_json::Value::Object(rotation));
    variants[next].to_string()
}

/// Drop a leading greeting or the driver's own name so a reply never opens
/// with the name twice once the greeting line is prepended.
pub fn strip_leading_greeting_or_name(text: &str, first_name: Option<&str>) -> String {
    let mut out = text.trim_start();
    for greeting in ["hi", "hello", "hey", "howzit"] {
        if let Some(rest) = strip_prefix_ci(out, greeting) {
            out = rest.trim_start_matches([' ', ',', '!']).trim_start();
            break;
        }
    }
    if let Some(name) = first_name
        && let Some(rest) = strip_prefix_ci(out, name)
    {
        out = rest.trim_start_matches([' ', ',', '!']).trim_start();
    }
    out.to_string()
}

/// Replace directive words with coaching-register equivalents. Lowercase
/// word-boundary matches only; case of the original text elsewhere is kept.
pub fn soften(text: &str) -> String {
    let mut result = text.to_string();
    for (hard, soft) in SOFTENERS {
        result = replace_word_ci(&result, hard, soft);
    }
    result
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        let rest = &text[prefix.len()..];
        // Only a whole-word match counts.
        if rest.is_empty() || rest.starts_with([' ', ',', '!']) {
            return Some(rest);
        }
    }
    None
}

fn replace_word_ci(text: &str, from: &str, to: &str) -> String {
    let lower = text.to_lowercase();
    let mut result = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(pos) = lower[cursor..].find(from) {
        let start = cursor + pos;
        let end = start + from.len();
        let boundary_before = start == 0
            || !lower[..start]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric);
        let boundary_after = end == lower.len()
            || !lower[end..].chars().next().is_some_and(char::is_alphanumeric);
        if boundary_before && boundary_after {
            result.push_str(&text[cursor..start]);
            result.push_str(to);
            cursor = end;
        } else {
            result.push_str(&text[cursor..end]);
            cursor = end;
        }
    }
    result.push_str(&text[cursor..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dineo_test_utils::FixedParaphraser;

    fn jhb(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7200)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
    }

    fn driver() -> Driver {
        Driver {
            wa_id: "27831234567".into(),
            display_name: Some("Thabo Mokoena".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn greets_once_per_jhb_day() {
        let composer = ReplyComposer::new("Dineo", None);
        let mut ctx = DriverContext::new();
        let d = driver();

        let first = composer
            .compose(&mut ctx, Some(&d), "Hi", "How can I help today?", jhb(2026, 2, 1, 8, 0))
            .await
            .unwrap();
        assert!(first.starts_with("Hi Thabo,"), "{first}");

        let second = composer
            .compose(&mut ctx, Some(&d), "and my balance?", "Your balance is R-350.", jhb(2026, 2, 1, 9, 0))
            .await
            .unwrap();
        assert!(!second.starts_with("Hi Thabo"), "{second}");

        // Next day greets again.
        let third = composer
            .compose(&mut ctx, Some(&d), "Hi", "How can I help today?", jhb(2026, 2, 2, 8, 0))
            .await
            .unwrap();
        assert!(third.starts_with("Hi Thabo,"), "{third}");
    }

    #[tokio::test]
    async fn never_opens_with_the_name_twice() {
        let composer = ReplyComposer::new("Dineo", None);
        let mut ctx = DriverContext::new();
        let d = driver();
        let reply = composer
            .compose(
                &mut ctx,
                Some(&d),
                "Hi",
                "Hi Thabo, you're at 104 trips.",
                jhb(2026, 2, 1, 8, 0),
            )
            .await
            .unwrap();
        assert_eq!(reply, "Hi Thabo, you're at 104 trips.");
    }

    #[tokio::test]
    async fn duplicate_within_window_is_suppressed() {
        let composer = ReplyComposer::new("Dineo", None);
        let mut ctx = DriverContext::new();
        // Same day, so no greeting difference between the two turns.
        ctx.set(keys::LAST_GREET_DATE, "2026-02-01");

        let first = composer
            .compose(&mut ctx, None, "balance", "Your balance is R-350.", jhb(2026, 2, 1, 10, 0))
            .await;
        assert!(first.is_some());

        let again = composer
            .compose(&mut ctx, None, "balance", "Your balance is R-350.", jhb(2026, 2, 1, 10, 5))
            .await;
        assert!(again.is_none());

        // Outside the window it sends again.
        let later = composer
            .compose(&mut ctx, None, "balance", "Your balance is R-350.", jhb(2026, 2, 1, 10, 30))
            .await;
        assert!(later.is_some());
    }

    #[tokio::test]
    async fn paraphrase_failure_falls_back_to_template() {
        let composer = ReplyComposer::new("Dineo", Some(Arc::new(FixedParaphraser(None))));
        let mut ctx = DriverContext::new();
        ctx.set(keys::LAST_GREET_DATE, "2026-02-01");
        let reply = composer
            .compose(&mut ctx, None, "hi", "Template text stays.", jhb(2026, 2, 1, 8, 0))
            .await
            .unwrap();
        assert_eq!(reply, "Template text stays.");
    }

    #[tokio::test]
    async fn paraphrase_success_replaces_text() {
        let composer = ReplyComposer::new(
            "Dineo",
            Some(Arc::new(FixedParaphraser(Some("Howzit! 104 trips so far.".into())))),
        );
        let mut ctx = DriverContext::new();
        ctx.set(keys::LAST_GREET_DATE, "2026-02-01");
        let reply = composer
            .compose(&mut ctx, None, "stats", "You have 104 trips.", jhb(2026, 2, 1, 8, 0))
            .await
            .unwrap();
        assert_eq!(reply, "Howzit! 104 trips so far.");
    }

    #[test]
    fn softening_rewrites_directives() {
        assert_eq!(
            soften("You must go online early and always accept."),
            "You could go online early and often accept."
        );
        // Word boundaries: "mustard" survives.
        assert_eq!(soften("mustard"), "mustard");
    }

    #[test]
    fn phrase_rotation_avoids_consecutive_repeats() {
        let composer = ReplyComposer::new("Dineo", None);
        let mut ctx = DriverContext::new();
        let bank = &["a", "b", "c"];
        let first = composer.pick_phrase(&mut ctx, "test", bank);
        let second = composer.pick_phrase(&mut ctx, "test", bank);
        let third = composer.pick_phrase(&mut ctx, "test", bank);
        let fourth = composer.pick_phrase(&mut ctx, "test", bank);
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_ne!(third, fourth);
        assert_eq!(first, fourth);
    }
}
