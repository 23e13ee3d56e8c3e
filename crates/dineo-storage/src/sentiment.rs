// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lexicon sentiment scoring for inbound messages.
//!
//! Good enough for the ops dashboard trend line; no model involved. The
//! lexicon carries the South African slang our drivers actually use.

const POSITIVE: &[&str] = &[
    "thanks", "thank", "thankyou", "great", "good", "nice", "awesome", "perfect", "happy",
    "sorted", "sharp", "lekker", "yebo", "cool", "excellent", "appreciate", "helpful", "love",
    "best", "wonderful", "blessed", "fine",
];

const NEGATIVE: &[&str] = &[
    "bad", "terrible", "horrible", "angry", "upset", "broken", "broke", "problem", "problems",
    "issue", "issues", "accident", "crash", "sick", "stress", "stressed", "struggling",
    "suspended", "blocked", "unfair", "wrong", "cant", "can't", "cannot", "never", "worst",
    "useless", "eish", "hayi", "scam", "stolen", "robbed",
];

/// Score in `[-1, 1]` and a coarse label. Unmatched text scores 0 / neutral.
pub fn score_sentiment(text: &str) -> (f64, &'static str) {
    let mut pos = 0i32;
    let mut neg = 0i32;
    for token in text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
    {
        let token = token.to_lowercase();
        if POSITIVE.contains(&token.as_str()) {
            pos += 1;
        } else if NEGATIVE.contains(&token.as_str()) {
            neg += 1;
        }
    }
    let matched = pos + neg;
    if matched == 0 {
        return (0.0, "neutral");
    }
    let score = f64::from(pos - neg) / f64::from(matched);
    let label = if score > 0.2 {
        "positive"
    } else if score < -0.2 {
        "negative"
    } else {
        "neutral"
    };
    (score, label)
}
