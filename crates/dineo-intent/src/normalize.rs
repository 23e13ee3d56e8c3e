// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound text normalisation.
//!
//! WhatsApp clients send smart quotes and non-breaking spaces; the keyword
//! tables are written in plain ASCII, so everything is folded before
//! matching.

/// Fold smart punctuation and exotic whitespace, collapse runs of spaces.
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{02bc}' => out.push('\''),
            '\u{201c}' | '\u{201d}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{00a0}' | '\u{2007}' | '\u{202f}' | '\t' | '\n' | '\r' => out.push(' '),
            _ => out.push(c),
        }
    }
    let collapsed: Vec<&str> = out.split(' ').filter(|s| !s.is_empty()).collect();
    collapsed.join(" ")
}

/// First number in the text, tolerating "25", "25.5", "about 25".
pub fn parse_first_number(text: &str) -> Option<f64> {
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || (c == '.' && !current.is_empty() && !current.contains('.')) {
            current.push(c);
        } else if !current.is_empty() {
            break;
        }
    }
    current.trim_end_matches('.').parse().ok()
}

/// True when the message is nothing but a number (possibly with filler like
/// "about" or a trailing unit-free word).
pub fn is_bare_number(text: &str) -> bool {
    let cleaned = text.trim().trim_end_matches(['.', '!']);
    cleaned.parse::<f64>().is_ok()
}
