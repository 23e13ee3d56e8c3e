// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic phrase banks. The dialogue machines carry their own banks for
//! concern-specific wording; these are the cross-cutting ones.

pub const GREETING_PROMPTS: &[&str] = &[
    "How can I help today?",
    "What can I do for you today?",
    "How's your day on the road going?",
    "Anything I can help with?",
];

pub const CLARIFY_PROMPTS: &[&str] = &[
    "I'm not sure I follow - could you say that another way?",
    "Could you give me a bit more detail so I can help properly?",
    "Just to check - what would you like me to help with?",
];

pub const UNKNOWN_FALLBACKS: &[&str] = &[
    "I didn't quite catch that. You can ask me about your performance, your balance, \
     or tell me about a problem with the car or the app.",
    "I'm not sure how to help with that one. I can check your stats, your balance, or \
     log an issue for the team.",
];

pub const ACKNOWLEDGEMENT_REPLIES: &[&str] = &[
    "Anytime. Go get them out there!",
    "Pleasure. Safe driving!",
    "Sharp. I'm here if you need anything else.",
];

pub const VOICE_UNAVAILABLE: &[&str] = &[
    "Sorry, I couldn't listen to that voice note. Could you type it out for me?",
    "I can't play voice notes right now - please send that as a text message.",
];

pub const OPT_OUT_CONFIRM: &[&str] = &[
    "No problem, I've stopped the coaching messages. Reply START any time to switch \
     them back on.",
];

pub const OPT_IN_CONFIRM: &[&str] =
    &["Welcome back! I'll keep you posted with coaching updates again."];
