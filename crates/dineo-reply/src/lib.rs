// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply composition: phrase banks, tone rules, greeting bookkeeping and
//! the optional LLM paraphrase layer.

pub mod banks;
pub mod composer;

pub use composer::{ReplyComposer, pick_variant, soften, strip_leading_greeting_or_name};
