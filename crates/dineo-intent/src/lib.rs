// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule-based intent classification.
//!
//! A closed vocabulary, zero network calls, priority-ordered keyword
//! stages, and context-aware grammars for pending prompts. The classifier
//! is deliberately stateless; everything conversational lives in the
//! driver's context.

pub mod classifier;
pub mod normalize;

pub use classifier::{IntentClassifier, intent_for_concern};
pub use normalize::{is_bare_number, normalize_text, parse_first_number};
