// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional LLM adapters.
//!
//! The deterministic templates are the contract; these adapters only
//! paraphrase replies into Dineo's tone and transcribe voice notes. Every
//! failure path here is recoverable and callers fall back to the template
//! or to the `voice_unavailable` flow.

pub mod client;

pub use client::AnthropicParaphraser;
