// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types, errors and adapter traits for the Dineo fleet assistant.
//!
//! This crate defines the vocabulary shared across the workspace: driver and
//! ticket domain types, the closed intent vocabulary, the WhatsApp and LLM
//! adapter traits, and Johannesburg-local time helpers. It deliberately has
//! no I/O of its own.

pub mod error;
pub mod time;
pub mod traits;
pub mod types;
pub mod wa;

pub use error::DineoError;
pub use traits::{Paraphraser, Transcriber, WhatsAppAdapter};
