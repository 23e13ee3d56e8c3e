// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-driver conversation context.
//!
//! One JSON file per driver is the authority; a row in
//! `whatsapp_context_memory` mirrors the highlights for the admin console.
//! Loads are tolerant by design: a missing or corrupt file yields an empty
//! context rather than an error, because a broken context must never make a
//! driver unreachable.

pub mod keys;
pub mod store;

pub use store::{ContextStore, DriverContext};
