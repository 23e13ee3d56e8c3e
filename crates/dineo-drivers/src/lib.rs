// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driver identity resolution and KPI lookup.
//!
//! Joins the roster and KPI warehouse tables by phone variant, normalises
//! upstream quirks (percent encodings, stale balances) and caches resolved
//! identities for the webhook hot path.

pub mod resolver;

pub use resolver::{DriverResolver, coerce_percent};
