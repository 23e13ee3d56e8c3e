// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table family.

pub mod context_memory;
pub mod engagement;
pub mod intraday;
pub mod nudges;
pub mod ticket_logs;
pub mod tickets;
pub mod warehouse;
