// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `dineo-core::types` for use across
//! crate boundaries. This module re-exports them for convenience within the
//! storage crate.

pub use dineo_core::types::{
    ContextMemoryRow, EngagementCampaign, EngagementRow, IntradaySlot, MessageLogEntry, NudgeEvent,
    NudgeRow, Ticket, TicketLog,
};
