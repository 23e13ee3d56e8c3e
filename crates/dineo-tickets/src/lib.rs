// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket lifecycle service.
//!
//! Thin domain layer over the ticket tables: reuse-or-create per concern,
//! evidence capture (media, location, metadata), status transitions with an
//! audit trail, and the driver-facing closure message when a ticket reaches
//! a closed status.

pub mod service;

pub use service::TicketService;
