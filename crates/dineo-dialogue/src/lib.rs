// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dialogue state machines and the intent dispatcher.
//!
//! Every concern is a small state machine whose resumption marker lives in
//! the driver's context and whose durable record is a ticket. The
//! dispatcher is one exhaustive match over the intent vocabulary; adding an
//! intent without a route is a compile error.

pub mod dispatcher;
pub mod kpi;
pub mod machines;
pub mod transactional;

#[cfg(test)]
pub(crate) mod testutil;

pub use dispatcher::{DialogueConfig, Dispatcher, Turn};
