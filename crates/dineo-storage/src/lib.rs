// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Dineo fleet assistant.
//!
//! WAL-mode SQLite with embedded migrations and a single-writer concurrency
//! model via `tokio-rusqlite`. Hosts both the operational tables the
//! assistant owns and the read-only warehouse snapshots deployments load out
//! of band. The message logger adapts to legacy column spellings at startup.

pub mod database;
pub mod logger;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod sentiment;

pub use database::Database;
pub use logger::MessageLogger;
pub use models::*;
pub use sentiment::score_sentiment;
