// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingress for the fleet assistant.
//!
//! One axum server with two jobs: answer the platform's verify handshake,
//! and turn webhook deliveries into dialogue turns. Delivery is at least
//! once, so message ids are deduped inside a sliding window before any
//! side effects run.

pub mod handlers;
pub mod server;

pub use server::{GatewayState, router, start_server};
