// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API transport: outbound client and webhook payload types.

pub mod client;
pub mod payload;

pub use client::CloudApiClient;
pub use payload::{StatusEvent, WebhookMessage, WebhookPayload};
