// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Dineo fleet assistant.

use thiserror::Error;

/// The primary error type used across all Dineo crates.
#[derive(Debug, Error)]
pub enum DineoError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Context file store errors. A failed context write aborts the turn.
    #[error("context store error: {message}")]
    Context {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// WhatsApp transport errors (send failure, media download, bad payload).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors (paraphrase, transcription). Always recoverable.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A driver could not be resolved from the warehouse roster.
    #[error("driver not found for wa_id {wa_id}")]
    DriverNotFound { wa_id: String },

    /// A ticket id does not exist.
    #[error("ticket not found: {ticket_id}")]
    TicketNotFound { ticket_id: i64 },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DineoError {
    /// Shorthand for a channel error without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        DineoError::Channel {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        DineoError::Provider {
            message: message.into(),
            source: None,
        }
    }
}
