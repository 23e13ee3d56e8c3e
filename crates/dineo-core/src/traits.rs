// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits at the workspace seams.
//!
//! The WhatsApp transport and the LLM are external collaborators; every
//! consumer holds them as trait objects so tests can substitute recordings.

use async_trait::async_trait;

use crate::error::DineoError;
use crate::types::TemplateSend;

/// Outbound WhatsApp transport.
///
/// Send methods return `Ok(None)` when the platform rejected the send in a
/// recoverable way (rate limit, unknown recipient); callers log and mark the
/// attempt `send_failed` rather than propagate.
#[async_trait]
pub trait WhatsAppAdapter: Send + Sync {
    /// Send a free-text message. Returns the WhatsApp message id on success.
    async fn send_text(&self, wa_id: &str, body: &str) -> Result<Option<String>, DineoError>;

    /// Send an approved template with rendered parameters.
    async fn send_template(
        &self,
        wa_id: &str,
        template: &TemplateSend,
    ) -> Result<Option<String>, DineoError>;

    /// Upload media, returning the platform media id.
    async fn upload_media(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<Option<String>, DineoError>;

    /// Resolve a media id to a short-lived download URL.
    async fn fetch_media_url(&self, media_id: &str) -> Result<Option<String>, DineoError>;

    /// Download media bytes from a resolved URL.
    async fn download_bytes(&self, url: &str) -> Result<Vec<u8>, DineoError>;
}

/// Optional LLM paraphrase of a deterministic template reply.
///
/// The template is the contract; implementations that error or return empty
/// text are ignored by the composer.
#[async_trait]
pub trait Paraphraser: Send + Sync {
    /// Rewrite `text` in the assistant's tone. `facts` must be preserved.
    async fn paraphrase(&self, system_prompt: &str, text: &str) -> Result<String, DineoError>;
}

/// Optional voice-note transcription.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe audio bytes; `Ok(None)` means the format was unsupported.
    async fn transcribe(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<Option<String>, DineoError>;
}
