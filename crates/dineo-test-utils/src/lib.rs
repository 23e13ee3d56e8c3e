// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test doubles.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dineo_core::types::TemplateSend;
use dineo_core::{DineoError, Paraphraser, WhatsAppAdapter};

/// One recorded outbound send.
#[derive(Debug, Clone)]
pub enum SentMessage {
    Text { wa_id: String, body: String },
    Template { wa_id: String, template: TemplateSend },
}

impl SentMessage {
    pub fn wa_id(&self) -> &str {
        match self {
            SentMessage::Text { wa_id, .. } | SentMessage::Template { wa_id, .. } => wa_id,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            SentMessage::Text { body, .. } => Some(body),
            SentMessage::Template { .. } => None,
        }
    }
}

/// Recording WhatsApp adapter. Sends succeed with sequential ids unless
/// `fail_sends` is raised, in which case they return `Ok(None)`.
#[derive(Default)]
pub struct MockWhatsApp {
    sent: Mutex<Vec<SentMessage>>,
    counter: AtomicU64,
    fail_sends: AtomicBool,
}

impl MockWhatsApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| m.body().map(str::to_string))
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.sent_texts().last().cloned()
    }

    fn next_id(&self) -> Option<String> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return None;
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Some(format!("wamid.mock.{n}"))
    }
}

#[async_trait]
impl WhatsAppAdapter for MockWhatsApp {
    async fn send_text(&self, wa_id: &str, body: &str) -> Result<Option<String>, DineoError> {
        self.sent.lock().unwrap().push(SentMessage::Text {
            wa_id: wa_id.to_string(),
            body: body.to_string(),
        });
        Ok(self.next_id())
    }

    async fn send_template(
        &self,
        wa_id: &str,
        template: &TemplateSend,
    ) -> Result<Option<String>, DineoError> {
        self.sent.lock().unwrap().push(SentMessage::Template {
            wa_id: wa_id.to_string(),
            template: template.clone(),
        });
        Ok(self.next_id())
    }

    async fn upload_media(
        &self,
        _bytes: &[u8],
        _mime_type: &str,
    ) -> Result<Option<String>, DineoError> {
        Ok(Some("media.mock".into()))
    }

    async fn fetch_media_url(&self, media_id: &str) -> Result<Option<String>, DineoError> {
        Ok(Some(format!("https://cdn.test/{media_id}")))
    }

    async fn download_bytes(&self, _url: &str) -> Result<Vec<u8>, DineoError> {
        Ok(b"bytes".to_vec())
    }
}

/// Paraphraser double with a fixed response, or an error when empty.
pub struct FixedParaphraser(pub Option<String>);

#[async_trait]
impl Paraphraser for FixedParaphraser {
    async fn paraphrase(&self, _system_prompt: &str, _text: &str) -> Result<String, DineoError> {
        match &self.0 {
            Some(text) => Ok(text.clone()),
            None => Err(DineoError::provider("paraphrase unavailable")),
        }
    }
}
