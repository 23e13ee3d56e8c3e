// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API, used for paraphrase and
//! voice-note transcription.

use std::time::Duration;

use async_trait::async_trait;
use dineo_config::model::LlmConfig;
use dineo_core::{DineoError, Paraphraser, Transcriber};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, warn};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 512;

/// Audio formats the transcription path will attempt.
const TRANSCRIBABLE_MIME: &[&str] = &["audio/ogg", "audio/mpeg", "audio/mp4", "audio/wav"];

/// Messages-API client implementing both optional adapters.
#[derive(Debug, Clone)]
pub struct AnthropicParaphraser {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl AnthropicParaphraser {
    /// Build from configuration. Errors when `llm.enabled` is set without
    /// an API key; validation normally catches that earlier.
    pub fn from_config(config: &LlmConfig) -> Result<Self, DineoError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| DineoError::Config("llm.api_key is not set".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| DineoError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DineoError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model: config.model.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn complete(&self, system: &str, user_content: Value) -> Result<String, DineoError> {
        let request = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [{"role": "user", "content": user_content}],
        });
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| DineoError::Provider {
                message: format!("llm request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(DineoError::provider(format!(
                "llm returned {status}: {}",
                body.pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            )));
        }

        let text = body
            .pointer("/content/0/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        debug!(chars = text.len(), "llm completion received");
        Ok(text)
    }
}

#[async_trait]
impl Paraphraser for AnthropicParaphraser {
    async fn paraphrase(&self, system_prompt: &str, text: &str) -> Result<String, DineoError> {
        self.complete(system_prompt, Value::String(text.to_string()))
            .await
    }
}

#[async_trait]
impl Transcriber for AnthropicParaphraser {
    async fn transcribe(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<Option<String>, DineoError> {
        if !TRANSCRIBABLE_MIME.contains(&mime_type) {
            debug!(mime_type, "unsupported audio format");
            return Ok(None);
        }
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let content = json!([
            {"type": "input_audio", "source": {
                "type": "base64", "media_type": mime_type, "data": encoded,
            }},
            {"type": "text", "text": "Transcribe this voice note verbatim. Reply with only the transcript."},
        ]);
        match self
            .complete("You transcribe WhatsApp voice notes.", content)
            .await
        {
            Ok(text) if text.is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                warn!(error = %e, "transcription failed");
                Ok(None)
            }
        }
    }
}
