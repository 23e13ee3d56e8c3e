// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API client.
//!
//! Send failures are recoverable by contract: a rejected or timed-out send
//! returns `Ok(None)` so the caller can mark the attempt `send_failed` and
//! move on. Only request-building problems surface as errors.

use std::time::Duration;

use async_trait::async_trait;
use dineo_config::model::WhatsAppConfig;
use dineo_core::types::{ParameterFormat, TemplateSend};
use dineo_core::{DineoError, WhatsAppAdapter};
use serde_json::{Value, json};
use tracing::{debug, warn};

/// HTTP client for the Graph API messages and media endpoints.
pub struct CloudApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    phone_number_id: String,
}

impl CloudApiClient {
    /// Build from configuration. Errors when the token or phone number id
    /// is missing, since a half-configured client can only fail later.
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, DineoError> {
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| DineoError::Config("whatsapp.access_token is not set".into()))?;
        let phone_number_id = config
            .phone_number_id
            .clone()
            .ok_or_else(|| DineoError::Config("whatsapp.phone_number_id is not set".into()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()
            .map_err(|e| DineoError::Channel {
                message: "cannot build http client".into(),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token,
            phone_number_id,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    /// POST a message payload; extract `messages[0].id` from the response.
    async fn post_message(&self, payload: Value) -> Result<Option<String>, DineoError> {
        let response = match self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "whatsapp send transport failure");
                return Ok(None);
            }
        };

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            warn!(%status, %body, "whatsapp send rejected");
            return Ok(None);
        }
        let id = body
            .pointer("/messages/0/id")
            .and_then(Value::as_str)
            .map(str::to_string);
        debug!(message_id = ?id, "whatsapp send accepted");
        Ok(id)
    }

    fn template_components(template: &TemplateSend) -> Vec<Value> {
        let mut components = Vec::new();
        if let Some(media_id) = &template.media_id {
            components.push(json!({
                "type": "header",
                "parameters": [{"type": "image", "image": {"id": media_id}}],
            }));
        }
        if !template.params.is_empty() {
            let parameters: Vec<Value> = template
                .params
                .iter()
                .map(|p| match (template.parameter_format, &p.name) {
                    (ParameterFormat::Named, Some(name)) => json!({
                        "type": "text",
                        "parameter_name": name,
                        "text": p.value,
                    }),
                    _ => json!({"type": "text", "text": p.value}),
                })
                .collect();
            components.push(json!({"type": "body", "parameters": parameters}));
        }
        components
    }
}

#[async_trait]
impl WhatsAppAdapter for CloudApiClient {
    async fn send_text(&self, wa_id: &str, body: &str) -> Result<Option<String>, DineoError> {
        self.post_message(json!({
            "messaging_product": "whatsapp",
            "to": wa_id,
            "type": "text",
            "text": {"body": body},
        }))
        .await
    }

    async fn send_template(
        &self,
        wa_id: &str,
        template: &TemplateSend,
    ) -> Result<Option<String>, DineoError> {
        self.post_message(json!({
            "messaging_product": "whatsapp",
            "to": wa_id,
            "type": "template",
            "template": {
                "name": template.name,
                "language": {"code": template.language},
                "components": Self::template_components(template),
            },
        }))
        .await
    }

    async fn upload_media(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<Option<String>, DineoError> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name("upload")
            .mime_str(mime_type)
            .map_err(|e| DineoError::Channel {
                message: "invalid media mime type".into(),
                source: Some(Box::new(e)),
            })?;
        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .part("file", part);
        let response = match self
            .http
            .post(format!("{}/{}/media", self.base_url, self.phone_number_id))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "media upload transport failure");
                return Ok(None);
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "media upload rejected");
            return Ok(None);
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Ok(body.get("id").and_then(Value::as_str).map(str::to_string))
    }

    async fn fetch_media_url(&self, media_id: &str) -> Result<Option<String>, DineoError> {
        let response = match self
            .http
            .get(format!("{}/{}", self.base_url, media_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, media_id, "media url lookup failure");
                return Ok(None);
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), media_id, "media url lookup rejected");
            return Ok(None);
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Ok(body.get("url").and_then(Value::as_str).map(str::to_string))
    }

    async fn download_bytes(&self, url: &str) -> Result<Vec<u8>, DineoError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| DineoError::Channel {
                message: "media download failed".into(),
                source: Some(Box::new(e)),
            })?;
        if !response.status().is_success() {
            return Err(DineoError::Channel {
                message: format!("media download returned {}", response.status()),
                source: None,
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DineoError::Channel {
                message: "media download body failed".into(),
                source: Some(Box::new(e)),
            })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dineo_core::types::TemplateParam;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> WhatsAppConfig {
        WhatsAppConfig {
            access_token: Some("test-token".into()),
            phone_number_id: Some("1234567890".into()),
            api_base_url: base_url.into(),
            template_language: "en".into(),
            send_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn send_text_extracts_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1234567890/messages"))
            .and(body_partial_json(serde_json::json!({
                "to": "27831234567",
                "type": "text",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "wamid.abc"}],
            })))
            .mount(&server)
            .await;

        let client = CloudApiClient::from_config(&config(&server.uri())).unwrap();
        let id = client.send_text("27831234567", "Howzit!").await.unwrap();
        assert_eq!(id.as_deref(), Some("wamid.abc"));
    }

    #[tokio::test]
    async fn rejected_send_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1234567890/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "Recipient not in allowed list"},
            })))
            .mount(&server)
            .await;

        let client = CloudApiClient::from_config(&config(&server.uri())).unwrap();
        assert!(client.send_text("27830000000", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn named_template_params_carry_parameter_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1234567890/messages"))
            .and(body_partial_json(serde_json::json!({
                "type": "template",
                "template": {
                    "name": "re_engage_v2",
                    "components": [{
                        "type": "body",
                        "parameters": [{
                            "type": "text",
                            "parameter_name": "name",
                            "text": "Thabo",
                        }],
                    }],
                },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "wamid.tpl"}],
            })))
            .mount(&server)
            .await;

        let client = CloudApiClient::from_config(&config(&server.uri())).unwrap();
        let send = TemplateSend {
            name: "re_engage_v2".into(),
            language: "en".into(),
            parameter_format: ParameterFormat::Named,
            params: vec![TemplateParam {
                name: Some("name".into()),
                value: "Thabo".into(),
            }],
            media_id: None,
        };
        let id = client.send_template("27831234567", &send).await.unwrap();
        assert_eq!(id.as_deref(), Some("wamid.tpl"));
    }

    #[tokio::test]
    async fn media_url_then_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": format!("{}/cdn/media-1", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/media-1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpegdata".to_vec()))
            .mount(&server)
            .await;

        let client = CloudApiClient::from_config(&config(&server.uri())).unwrap();
        let url = client.fetch_media_url("media-1").await.unwrap().unwrap();
        let bytes = client.download_bytes(&url).await.unwrap();
        assert_eq!(bytes, b"jpegdata");
    }

    #[test]
    fn from_config_requires_credentials() {
        let mut c = config("https://example.invalid");
        c.access_token = None;
        assert!(CloudApiClient::from_config(&c).is_err());
    }
}
