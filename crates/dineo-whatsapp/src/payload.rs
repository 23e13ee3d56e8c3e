// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook payload shapes (WhatsApp Cloud API).
//!
//! Everything is optional by design: a payload the deserializer cannot make
//! sense of is dropped with a 200, matching platform expectations.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    pub value: Option<ChangeValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeValue {
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub statuses: Vec<StatusEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    pub display_phone_number: Option<String>,
    pub phone_number_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMessage {
    pub id: String,
    pub from: String,
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<TextBody>,
    pub image: Option<MediaBody>,
    pub document: Option<MediaBody>,
    pub audio: Option<MediaBody>,
    pub voice: Option<MediaBody>,
    pub location: Option<LocationBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaBody {
    pub id: String,
    pub mime_type: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationBody {
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
    pub address: Option<String>,
}

/// Delivery/read/failed callback for an outbound message.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusEvent {
    pub id: String,
    pub status: String,
    pub recipient_id: Option<String>,
    pub timestamp: Option<String>,
}

impl WebhookPayload {
    /// The first change value, where messages and statuses live.
    pub fn value(&self) -> Option<&ChangeValue> {
        self.entry.first()?.changes.first()?.value.as_ref()
    }
}

impl WebhookMessage {
    /// The media body for image/document/audio/voice messages.
    pub fn media(&self) -> Option<&MediaBody> {
        self.image
            .as_ref()
            .or(self.document.as_ref())
            .or(self.audio.as_ref())
            .or(self.voice.as_ref())
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind.as_str(), "audio" | "voice")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_message_payload() {
        let raw = serde_json::json!({
            "entry": [{"changes": [{"value": {
                "metadata": {"display_phone_number": "27600000000", "phone_number_id": "123"},
                "messages": [{
                    "id": "wamid.in",
                    "from": "27831234567",
                    "timestamp": "1767254400",
                    "type": "text",
                    "text": {"body": "Hi"},
                }],
            }}]}],
        });
        let payload: WebhookPayload = serde_json::from_value(raw).unwrap();
        let value = payload.value().unwrap();
        assert_eq!(value.messages.len(), 1);
        assert_eq!(value.messages[0].text.as_ref().unwrap().body, "Hi");
    }

    #[test]
    fn parses_status_payload() {
        let raw = serde_json::json!({
            "entry": [{"changes": [{"value": {
                "statuses": [{"id": "wamid.out", "status": "read", "recipient_id": "27831234567"}],
            }}]}],
        });
        let payload: WebhookPayload = serde_json::from_value(raw).unwrap();
        let value = payload.value().unwrap();
        assert!(value.messages.is_empty());
        assert_eq!(value.statuses[0].status, "read");
    }

    #[test]
    fn tolerates_unknown_shapes() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(payload.value().is_none());

        let payload: WebhookPayload =
            serde_json::from_value(serde_json::json!({"entry": [{"changes": [{}]}]})).unwrap();
        assert!(payload.value().is_none());
    }

    #[test]
    fn media_accessor_prefers_first_present_body() {
        let raw = serde_json::json!({
            "id": "wamid.m",
            "from": "27831234567",
            "type": "image",
            "image": {"id": "media-1", "mime_type": "image/jpeg", "caption": "my car"},
        });
        let message: WebhookMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(message.media().unwrap().id, "media-1");
        assert!(!message.is_audio());
    }
}
