// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook handlers: the verify handshake, delivery status callbacks, and
//! the inbound message pipeline.
//!
//! The platform retries any response that is not a 200, so the POST handler
//! always answers `{"ok": true}` and keeps failures inside the process.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, FixedOffset, Utc};
use dineo_core::time::{iso, jhb_offset, now_jhb};
use dineo_core::types::{Location, MessageKind, MessageLogEntry};
use dineo_core::wa::normalize_wa_id;
use dineo_core::DineoError;
use dineo_dialogue::Turn;
use dineo_storage::queries::nudges;
use dineo_storage::score_sentiment;
use dineo_whatsapp::payload::{StatusEvent, WebhookMessage, WebhookPayload};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

pub async fn get_health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// GET handshake: echo the challenge only when a token is configured and
/// the caller presented it.
pub async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    let subscribe = params.mode.as_deref() == Some("subscribe");
    let token_ok = match (&state.verify_token, &params.verify_token) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    };
    if subscribe && token_ok {
        (StatusCode::OK, params.challenge.unwrap_or_default())
    } else {
        warn!("webhook verification rejected");
        (StatusCode::FORBIDDEN, String::new())
    }
}

pub async fn post_webhook(
    State(state): State<GatewayState>,
    Json(raw): Json<Value>,
) -> Json<Value> {
    let Ok(payload) = serde_json::from_value::<WebhookPayload>(raw) else {
        debug!("unparseable webhook payload dropped");
        return Json(json!({"ok": true}));
    };
    if let Some(value) = payload.value() {
        for status in &value.statuses {
            if let Err(e) = handle_status(&state, status).await {
                warn!(error = %e, "status callback failed");
            }
        }
        for message in &value.messages {
            if let Err(e) = handle_message(&state, message).await {
                warn!(wa_message_id = %message.id, error = %e, "inbound turn failed");
            }
        }
    }
    Json(json!({"ok": true}))
}

/// Delivery/read/failed callback for an outbound message. Updates the nudge
/// event delivery trail and keeps an audit row in the message log.
pub async fn handle_status(
    state: &GatewayState,
    status: &StatusEvent,
) -> Result<(), DineoError> {
    let wa_id = status
        .recipient_id
        .as_deref()
        .map(normalize_wa_id)
        .unwrap_or_default();
    nudges::update_delivery_status(&state.db, &status.id, &status.status).await?;
    state
        .logger
        .log(
            &state.db,
            &MessageLogEntry {
                wa_id,
                direction: "STATUS".into(),
                wa_message_id: Some(status.id.clone()),
                status: Some(status.status.clone()),
                logged_at: iso(now_jhb()),
                ..Default::default()
            },
        )
        .await?;
    Ok(())
}

/// One inbound turn: dedupe, resolve media, classify, dispatch, compose,
/// send, and persist the updated context. Failures after the dedupe claim
/// drop the message rather than trigger a platform retry loop.
pub async fn handle_message(
    state: &GatewayState,
    message: &WebhookMessage,
) -> Result<(), DineoError> {
    if !state.claim_message(&message.id) {
        debug!(wa_message_id = %message.id, "duplicate delivery dropped");
        return Ok(());
    }

    let wa_id = normalize_wa_id(&message.from);
    let received = received_at(message);
    let Some(kind) = resolve_kind(state, message).await else {
        debug!(wa_message_id = %message.id, kind = %message.kind, "unsupported message type dropped");
        return Ok(());
    };

    let driver = state.resolver.resolve(&wa_id).await?;
    let mut ctx = state.store.load(&wa_id);
    let intent = state.classifier.classify(&kind, &ctx);
    info!(%wa_id, %intent, "inbound message");

    let inbound_text = kind.text().unwrap_or("").to_string();
    let (score, label) = if inbound_text.is_empty() {
        (0.0, "")
    } else {
        score_sentiment(&inbound_text)
    };
    state
        .logger
        .log(
            &state.db,
            &MessageLogEntry {
                wa_id: wa_id.clone(),
                direction: "INBOUND".into(),
                message_text: (!inbound_text.is_empty()).then(|| inbound_text.clone()),
                intent: Some(intent.to_string()),
                wa_message_id: Some(message.id.clone()),
                sentiment_score: (!inbound_text.is_empty()).then_some(score),
                sentiment_label: (!label.is_empty()).then(|| label.to_string()),
                logged_at: iso(received),
                ..Default::default()
            },
        )
        .await?;

    // Any inbound message answers the latest unanswered nudge.
    if let Some(event) = nudges::latest_unresponded_event(&state.db, &wa_id).await? {
        let latency = DateTime::parse_from_rfc3339(&event.sent_at)
            .map(|sent| (received - sent).num_seconds().max(0))
            .unwrap_or(0);
        nudges::record_nudge_response(
            &state.db,
            event.id,
            &message.id,
            latency,
            &intent.to_string(),
        )
        .await?;
    }

    let turn = Turn {
        wa_id: &wa_id,
        driver: driver.as_ref(),
        kind: &kind,
        intent,
        now: received,
    };
    let body = state.dispatcher.dispatch(&turn, &mut ctx).await?;

    if let Some(body) = body
        && let Some(text) = state
            .composer
            .compose(&mut ctx, driver.as_ref(), &inbound_text, &body, received)
            .await
    {
        let sent = state.adapter.send_text(&wa_id, &text).await;
        let now = now_jhb();
        let (message_id, status) = match sent {
            Ok(Some(id)) => (Some(id), "sent"),
            Ok(None) => {
                warn!(%wa_id, "reply rejected by platform");
                (None, "send_failed")
            }
            Err(e) => {
                warn!(%wa_id, error = %e, "reply send errored");
                (None, "send_failed")
            }
        };
        state
            .logger
            .log(
                &state.db,
                &MessageLogEntry {
                    wa_id: wa_id.clone(),
                    direction: "OUTBOUND".into(),
                    message_text: Some(text),
                    intent: Some(intent.to_string()),
                    wa_message_id: message_id,
                    status: Some(status.into()),
                    response_latency_sec: Some((now - received).num_seconds().max(0)),
                    logged_at: iso(now),
                    ..Default::default()
                },
            )
            .await?;
    }

    state.store.save(&wa_id, &ctx, &iso(now_jhb())).await?;
    Ok(())
}

/// The platform timestamp is unix seconds; absent or garbled, fall back to
/// the wall clock.
fn received_at(message: &WebhookMessage) -> DateTime<FixedOffset> {
    message
        .timestamp
        .as_deref()
        .and_then(|t| t.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.with_timezone(&jhb_offset()))
        .unwrap_or_else(now_jhb)
}

/// Map a raw webhook message onto [`MessageKind`], resolving media ids to
/// URLs and transcribing voice notes when a transcriber is configured.
/// Returns `None` for message types the pipeline does not handle.
async fn resolve_kind(state: &GatewayState, message: &WebhookMessage) -> Option<MessageKind> {
    match message.kind.as_str() {
        "text" => Some(MessageKind::Text(
            message.text.as_ref().map(|t| t.body.clone()).unwrap_or_default(),
        )),
        "location" => message.location.as_ref().map(|loc| {
            MessageKind::Location(Location {
                lat: loc.latitude,
                lng: loc.longitude,
                name: loc.name.clone(),
                address: loc.address.clone(),
            })
        }),
        "audio" | "voice" => {
            let media = message.media()?;
            let transcript = transcribe_media(state, &media.id, media.mime_type.as_deref()).await;
            Some(MessageKind::Audio {
                media_id: media.id.clone(),
                transcript,
            })
        }
        "image" | "document" => {
            let media = message.media()?;
            let url = match state.adapter.fetch_media_url(&media.id).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(media_id = %media.id, error = %e, "media url fetch failed");
                    None
                }
            };
            Some(MessageKind::Media {
                media_id: media.id.clone(),
                url,
                caption: media.caption.clone(),
                mime_type: media.mime_type.clone(),
            })
        }
        _ => None,
    }
}

/// Best effort: an untranscribed voice note still flows through the pipeline
/// and gets the audio fallback reply.
async fn transcribe_media(
    state: &GatewayState,
    media_id: &str,
    mime_type: Option<&str>,
) -> Option<String> {
    let transcriber = state.transcriber.as_ref()?;
    let url = match state.adapter.fetch_media_url(media_id).await {
        Ok(Some(url)) => url,
        Ok(None) => return None,
        Err(e) => {
            warn!(%media_id, error = %e, "voice media url fetch failed");
            return None;
        }
    };
    let bytes = match state.adapter.download_bytes(&url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(%media_id, error = %e, "voice media download failed");
            return None;
        }
    };
    match transcriber
        .transcribe(&bytes, mime_type.unwrap_or("audio/ogg"))
        .await
    {
        Ok(transcript) => transcript.filter(|t| !t.trim().is_empty()),
        Err(e) => {
            warn!(%media_id, error = %e, "transcription failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use dineo_config::DineoConfig;
    use dineo_config::model::GatewayConfig;
    use dineo_context::ContextStore;
    use dineo_dialogue::{DialogueConfig, Dispatcher};
    use dineo_drivers::DriverResolver;
    use dineo_reply::ReplyComposer;
    use dineo_storage::{Database, MessageLogger};
    use dineo_test_utils::MockWhatsApp;
    use dineo_tickets::TicketService;
    use tempfile::tempdir;

    async fn gateway() -> (GatewayState, Arc<MockWhatsApp>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("g.db").to_str().unwrap())
            .await
            .unwrap();
        let adapter = Arc::new(MockWhatsApp::new());
        let logger = MessageLogger::initialize(&db).await.unwrap();
        let store = ContextStore::new(dir.path().join("ctx"), db.clone()).unwrap();
        let resolver = Arc::new(DriverResolver::new(db.clone(), Duration::from_secs(60)));
        let tickets = TicketService::new(db.clone(), adapter.clone(), logger.clone());
        let dispatcher = Dispatcher::new(
            db.clone(),
            tickets,
            resolver.clone(),
            DialogueConfig::from_config(&DineoConfig::default()),
        );
        let config = GatewayConfig {
            verify_token: Some("open-sesame".into()),
            ..GatewayConfig::default()
        };
        let state = GatewayState::new(
            &config,
            db,
            adapter.clone(),
            None,
            resolver,
            store,
            logger,
            Arc::new(dispatcher),
            Arc::new(ReplyComposer::new("Dineo", None)),
        );
        (state, adapter, dir)
    }

    fn text_message(id: &str, from: &str, body: &str, timestamp: &str) -> WebhookMessage {
        serde_json::from_value(json!({
            "id": id,
            "from": from,
            "timestamp": timestamp,
            "type": "text",
            "text": {"body": body},
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn handshake_echoes_challenge_for_matching_token() {
        let (state, _adapter, _dir) = gateway().await;
        let (status, body) = verify_webhook(
            State(state.clone()),
            Query(VerifyParams {
                mode: Some("subscribe".into()),
                verify_token: Some("open-sesame".into()),
                challenge: Some("1158201444".into()),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "1158201444");

        let (status, _) = verify_webhook(
            State(state),
            Query(VerifyParams {
                mode: Some("subscribe".into()),
                verify_token: Some("wrong".into()),
                challenge: Some("1158201444".into()),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn handshake_rejects_when_no_token_configured() {
        let (mut state, _adapter, _dir) = gateway().await;
        state.verify_token = None;
        let (status, _) = verify_webhook(
            State(state),
            Query(VerifyParams {
                mode: Some("subscribe".into()),
                verify_token: Some("anything".into()),
                challenge: Some("42".into()),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn text_turn_replies_and_logs_both_directions() {
        let (state, adapter, _dir) = gateway().await;
        let message = text_message("wamid.t1", "0831234567", "Hi", "1770105600");

        handle_message(&state, &message).await.unwrap();

        let texts = adapter.sent_texts();
        assert_eq!(texts.len(), 1, "greeting gets one reply");

        // Both directions logged against the normalized wa_id.
        let replied = state
            .logger
            .has_inbound_since(&state.db, "27831234567", "2026-02-01T00:00:00+02:00")
            .await
            .unwrap();
        assert!(replied);

        let ctx = state.store.load("27831234567");
        assert!(!ctx.is_empty(), "context persisted after the turn");
    }

    #[tokio::test]
    async fn duplicate_delivery_is_dropped() {
        let (state, adapter, _dir) = gateway().await;
        let message = text_message("wamid.dup", "27831234567", "Hi", "1770105600");

        handle_message(&state, &message).await.unwrap();
        handle_message(&state, &message).await.unwrap();

        assert_eq!(adapter.sent_texts().len(), 1, "second delivery suppressed");
    }

    #[tokio::test]
    async fn malformed_payload_still_answers_ok() {
        let (state, adapter, _dir) = gateway().await;
        let Json(body) = post_webhook(
            State(state),
            Json(json!({"object": "whatsapp_business_account", "entry": "garbage"})),
        )
        .await;
        assert_eq!(body, json!({"ok": true}));
        assert!(adapter.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn status_callback_updates_nudge_delivery() {
        let (state, _adapter, _dir) = gateway().await;
        nudges::insert_nudge_event(
            &state.db,
            "27831234567",
            "2026-02-03",
            1,
            Some("wamid.out1"),
            "sent",
            "2026-02-03T09:00:00+02:00",
        )
        .await
        .unwrap();

        let Json(body) = post_webhook(
            State(state.clone()),
            Json(json!({
                "entry": [{"changes": [{"value": {
                    "statuses": [{
                        "id": "wamid.out1",
                        "status": "delivered",
                        "recipient_id": "27831234567",
                    }],
                }}]}],
            })),
        )
        .await;
        assert_eq!(body, json!({"ok": true}));

        let event = nudges::latest_unresponded_event(&state.db, "27831234567")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.delivery_status.as_deref(), Some("delivered"));
    }

    #[tokio::test]
    async fn inbound_reply_closes_the_open_nudge() {
        let (state, _adapter, _dir) = gateway().await;
        nudges::insert_nudge_event(
            &state.db,
            "27831234567",
            "2026-02-03",
            1,
            Some("wamid.out1"),
            "sent",
            "2026-02-03T09:00:00+02:00",
        )
        .await
        .unwrap();

        // 1770104400 is 2026-02-03T09:40:00+02:00.
        let message = text_message("wamid.r1", "27831234567", "on my way out now", "1770104400");
        handle_message(&state, &message).await.unwrap();

        assert!(
            nudges::latest_unresponded_event(&state.db, "27831234567")
                .await
                .unwrap()
                .is_none(),
            "nudge marked responded"
        );
    }

    #[tokio::test]
    async fn unsupported_message_type_is_dropped() {
        let (state, adapter, _dir) = gateway().await;
        let message: WebhookMessage = serde_json::from_value(json!({
            "id": "wamid.sticker",
            "from": "27831234567",
            "type": "sticker",
        }))
        .unwrap();
        handle_message(&state, &message).await.unwrap();
        assert!(adapter.sent_texts().is_empty());
    }
}
