// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes and the shared state the webhook handlers run against.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{Router, routing::get};
use dashmap::DashMap;
use dineo_config::model::GatewayConfig;
use dineo_context::ContextStore;
use dineo_core::{DineoError, Transcriber, WhatsAppAdapter};
use dineo_dialogue::Dispatcher;
use dineo_drivers::DriverResolver;
use dineo_intent::IntentClassifier;
use dineo_reply::ReplyComposer;
use dineo_storage::{Database, MessageLogger};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers;

/// Everything one webhook turn needs, shared across requests.
#[derive(Clone)]
pub struct GatewayState {
    pub db: Database,
    pub adapter: Arc<dyn WhatsAppAdapter>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub resolver: Arc<DriverResolver>,
    pub store: ContextStore,
    pub logger: MessageLogger,
    pub dispatcher: Arc<Dispatcher>,
    pub composer: Arc<ReplyComposer>,
    pub classifier: IntentClassifier,
    pub verify_token: Option<String>,
    dedupe_window: Duration,
    seen: Arc<DashMap<String, Instant>>,
}

impl GatewayState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &GatewayConfig,
        db: Database,
        adapter: Arc<dyn WhatsAppAdapter>,
        transcriber: Option<Arc<dyn Transcriber>>,
        resolver: Arc<DriverResolver>,
        store: ContextStore,
        logger: MessageLogger,
        dispatcher: Arc<Dispatcher>,
        composer: Arc<ReplyComposer>,
    ) -> Self {
        Self {
            db,
            adapter,
            transcriber,
            resolver,
            store,
            logger,
            dispatcher,
            composer,
            classifier: IntentClassifier::new(),
            verify_token: config.verify_token.clone(),
            dedupe_window: Duration::from_secs(config.dedupe_window_secs),
            seen: Arc::new(DashMap::new()),
        }
    }

    /// Claim a webhook message id. Returns false when the same id arrived
    /// inside the dedupe window; the platform redelivers on slow responses.
    pub(crate) fn claim_message(&self, wa_message_id: &str) -> bool {
        let window = self.dedupe_window;
        if self.seen.len() > 4096 {
            self.seen.retain(|_, seen_at| seen_at.elapsed() < window);
        }
        let now = Instant::now();
        let mut fresh = false;
        let entry = self
            .seen
            .entry(wa_message_id.to_string())
            .and_modify(|seen_at| {
                if seen_at.elapsed() >= window {
                    *seen_at = now;
                    fresh = true;
                }
            })
            .or_insert_with(|| {
                fresh = true;
                now
            });
        drop(entry);
        fresh
    }
}

/// Bind and serve the webhook routes until the process exits.
pub async fn start_server(config: &GatewayConfig, state: GatewayState) -> Result<(), DineoError> {
    let app = router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DineoError::Channel {
            message: format!("cannot bind gateway to {addr}"),
            source: Some(Box::new(e)),
        })?;

    info!("gateway listening on {addr}");
    axum::serve(listener, app)
        .await
        .map_err(|e| DineoError::Channel {
            message: "gateway server error".into(),
            source: Some(Box::new(e)),
        })?;
    Ok(())
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/webhook",
            get(handlers::verify_webhook).post(handlers::post_webhook),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
}
