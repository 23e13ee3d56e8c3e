// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engagement campaign follow-ups.
//!
//! A campaign row whose driver has not replied within the configured delay
//! gets one follow-up template, derived from the original template name.
//! Rows are marked `skipped` rather than retried when the driver opted
//! out, paused follow-ups, already replied, or the stored params cannot
//! render the template.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use dineo_config::model::EngagementConfig;
use dineo_core::time::{iso, now_jhb};
use dineo_core::types::{
    MessageLogEntry, OutboundTemplateSnapshot, ParameterFormat, TemplateParam, TemplateSend,
};
use dineo_core::{DineoError, WhatsAppAdapter};
use dineo_context::{ContextStore, keys};
use dineo_storage::queries::engagement;
use dineo_storage::{Database, MessageLogger};
use tracing::{error, info, warn};

const PASS_INTERVAL_SECS: u64 = 3600;

pub struct FollowupWorker {
    db: Database,
    adapter: Arc<dyn WhatsAppAdapter>,
    logger: MessageLogger,
    store: ContextStore,
    config: EngagementConfig,
    template_language: String,
}

impl FollowupWorker {
    pub fn new(
        db: Database,
        adapter: Arc<dyn WhatsAppAdapter>,
        logger: MessageLogger,
        store: ContextStore,
        config: EngagementConfig,
        template_language: String,
    ) -> Self {
        Self {
            db,
            adapter,
            logger,
            store,
            config,
            template_language,
        }
    }

    pub async fn run(self) {
        let interval = std::time::Duration::from_secs(PASS_INTERVAL_SECS);
        loop {
            if let Err(e) = self.tick(now_jhb()).await {
                error!(error = %e, "follow-up tick failed");
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// One pass over rows whose follow-up is due at the given instant.
    pub async fn tick(&self, now: DateTime<FixedOffset>) -> Result<(), DineoError> {
        let cutoff = iso(now - Duration::hours(self.config.followup_delay_hours));
        let rows = engagement::rows_due_followup(&self.db, &cutoff).await?;
        if rows.is_empty() {
            return Ok(());
        }
        let now_str = iso(now);
        let mut sent = 0_usize;

        for row in rows {
            let mut ctx = self.store.load(&row.wa_id);
            if ctx.opted_out() || ctx.get_bool(keys::FOLLOWUP_PAUSED).unwrap_or(false) {
                engagement::set_followup(&self.db, row.id, "skipped", None, None).await?;
                continue;
            }
            if let Some(sent_at) = &row.sent_at
                && self
                    .logger
                    .has_inbound_since(&self.db, &row.wa_id, sent_at)
                    .await?
            {
                engagement::set_followup(&self.db, row.id, "skipped", None, None).await?;
                continue;
            }
            let Some(template_id) = &row.template_id else {
                engagement::set_followup(&self.db, row.id, "skipped", None, None).await?;
                continue;
            };
            let params: Vec<TemplateParam> = row
                .rendered_params
                .as_object()
                .map(|m| {
                    m.iter()
                        .map(|(name, value)| TemplateParam {
                            name: Some(name.clone()),
                            value: value
                                .as_str()
                                .map(str::to_string)
                                .unwrap_or_else(|| value.to_string()),
                        })
                        .collect()
                })
                .unwrap_or_default();
            if !params.iter().any(|p| p.name.as_deref() == Some("name")) {
                engagement::set_followup(&self.db, row.id, "skipped", None, None).await?;
                continue;
            }

            let template = TemplateSend {
                name: format!("{template_id}_followup"),
                language: self.template_language.clone(),
                parameter_format: ParameterFormat::Named,
                params,
                media_id: None,
            };
            match self.adapter.send_template(&row.wa_id, &template).await {
                Ok(Some(message_id)) => {
                    engagement::set_followup(
                        &self.db,
                        row.id,
                        "sent",
                        Some(&message_id),
                        Some(&now_str),
                    )
                    .await?;
                    let snapshot = OutboundTemplateSnapshot {
                        id: template.name.clone(),
                        sent_at: now_str.clone(),
                        params_named: template
                            .params
                            .iter()
                            .filter_map(|p| {
                                p.name
                                    .clone()
                                    .map(|n| (n, serde_json::Value::String(p.value.clone())))
                            })
                            .collect(),
                        parameter_format: template.parameter_format,
                    };
                    if let Ok(value) = serde_json::to_value(&snapshot) {
                        ctx.set(keys::LAST_OUTBOUND_TEMPLATE, value);
                        self.store.save(&row.wa_id, &ctx, &now_str).await?;
                    }
                    self.logger
                        .log(
                            &self.db,
                            &MessageLogEntry {
                                wa_id: row.wa_id.clone(),
                                direction: "OUTBOUND".into(),
                                message_text: Some(template.name.clone()),
                                intent: Some("engagement_followup".into()),
                                wa_message_id: Some(message_id),
                                status: Some("sent".into()),
                                logged_at: now_str.clone(),
                                ..Default::default()
                            },
                        )
                        .await?;
                    sent += 1;
                }
                Ok(None) => {
                    warn!(wa_id = %row.wa_id, "follow-up rejected by platform");
                    engagement::set_followup(&self.db, row.id, "send_failed", None, None).await?;
                }
                Err(e) => {
                    warn!(wa_id = %row.wa_id, error = %e, "follow-up send errored");
                    engagement::set_followup(&self.db, row.id, "send_failed", None, None).await?;
                }
            }
        }

        if sent > 0 {
            info!(sent, "campaign follow-ups sent");
        }
        Ok(())
    }
}
