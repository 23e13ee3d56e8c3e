// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign send: persist the previewed rows, then deliver templates in a
//! background task while the admin UI polls campaign progress.

use std::sync::Arc;

use dineo_context::{ContextStore, keys};
use dineo_core::time::{day_bounds_iso, now_iso, today_jhb};
use dineo_core::types::{
    EngagementCampaign, EngagementRow, OutboundTemplateSnapshot, ParameterFormat, TemplateParam,
    TemplateSend,
};
use dineo_core::{DineoError, WhatsAppAdapter};
use dineo_drivers::DriverResolver;
use dineo_storage::Database;
use dineo_storage::queries::engagement;
use serde_json::{Value, json};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::preview::{CampaignPreview, RowStatus};

/// Persist a previewed campaign and return its id. Rows that failed preview
/// are stored with their classification so the report can account for them;
/// only `pending` rows are picked up by [`run_send`].
pub async fn launch(
    db: &Database,
    preview: &CampaignPreview,
    template_map: &Value,
    source_filename: Option<&str>,
) -> Result<String, DineoError> {
    let campaign_id = Uuid::new_v4().to_string();
    let skipped = preview.rows.iter().filter(|r| r.status != RowStatus::Ready).count();
    let campaign = EngagementCampaign {
        id: campaign_id.clone(),
        source_filename: source_filename.map(str::to_string),
        template_map: template_map.clone(),
        total_rows: preview.rows.len() as i64,
        sent_count: 0,
        failed_count: 0,
        skipped_count: skipped as i64,
        status: "queued".into(),
        created_at: now_iso(),
    };
    engagement::create_campaign(db, &campaign).await?;

    for row in &preview.rows {
        let send_status = match row.status {
            RowStatus::Ready => "pending".to_string(),
            other => other.to_string(),
        };
        let record = EngagementRow {
            id: 0,
            campaign_id: campaign_id.clone(),
            wa_id: row.wa_id.clone().unwrap_or_default(),
            driver_type: row.driver_type.clone(),
            template_id: row.template_id.clone(),
            rendered_params: Value::Object(row.params.clone()),
            send_status,
            send_error: None,
            outbound_message_id: None,
            sent_at: None,
            baseline_metrics: json!({}),
            followup_status: None,
            followup_message_id: None,
            followup_sent_at: None,
        };
        engagement::insert_row(db, &record).await?;
    }

    info!(campaign_id, rows = preview.rows.len(), skipped, "campaign launched");
    Ok(campaign_id)
}

/// Spawn the background send for a launched campaign.
pub fn spawn_send(
    db: Database,
    adapter: Arc<dyn WhatsAppAdapter>,
    resolver: Arc<DriverResolver>,
    store: ContextStore,
    campaign_id: String,
    language: String,
) {
    tokio::spawn(async move {
        if let Err(e) =
            run_send(&db, adapter.as_ref(), &resolver, &store, &campaign_id, &language).await
        {
            error!(campaign_id, error = %e, "campaign send aborted");
        }
    });
}

/// Send every pending row of a campaign, capturing a baseline KPI snapshot
/// per driver just before the send, and finalise the campaign aggregates.
/// Each delivered template is snapshotted into the driver's context so the
/// next inbound reply can be read against what we asked.
pub async fn run_send(
    db: &Database,
    adapter: &dyn WhatsAppAdapter,
    resolver: &DriverResolver,
    store: &ContextStore,
    campaign_id: &str,
    language: &str,
) -> Result<(), DineoError> {
    let rows = engagement::rows_for_campaign(db, campaign_id).await?;
    let (day_start, day_end) = day_bounds_iso(today_jhb());
    let mut sent = 0_i64;
    let mut failed = 0_i64;
    let mut skipped = 0_i64;

    for row in rows {
        if row.send_status != "pending" {
            skipped += 1;
            continue;
        }
        let Some(template_id) = row.template_id.clone() else {
            skipped += 1;
            continue;
        };

        let baseline = match resolver.kpi_snapshot(&row.wa_id, &day_start, &day_end).await {
            Ok(Some(snapshot)) => serde_json::to_value(&snapshot).unwrap_or_else(|_| json!({})),
            Ok(None) => json!({}),
            Err(e) => {
                warn!(wa_id = %row.wa_id, error = %e, "baseline snapshot unavailable");
                json!({})
            }
        };

        let params: Vec<TemplateParam> = row
            .rendered_params
            .as_object()
            .map(|m| {
                m.iter()
                    .map(|(name, value)| TemplateParam {
                        name: Some(name.clone()),
                        value: value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let template = TemplateSend {
            name: template_id,
            language: language.to_string(),
            parameter_format: ParameterFormat::Named,
            params,
            media_id: None,
        };

        match adapter.send_template(&row.wa_id, &template).await {
            Ok(Some(message_id)) => {
                sent += 1;
                let sent_at = now_iso();
                engagement::set_row_send_result(
                    db,
                    row.id,
                    "sent",
                    None,
                    Some(&message_id),
                    Some(&sent_at),
                    Some(&baseline),
                )
                .await?;
                record_template_snapshot(store, &row.wa_id, &template, &sent_at).await;
            }
            Ok(None) => {
                failed += 1;
                engagement::set_row_send_result(
                    db,
                    row.id,
                    "send_failed",
                    Some("rejected by platform"),
                    None,
                    None,
                    Some(&baseline),
                )
                .await?;
            }
            Err(e) => {
                failed += 1;
                warn!(wa_id = %row.wa_id, error = %e, "template send errored");
                engagement::set_row_send_result(
                    db,
                    row.id,
                    "send_failed",
                    Some(&e.to_string()),
                    None,
                    None,
                    Some(&baseline),
                )
                .await?;
            }
        }
    }

    engagement::update_campaign_progress(db, campaign_id, sent, failed, skipped, "completed").await?;
    info!(campaign_id, sent, failed, skipped, "campaign send finished");
    Ok(())
}

/// Best effort: a lost snapshot only costs reply context, never the send.
async fn record_template_snapshot(
    store: &ContextStore,
    wa_id: &str,
    template: &TemplateSend,
    sent_at: &str,
) {
    let mut ctx = store.load(wa_id);
    let params_named: serde_json::Map<String, Value> = template
        .params
        .iter()
        .filter_map(|p| p.name.clone().map(|n| (n, Value::String(p.value.clone()))))
        .collect();
    let snapshot = OutboundTemplateSnapshot {
        id: template.name.clone(),
        sent_at: sent_at.to_string(),
        params_named,
        parameter_format: template.parameter_format,
    };
    match serde_json::to_value(&snapshot) {
        Ok(value) => {
            ctx.set(keys::LAST_OUTBOUND_TEMPLATE, value);
            if let Err(e) = store.save(wa_id, &ctx, sent_at).await {
                warn!(%wa_id, error = %e, "template snapshot not saved");
            }
        }
        Err(e) => warn!(%wa_id, error = %e, "template snapshot not serialisable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_csv;
    use crate::preview::build_preview;
    use dineo_test_utils::{MockWhatsApp, SentMessage};
    use std::time::Duration;
    use tempfile::tempdir;

    async fn open_db() -> (Database, ContextStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("s.db").to_str().unwrap())
            .await
            .unwrap();
        let store = ContextStore::new(dir.path().join("ctx"), db.clone()).unwrap();
        (db, store, dir)
    }

    #[tokio::test]
    async fn launch_then_send_delivers_ready_rows_only() {
        let (db, store, _dir) = open_db().await;
        let template_map = json!({"default": "winter_checkin_v1"});
        let csv = "name,whatsapp\nThabo Mokoena,0831234567\nNo Phone,\n";
        let parsed = parse_csv(csv.as_bytes(), 100).unwrap();
        let preview = build_preview(&db, &parsed, &template_map).await.unwrap();

        let campaign_id = launch(&db, &preview, &template_map, Some("batch.csv"))
            .await
            .unwrap();
        let adapter = MockWhatsApp::new();
        let resolver = DriverResolver::new(db.clone(), Duration::from_secs(60));
        run_send(&db, &adapter, &resolver, &store, &campaign_id, "en")
            .await
            .unwrap();

        let sent = adapter.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            SentMessage::Template { wa_id, template } => {
                assert_eq!(wa_id, "27831234567");
                assert_eq!(template.name, "winter_checkin_v1");
                assert!(template.params.iter().any(|p| p.value == "Thabo"));
            }
            other => panic!("expected template send, got {other:?}"),
        }

        let campaign = engagement::get_campaign(&db, &campaign_id).await.unwrap().unwrap();
        assert_eq!(campaign.status, "completed");
        assert_eq!((campaign.sent_count, campaign.failed_count, campaign.skipped_count), (1, 0, 1));

        let rows = engagement::rows_for_campaign(&db, &campaign_id).await.unwrap();
        assert_eq!(rows[0].send_status, "sent");
        assert!(rows[0].outbound_message_id.is_some());
        assert_eq!(rows[1].send_status, "missing_wa");

        // The delivered template is snapshotted into the driver's context.
        let ctx = store.load("27831234567");
        let snapshot = ctx.get_object(keys::LAST_OUTBOUND_TEMPLATE).unwrap();
        assert_eq!(
            snapshot.get("id").and_then(|v| v.as_str()),
            Some("winter_checkin_v1")
        );
    }

    #[tokio::test]
    async fn platform_rejection_marks_send_failed() {
        let (db, store, _dir) = open_db().await;
        let template_map = json!({"default": "winter_checkin_v1"});
        let csv = "name,whatsapp\nThabo Mokoena,0831234567\n";
        let parsed = parse_csv(csv.as_bytes(), 100).unwrap();
        let preview = build_preview(&db, &parsed, &template_map).await.unwrap();
        let campaign_id = launch(&db, &preview, &template_map, None).await.unwrap();

        let adapter = MockWhatsApp::new();
        adapter.set_fail_sends(true);
        let resolver = DriverResolver::new(db.clone(), Duration::from_secs(60));
        run_send(&db, &adapter, &resolver, &store, &campaign_id, "en")
            .await
            .unwrap();

        let rows = engagement::rows_for_campaign(&db, &campaign_id).await.unwrap();
        assert_eq!(rows[0].send_status, "send_failed");
        let campaign = engagement::get_campaign(&db, &campaign_id).await.unwrap().unwrap();
        assert_eq!(campaign.failed_count, 1);
    }
}
