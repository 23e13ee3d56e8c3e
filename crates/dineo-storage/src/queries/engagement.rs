// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engagement campaign and per-row persistence.

use dineo_core::DineoError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{EngagementCampaign, EngagementRow};

/// Insert a new campaign shell after CSV ingestion.
pub async fn create_campaign(db: &Database, campaign: &EngagementCampaign) -> Result<(), DineoError> {
    let c = campaign.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO driver_engagement_campaigns
                     (id, source_filename, template_map, total_rows, sent_count, failed_count,
                      skipped_count, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    c.id,
                    c.source_filename,
                    c.template_map.to_string(),
                    c.total_rows,
                    c.sent_count,
                    c.failed_count,
                    c.skipped_count,
                    c.status,
                    c.created_at
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_campaign(
    db: &Database,
    campaign_id: &str,
) -> Result<Option<EngagementCampaign>, DineoError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let campaign = conn
                .query_row(
                    "SELECT id, source_filename, template_map, total_rows, sent_count,
                            failed_count, skipped_count, status, created_at
                     FROM driver_engagement_campaigns WHERE id = ?1",
                    params![campaign_id],
                    read_campaign,
                )
                .optional()?;
            Ok(campaign)
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite campaign aggregates and status after a send pass.
pub async fn update_campaign_progress(
    db: &Database,
    campaign_id: &str,
    sent: i64,
    failed: i64,
    skipped: i64,
    status: &str,
) -> Result<(), DineoError> {
    let campaign_id = campaign_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE driver_engagement_campaigns
                 SET sent_count = ?2, failed_count = ?3, skipped_count = ?4, status = ?5
                 WHERE id = ?1",
                params![campaign_id, sent, failed, skipped, status],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert one ingested row; returns its id.
pub async fn insert_row(db: &Database, row: &EngagementRow) -> Result<i64, DineoError> {
    let r = row.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO driver_engagement_rows
                     (campaign_id, wa_id, driver_type, template_id, rendered_params,
                      send_status, baseline_metrics)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    r.campaign_id,
                    r.wa_id,
                    r.driver_type,
                    r.template_id,
                    r.rendered_params.to_string(),
                    r.send_status,
                    r.baseline_metrics.to_string()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a send outcome for one row, including the baseline KPI snapshot
/// captured just before the send.
pub async fn set_row_send_result(
    db: &Database,
    row_id: i64,
    send_status: &str,
    send_error: Option<&str>,
    outbound_message_id: Option<&str>,
    sent_at: Option<&str>,
    baseline_metrics: Option<&serde_json::Value>,
) -> Result<(), DineoError> {
    let send_status = send_status.to_string();
    let send_error = send_error.map(str::to_string);
    let outbound = outbound_message_id.map(str::to_string);
    let sent_at = sent_at.map(str::to_string);
    let baseline = baseline_metrics.map(|m| m.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE driver_engagement_rows
                 SET send_status = ?2, send_error = ?3, outbound_message_id = ?4, sent_at = ?5,
                     baseline_metrics = COALESCE(?6, baseline_metrics)
                 WHERE id = ?1",
                params![row_id, send_status, send_error, outbound, sent_at, baseline],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All rows for a campaign, in ingestion order.
pub async fn rows_for_campaign(
    db: &Database,
    campaign_id: &str,
) -> Result<Vec<EngagementRow>, DineoError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ROW_COLUMNS} FROM driver_engagement_rows
                 WHERE campaign_id = ?1 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![campaign_id], read_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Sent rows with no follow-up yet whose send is older than `cutoff`.
pub async fn rows_due_followup(db: &Database, cutoff: &str) -> Result<Vec<EngagementRow>, DineoError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ROW_COLUMNS} FROM driver_engagement_rows
                 WHERE send_status = 'sent' AND followup_status IS NULL AND sent_at <= ?1
                 ORDER BY sent_at ASC"
            ))?;
            let rows = stmt.query_map(params![cutoff], read_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Record the follow-up outcome for a row.
pub async fn set_followup(
    db: &Database,
    row_id: i64,
    followup_status: &str,
    followup_message_id: Option<&str>,
    followup_sent_at: Option<&str>,
) -> Result<(), DineoError> {
    let followup_status = followup_status.to_string();
    let followup_message_id = followup_message_id.map(str::to_string);
    let followup_sent_at = followup_sent_at.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE driver_engagement_rows
                 SET followup_status = ?2, followup_message_id = ?3, followup_sent_at = ?4
                 WHERE id = ?1",
                params![row_id, followup_status, followup_message_id, followup_sent_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The driver's most recently sent engagement row, if any. Used to interpret
/// a driver reply against the template that prompted it.
pub async fn last_sent_row_for_driver(
    db: &Database,
    wa_id: &str,
) -> Result<Option<EngagementRow>, DineoError> {
    let wa_id = wa_id.to_string();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {ROW_COLUMNS} FROM driver_engagement_rows
                         WHERE wa_id = ?1 AND send_status = 'sent'
                         ORDER BY sent_at DESC, id DESC LIMIT 1"
                    ),
                    params![wa_id],
                    read_row,
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

const ROW_COLUMNS: &str = "id, campaign_id, wa_id, driver_type, template_id, rendered_params, \
     send_status, send_error, outbound_message_id, sent_at, baseline_metrics, followup_status, \
     followup_message_id, followup_sent_at";

fn read_campaign(row: &rusqlite::Row<'_>) -> Result<EngagementCampaign, rusqlite::Error> {
    let template_map: String = row.get(2)?;
    Ok(EngagementCampaign {
        id: row.get(0)?,
        source_filename: row.get(1)?,
        template_map: serde_json::from_str(&template_map)
            .unwrap_or(serde_json::Value::Object(Default::default())),
        total_rows: row.get(3)?,
        sent_count: row.get(4)?,
        failed_count: row.get(5)?,
        skipped_count: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn read_row(row: &rusqlite::Row<'_>) -> Result<EngagementRow, rusqlite::Error> {
    let rendered: String = row.get(5)?;
    let baseline: String = row.get(10)?;
    Ok(EngagementRow {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        wa_id: row.get(2)?,
        driver_type: row.get(3)?,
        template_id: row.get(4)?,
        rendered_params: serde_json::from_str(&rendered)
            .unwrap_or(serde_json::Value::Object(Default::default())),
        send_status: row.get(6)?,
        send_error: row.get(7)?,
        outbound_message_id: row.get(8)?,
        sent_at: row.get(9)?,
        baseline_metrics: serde_json::from_str(&baseline)
            .unwrap_or(serde_json::Value::Object(Default::default())),
        followup_status: row.get(11)?,
        followup_message_id: row.get(12)?,
        followup_sent_at: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn open_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("e.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn campaign(id: &str) -> EngagementCampaign {
        EngagementCampaign {
            id: id.into(),
            source_filename: Some("batch1.csv".into()),
            template_map: json!({"inactive_7d": "re_engage_v2"}),
            total_rows: 2,
            sent_count: 0,
            failed_count: 0,
            skipped_count: 0,
            status: "pending".into(),
            created_at: "2026-02-01T09:00:00+02:00".into(),
        }
    }

    fn pending_row(campaign_id: &str, wa_id: &str) -> EngagementRow {
        EngagementRow {
            id: 0,
            campaign_id: campaign_id.into(),
            wa_id: wa_id.into(),
            driver_type: Some("inactive_7d".into()),
            template_id: Some("re_engage_v2".into()),
            rendered_params: json!({"name": "Thabo"}),
            send_status: "pending".into(),
            send_error: None,
            outbound_message_id: None,
            sent_at: None,
            baseline_metrics: json!({}),
            followup_status: None,
            followup_message_id: None,
            followup_sent_at: None,
        }
    }

    #[tokio::test]
    async fn campaign_lifecycle() {
        let (db, _dir) = open_db().await;
        create_campaign(&db, &campaign("camp-1")).await.unwrap();

        let r1 = insert_row(&db, &pending_row("camp-1", "27831111111")).await.unwrap();
        let r2 = insert_row(&db, &pending_row("camp-1", "27832222222")).await.unwrap();
        assert_ne!(r1, r2);

        set_row_send_result(
            &db,
            r1,
            "sent",
            None,
            Some("wamid.c1"),
            Some("2026-02-01T09:05:00+02:00"),
            Some(&json!({"finished_trips": 12})),
        )
        .await
        .unwrap();
        set_row_send_result(&db, r2, "failed", Some("131026"), None, None, None)
            .await
            .unwrap();
        update_campaign_progress(&db, "camp-1", 1, 1, 0, "completed").await.unwrap();

        let fetched = get_campaign(&db, "camp-1").await.unwrap().unwrap();
        assert_eq!((fetched.sent_count, fetched.failed_count), (1, 1));
        assert_eq!(fetched.status, "completed");

        let rows = rows_for_campaign(&db, "camp-1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].baseline_metrics["finished_trips"], 12);
        assert_eq!(rows[1].send_error.as_deref(), Some("131026"));
    }

    #[tokio::test]
    async fn followup_due_respects_cutoff_and_status() {
        let (db, _dir) = open_db().await;
        create_campaign(&db, &campaign("camp-2")).await.unwrap();

        let early = insert_row(&db, &pending_row("camp-2", "27831111111")).await.unwrap();
        let late = insert_row(&db, &pending_row("camp-2", "27832222222")).await.unwrap();
        let failed = insert_row(&db, &pending_row("camp-2", "27833333333")).await.unwrap();

        set_row_send_result(&db, early, "sent", None, Some("wamid.a"), Some("2026-02-01T09:00:00+02:00"), None)
            .await
            .unwrap();
        set_row_send_result(&db, late, "sent", None, Some("wamid.b"), Some("2026-02-02T16:00:00+02:00"), None)
            .await
            .unwrap();
        set_row_send_result(&db, failed, "failed", Some("timeout"), None, None, None)
            .await
            .unwrap();

        let due = rows_due_followup(&db, "2026-02-02T09:00:00+02:00").await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, early);

        set_followup(&db, early, "sent", Some("wamid.fu"), Some("2026-02-02T09:30:00+02:00"))
            .await
            .unwrap();
        assert!(rows_due_followup(&db, "2026-02-02T09:00:00+02:00").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_sent_row_prefers_newest() {
        let (db, _dir) = open_db().await;
        create_campaign(&db, &campaign("camp-3")).await.unwrap();
        let a = insert_row(&db, &pending_row("camp-3", "27831111111")).await.unwrap();
        let mut newer = pending_row("camp-3", "27831111111");
        newer.template_id = Some("winter_promo".into());
        let b = insert_row(&db, &newer).await.unwrap();

        set_row_send_result(&db, a, "sent", None, Some("wamid.old"), Some("2026-02-01T09:00:00+02:00"), None)
            .await
            .unwrap();
        set_row_send_result(&db, b, "sent", None, Some("wamid.new"), Some("2026-02-03T09:00:00+02:00"), None)
            .await
            .unwrap();

        let last = last_sent_row_for_driver(&db, "27831111111").await.unwrap().unwrap();
        assert_eq!(last.template_id.as_deref(), Some("winter_promo"));
    }
}
