// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign preview: template assignment and per-row readiness.

use std::collections::HashSet;

use dineo_core::DineoError;
use dineo_storage::Database;
use dineo_storage::queries::engagement;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::Display;

use crate::ingest::{CsvDriverRow, ParsedCsv};

/// Readiness classification for one previewed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Ready,
    MissingWa,
    Duplicate,
    TemplateMissing,
    MissingVars,
    Skipped,
}

/// One previewed campaign row, ready to persist and send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRow {
    pub wa_id: Option<String>,
    pub display_name: Option<String>,
    pub driver_type: Option<String>,
    pub template_id: Option<String>,
    pub params: Map<String, Value>,
    pub status: RowStatus,
}

/// Aggregate counts shown in the admin UI before the send is confirmed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PreviewCounts {
    pub total: usize,
    pub ready: usize,
    pub missing_wa: usize,
    pub duplicate: usize,
    pub template_missing: usize,
    pub missing_vars: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignPreview {
    pub rows: Vec<PreviewRow>,
    pub counts: PreviewCounts,
    pub truncated: bool,
}

/// The template variants configured for a driver type, falling back to the
/// `default` entry. A map value may be a single id or an array of variants.
fn variants_for(template_map: &Value, driver_type: Option<&str>) -> Vec<String> {
    let entry = driver_type
        .and_then(|t| template_map.get(t))
        .or_else(|| template_map.get("default"));
    match entry {
        Some(Value::String(id)) => vec![id.clone()],
        Some(Value::Array(ids)) => ids
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Pick the next variant after the driver's most recent sent template, so
/// repeat campaigns do not land the same wording twice in a row.
async fn pick_template(
    db: &Database,
    wa_id: &str,
    variants: &[String],
) -> Result<Option<String>, DineoError> {
    if variants.is_empty() {
        return Ok(None);
    }
    let previous = engagement::last_sent_row_for_driver(db, wa_id)
        .await?
        .and_then(|row| row.template_id);
    let next = match previous.and_then(|p| variants.iter().position(|v| *v == p)) {
        Some(i) => (i + 1) % variants.len(),
        None => 0,
    };
    Ok(Some(variants[next].clone()))
}

fn render_params(row: &CsvDriverRow) -> Map<String, Value> {
    let mut params = Map::new();
    if let Some(name) = row.first_name() {
        params.insert("name".into(), json!(name));
    }
    if let Some(hours) = &row.online_hours {
        params.insert("hours".into(), json!(hours));
    }
    if let Some(trips) = &row.trip_count {
        params.insert("trips".into(), json!(trips));
    }
    if let Some(balance) = &row.xero_balance {
        params.insert("balance".into(), json!(balance));
    }
    params
}

/// Build the full preview for a parsed CSV and a `driver_type -> template`
/// map. Classification order mirrors the UI columns: the first failing check
/// wins.
pub async fn build_preview(
    db: &Database,
    parsed: &ParsedCsv,
    template_map: &Value,
) -> Result<CampaignPreview, DineoError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows = Vec::with_capacity(parsed.rows.len());
    let mut counts = PreviewCounts {
        total: parsed.rows.len(),
        ..Default::default()
    };

    for row in &parsed.rows {
        let wa_id = row.wa_id();
        let driver_type = row.driver_type.clone();
        let params = render_params(row);

        let (status, template_id) = match &wa_id {
            None => (RowStatus::MissingWa, None),
            Some(id) if !seen.insert(id.clone()) => (RowStatus::Duplicate, None),
            Some(id) => {
                let variants = variants_for(template_map, driver_type.as_deref());
                match pick_template(db, id, &variants).await? {
                    None => (RowStatus::TemplateMissing, None),
                    Some(template) if !params.contains_key("name") => {
                        (RowStatus::MissingVars, Some(template))
                    }
                    Some(template) => (RowStatus::Ready, Some(template)),
                }
            }
        };

        match status {
            RowStatus::Ready => counts.ready += 1,
            RowStatus::MissingWa => counts.missing_wa += 1,
            RowStatus::Duplicate => counts.duplicate += 1,
            RowStatus::TemplateMissing => counts.template_missing += 1,
            RowStatus::MissingVars => counts.missing_vars += 1,
            RowStatus::Skipped => counts.skipped += 1,
        }
        rows.push(PreviewRow {
            wa_id,
            display_name: row.display_name.clone(),
            driver_type,
            template_id,
            params,
            status,
        });
    }

    Ok(CampaignPreview {
        rows,
        counts,
        truncated: parsed.truncated,
    })
}
