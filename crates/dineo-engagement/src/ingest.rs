// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CSV ingestion for engagement campaigns.
//!
//! Admin exports arrive in UTF-8 or Latin-1 with headers that vary by tool
//! (`WhatsApp Number`, `whatsapp`, `Phone`). Headers are normalised and
//! alias-mapped into a fixed field set before rows are read.

use dineo_core::DineoError;
use dineo_core::wa::normalize_wa_id;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One ingested driver row, values kept as the raw CSV strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvDriverRow {
    pub display_name: Option<String>,
    pub whatsapp: Option<String>,
    pub driver_type: Option<String>,
    pub model: Option<String>,
    pub car_reg: Option<String>,
    pub online_hours: Option<String>,
    pub acceptance_rate: Option<String>,
    pub xero_balance: Option<String>,
    pub payments: Option<String>,
    pub trip_count: Option<String>,
}

impl CsvDriverRow {
    /// The normalised E.164 wa_id, when the phone column held anything usable.
    pub fn wa_id(&self) -> Option<String> {
        let raw = self.whatsapp.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let normalized = normalize_wa_id(raw);
        (normalized.len() >= 11).then_some(normalized)
    }

    /// First name for template greetings.
    pub fn first_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
    }
}

/// The outcome of parsing one uploaded CSV.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub rows: Vec<CsvDriverRow>,
    /// True when the upload exceeded the configured row cap.
    pub truncated: bool,
}

/// Lowercase a header and fold every run of non-alphanumerics to one `_`.
fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = true;
    for c in raw.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Map a normalised header onto the canonical field set.
fn canonical_field(header: &str) -> Option<&'static str> {
    match header {
        "display_name" | "name" | "driver_name" | "full_name" | "driver" => Some("display_name"),
        "whatsapp" | "whatsapp_number" | "wa_id" | "phone" | "phone_number" | "cell"
        | "cellphone" | "mobile" | "msisdn" | "contact_number" => Some("whatsapp"),
        "driver_type" | "type" | "segment" | "category" | "group" => Some("driver_type"),
        "model" | "asset_model" | "car_model" | "vehicle" => Some("model"),
        "car_reg" | "car_reg_number" | "registration" | "reg_number" | "reg" => Some("car_reg"),
        "online_hours" | "hours_online" | "hours" | "7d_online_hours" => Some("online_hours"),
        "acceptance_rate" | "acceptance" | "accept_rate" => Some("acceptance_rate"),
        "xero_balance" | "balance" | "account_balance" => Some("xero_balance"),
        "payments" | "payments_7d" | "7d_payments" | "weekly_payments" => Some("payments"),
        "trip_count" | "trips" | "finished_trips" | "7d_trips" => Some("trip_count"),
        _ => None,
    }
}

/// Decode the upload as UTF-8, falling back to Latin-1. Latin-1 bytes map
/// one-to-one onto the first 256 code points, so the fallback cannot fail.
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Parse an uploaded CSV, capping at `max_rows` data rows.
pub fn parse_csv(bytes: &[u8], max_rows: usize) -> Result<ParsedCsv, DineoError> {
    let decoded = decode(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(decoded.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| DineoError::Internal(format!("csv header parse failed: {e}")))?
        .clone();
    let mapping: Vec<Option<&'static str>> = headers
        .iter()
        .map(|h| canonical_field(&normalize_header(h)))
        .collect();
    if !mapping.iter().any(|f| *f == Some("whatsapp")) {
        return Err(DineoError::Internal(
            "csv has no recognisable WhatsApp/phone column".into(),
        ));
    }

    let mut rows = Vec::new();
    let mut truncated = false;
    for record in reader.records() {
        let record = record.map_err(|e| DineoError::Internal(format!("csv row parse failed: {e}")))?;
        if rows.len() >= max_rows {
            truncated = true;
            break;
        }
        let mut row = CsvDriverRow::default();
        for (idx, field) in mapping.iter().enumerate() {
            let Some(field) = field else { continue };
            let value = record.get(idx).unwrap_or("").trim();
            if value.is_empty() {
                continue;
            }
            let slot = match *field {
                "display_name" => &mut row.display_name,
                "whatsapp" => &mut row.whatsapp,
                "driver_type" => &mut row.driver_type,
                "model" => &mut row.model,
                "car_reg" => &mut row.car_reg,
                "online_hours" => &mut row.online_hours,
                "acceptance_rate" => &mut row.acceptance_rate,
                "xero_balance" => &mut row.xero_balance,
                "payments" => &mut row.payments,
                _ => &mut row.trip_count,
            };
            *slot = Some(value.to_string());
        }
        rows.push(row);
    }

    debug!(rows = rows.len(), truncated, "engagement csv parsed");
    Ok(ParsedCsv { rows, truncated })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_normalisation_folds_punctuation() {
        assert_eq!(normalize_header("WhatsApp Number"), "whatsapp_number");
        assert_eq!(normalize_header("  Acceptance-Rate (%) "), "acceptance_rate");
        assert_eq!(normalize_header("7D Payments"), "7d_payments");
    }

    #[test]
    fn alias_mapped_headers_fill_the_fixed_field_set() {
        let csv = "Driver Name,WhatsApp Number,Type,7D Payments\n\
                   Thabo Mokoena,0831234567,inactive_7d,1500\n";
        let parsed = parse_csv(csv.as_bytes(), 100).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        let row = &parsed.rows[0];
        assert_eq!(row.display_name.as_deref(), Some("Thabo Mokoena"));
        assert_eq!(row.wa_id().as_deref(), Some("27831234567"));
        assert_eq!(row.driver_type.as_deref(), Some("inactive_7d"));
        assert_eq!(row.payments.as_deref(), Some("1500"));
        assert_eq!(row.first_name(), Some("Thabo"));
    }

    #[test]
    fn latin1_upload_decodes() {
        let mut bytes = b"name,whatsapp\nJos".to_vec();
        bytes.push(0xE9); // é in Latin-1, invalid UTF-8 on its own
        bytes.extend_from_slice(b",0831234567\n");
        let parsed = parse_csv(&bytes, 100).unwrap();
        assert_eq!(parsed.rows[0].display_name.as_deref(), Some("Jos\u{e9}"));
    }

    #[test]
    fn row_cap_truncates() {
        let mut csv = String::from("whatsapp\n");
        for i in 0..5 {
            csv.push_str(&format!("08312345{i:02}\n"));
        }
        let parsed = parse_csv(csv.as_bytes(), 3).unwrap();
        assert_eq!(parsed.rows.len(), 3);
        assert!(parsed.truncated);
    }

    #[test]
    fn missing_phone_column_is_rejected() {
        let csv = "name,type\nThabo,inactive\n";
        assert!(parse_csv(csv.as_bytes(), 100).is_err());
    }

    #[test]
    fn junk_phone_yields_no_wa_id() {
        let row = CsvDriverRow {
            whatsapp: Some("n/a".into()),
            ..Default::default()
        };
        assert_eq!(row.wa_id(), None);
    }
}
