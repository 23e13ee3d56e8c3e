// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engagement campaign pipeline.
//!
//! A campaign starts as an admin-uploaded CSV of drivers. The pipeline
//! ingests it ([`ingest`]), previews the template assignment per row
//! ([`preview`]), sends the approved templates in a background task
//! ([`send`]) and later reports KPI uplift against the baseline snapshot
//! captured at send time ([`report`]).

pub mod ingest;
pub mod preview;
pub mod report;
pub mod send;

pub use ingest::{CsvDriverRow, ParsedCsv, parse_csv};
pub use preview::{CampaignPreview, PreviewCounts, PreviewRow, RowStatus, build_preview};
pub use report::{RowUplift, UpliftReport, build_report};
pub use send::{launch, run_send, spawn_send};
