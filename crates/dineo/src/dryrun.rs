// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dry-run transport used when the Cloud API is not configured.
//!
//! Every send is logged and acknowledged with a synthetic message id, so
//! the whole pipeline (workers included) can run against a staging
//! database without touching WhatsApp.

use async_trait::async_trait;
use dineo_core::types::TemplateSend;
use dineo_core::{DineoError, WhatsAppAdapter};
use tracing::info;
use uuid::Uuid;

pub struct DryRunAdapter;

fn synthetic_id() -> Option<String> {
    Some(format!("dryrun.{}", Uuid::new_v4()))
}

#[async_trait]
impl WhatsAppAdapter for DryRunAdapter {
    async fn send_text(&self, wa_id: &str, body: &str) -> Result<Option<String>, DineoError> {
        info!(%wa_id, body, "dry-run text send");
        Ok(synthetic_id())
    }

    async fn send_template(
        &self,
        wa_id: &str,
        template: &TemplateSend,
    ) -> Result<Option<String>, DineoError> {
        info!(%wa_id, template = %template.name, "dry-run template send");
        Ok(synthetic_id())
    }

    async fn upload_media(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<Option<String>, DineoError> {
        info!(size = bytes.len(), mime_type, "dry-run media upload");
        Ok(synthetic_id())
    }

    async fn fetch_media_url(&self, _media_id: &str) -> Result<Option<String>, DineoError> {
        Ok(None)
    }

    async fn download_bytes(&self, _url: &str) -> Result<Vec<u8>, DineoError> {
        Ok(Vec::new())
    }
}
