// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring: builds the shared collaborators from configuration and runs
//! either the long-lived server or a one-shot campaign command.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dineo_config::DineoConfig;
use dineo_config::model::{LlmConfig, WhatsAppConfig};
use dineo_context::ContextStore;
use dineo_core::time::now_jhb;
use dineo_core::{DineoError, Paraphraser, Transcriber, WhatsAppAdapter};
use dineo_dialogue::{DialogueConfig, Dispatcher};
use dineo_drivers::DriverResolver;
use dineo_engagement::{build_preview, build_report, launch, parse_csv, run_send};
use dineo_gateway::{GatewayState, start_server};
use dineo_llm::AnthropicParaphraser;
use dineo_reply::ReplyComposer;
use dineo_storage::queries::engagement;
use dineo_storage::{Database, MessageLogger};
use dineo_tickets::TicketService;
use dineo_whatsapp::CloudApiClient;
use dineo_workers::{CheckinWorker, FollowupWorker, IntradayWorker, NudgeWorker};
use tracing::{info, warn};

use crate::dryrun::DryRunAdapter;

/// Warehouse roster rows change slowly; five minutes bounds staleness.
const RESOLVER_TTL_SECS: u64 = 300;

struct App {
    db: Database,
    adapter: Arc<dyn WhatsAppAdapter>,
    logger: MessageLogger,
    store: ContextStore,
    resolver: Arc<DriverResolver>,
}

async fn build_app(config: &DineoConfig) -> Result<App, DineoError> {
    let db = Database::open(&config.storage.database_path).await?;
    let logger = MessageLogger::initialize(&db).await?;
    let store = ContextStore::new(&config.storage.context_dir, db.clone())?;
    let resolver = Arc::new(DriverResolver::new(
        db.clone(),
        Duration::from_secs(RESOLVER_TTL_SECS),
    ));
    let adapter = build_adapter(&config.whatsapp)?;
    Ok(App {
        db,
        adapter,
        logger,
        store,
        resolver,
    })
}

fn build_adapter(config: &WhatsAppConfig) -> Result<Arc<dyn WhatsAppAdapter>, DineoError> {
    let adapter: Arc<dyn WhatsAppAdapter> =
        if config.access_token.is_some() && config.phone_number_id.is_some() {
            Arc::new(CloudApiClient::from_config(config)?)
        } else {
            warn!("whatsapp credentials not configured, sends are dry-run");
            Arc::new(DryRunAdapter)
        };
    Ok(adapter)
}

/// The paraphraser and transcriber are one client; either both exist or
/// the composer and gateway fall back to deterministic behaviour.
fn build_llm(
    config: &LlmConfig,
) -> Result<(Option<Arc<dyn Paraphraser>>, Option<Arc<dyn Transcriber>>), DineoError> {
    if !config.enabled {
        return Ok((None, None));
    }
    let client = Arc::new(AnthropicParaphraser::from_config(config)?);
    let paraphraser: Arc<dyn Paraphraser> = client.clone();
    let transcriber: Arc<dyn Transcriber> = client;
    Ok((Some(paraphraser), Some(transcriber)))
}

/// Start the gateway and the scheduled workers; runs until the process
/// is stopped.
pub async fn run(config: DineoConfig) -> Result<(), DineoError> {
    let app = build_app(&config).await?;
    let (paraphraser, transcriber) = build_llm(&config.llm)?;

    let tickets = TicketService::new(app.db.clone(), app.adapter.clone(), app.logger.clone());
    let dispatcher = Arc::new(Dispatcher::new(
        app.db.clone(),
        tickets,
        app.resolver.clone(),
        DialogueConfig::from_config(&config),
    ));
    let composer = Arc::new(ReplyComposer::new(
        config.assistant.name.clone(),
        paraphraser,
    ));

    if config.nudge.enabled {
        tokio::spawn(
            NudgeWorker::new(
                app.db.clone(),
                app.adapter.clone(),
                app.resolver.clone(),
                app.logger.clone(),
                app.store.clone(),
                config.nudge.clone(),
            )
            .run(),
        );
    }
    if config.intraday.enabled {
        tokio::spawn(
            IntradayWorker::new(
                app.db.clone(),
                app.adapter.clone(),
                app.resolver.clone(),
                app.logger.clone(),
                app.store.clone(),
                config.intraday.clone(),
                config.engagement.target_trips,
            )
            .run(),
        );
    }
    if config.engagement.followup_enabled {
        tokio::spawn(
            FollowupWorker::new(
                app.db.clone(),
                app.adapter.clone(),
                app.logger.clone(),
                app.store.clone(),
                config.engagement.clone(),
                config.whatsapp.template_language.clone(),
            )
            .run(),
        );
    }
    if config.checkin.enabled {
        tokio::spawn(
            CheckinWorker::new(app.db.clone(), app.adapter.clone(), app.logger.clone()).run(),
        );
    }

    info!(assistant = %config.assistant.name, "starting gateway");
    let state = GatewayState::new(
        &config.gateway,
        app.db,
        app.adapter,
        transcriber,
        app.resolver,
        app.store,
        app.logger,
        dispatcher,
        composer,
    );
    start_server(&config.gateway, state).await
}

/// Parse, preview, launch and send a campaign in one pass, printing the
/// preview counts and the final tallies.
pub async fn run_campaign_send(
    config: &DineoConfig,
    csv_path: &Path,
    templates: &str,
) -> Result<(), DineoError> {
    let app = build_app(config).await?;
    let template_map: serde_json::Value = serde_json::from_str(templates)
        .map_err(|e| DineoError::Config(format!("invalid template map JSON: {e}")))?;
    let bytes = std::fs::read(csv_path)
        .map_err(|e| DineoError::Config(format!("cannot read {}: {e}", csv_path.display())))?;

    let parsed = parse_csv(&bytes, config.engagement.max_rows)?;
    let preview = build_preview(&app.db, &parsed, &template_map).await?;
    let c = &preview.counts;
    println!(
        "preview: {} rows ({} ready, {} missing wa, {} duplicate, {} template missing, {} missing vars)",
        c.total, c.ready, c.missing_wa, c.duplicate, c.template_missing, c.missing_vars
    );
    if preview.truncated {
        println!("note: input truncated at {} rows", config.engagement.max_rows);
    }

    let source = csv_path.file_name().and_then(|n| n.to_str());
    let campaign_id = launch(&app.db, &preview, &template_map, source).await?;
    run_send(
        &app.db,
        app.adapter.as_ref(),
        &app.resolver,
        &app.store,
        &campaign_id,
        &config.whatsapp.template_language,
    )
    .await?;

    if let Some(campaign) = engagement::get_campaign(&app.db, &campaign_id).await? {
        println!(
            "campaign {}: {} sent, {} failed, {} skipped",
            campaign.id, campaign.sent_count, campaign.failed_count, campaign.skipped_count
        );
    }
    Ok(())
}

pub async fn run_campaign_report(
    config: &DineoConfig,
    campaign_id: &str,
) -> Result<(), DineoError> {
    let app = build_app(config).await?;
    let report = build_report(
        &app.db,
        &app.resolver,
        &app.logger,
        &config.engagement,
        campaign_id,
        now_jhb(),
    )
    .await?;

    println!(
        "campaign {}: {} sent, {} responded, {} committed, {} promise-to-pay",
        report.campaign_id, report.sent, report.responded, report.committed, report.ptp
    );
    for row in &report.rows {
        println!(
            "  {}  hours {:+.1} ({:.1} -> {:.1})  trips {:+} ({} -> {}){}",
            row.wa_id,
            row.hours_delta,
            row.baseline_online_hours,
            row.current_online_hours,
            row.trips_delta,
            row.baseline_trips,
            row.current_trips,
            if row.committed { "  committed" } else { "" }
        );
    }
    Ok(())
}
