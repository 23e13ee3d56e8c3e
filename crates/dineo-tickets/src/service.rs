// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket operations shared by the dialogue machines and the admin paths.

use std::sync::Arc;

use dineo_core::time::now_iso;
use dineo_core::types::{ConcernType, Location, Ticket, TicketLog, is_closed_status};
use dineo_core::{DineoError, WhatsAppAdapter};
use dineo_storage::queries::{ticket_logs, tickets};
use dineo_storage::{Database, MessageLogEntry, MessageLogger};
use tracing::{info, warn};

pub struct TicketService {
    db: Database,
    adapter: Arc<dyn WhatsAppAdapter>,
    logger: MessageLogger,
}

impl TicketService {
    pub fn new(db: Database, adapter: Arc<dyn WhatsAppAdapter>, logger: MessageLogger) -> Self {
        Self {
            db,
            adapter,
            logger,
        }
    }

    /// The most recent open ticket of the concern's type, or a fresh one.
    /// Returns `(ticket, created)`.
    pub async fn open_or_reuse(
        &self,
        wa_id: &str,
        concern: ConcernType,
        initial_message: Option<&str>,
    ) -> Result<(Ticket, bool), DineoError> {
        let issue_type = concern.to_string();
        if let Some(ticket) =
            tickets::find_open_for_driver(&self.db, wa_id, &[issue_type.as_str()]).await?
        {
            return Ok((ticket, false));
        }
        let now = now_iso();
        let id = tickets::create_ticket(&self.db, wa_id, &issue_type, initial_message, &now).await?;
        ticket_logs::log_event(&self.db, id, None, "created", None, Some("collecting"), None, &now)
            .await?;
        info!(ticket_id = id, wa_id, issue_type, "ticket opened");
        let ticket = tickets::get_ticket(&self.db, id)
            .await?
            .ok_or(DineoError::TicketNotFound { ticket_id: id })?;
        Ok((ticket, true))
    }

    pub async fn get(&self, ticket_id: i64) -> Result<Ticket, DineoError> {
        tickets::get_ticket(&self.db, ticket_id)
            .await?
            .ok_or(DineoError::TicketNotFound { ticket_id })
    }

    /// Append a media URL to the ticket's evidence list.
    pub async fn append_media(&self, ticket_id: i64, url: &str) -> Result<(), DineoError> {
        tickets::append_media(&self.db, ticket_id, url, &now_iso()).await
    }

    /// Overwrite the ticket's location and stash the raw payload in metadata.
    pub async fn update_location(
        &self,
        ticket_id: i64,
        location: &Location,
    ) -> Result<(), DineoError> {
        let raw = serde_json::to_value(location).map_err(|e| DineoError::Internal(e.to_string()))?;
        tickets::update_location(
            &self.db,
            ticket_id,
            location.lat,
            location.lng,
            location
                .address
                .as_deref()
                .or(location.name.as_deref()),
            Some(&raw),
            &now_iso(),
        )
        .await
    }

    /// JSON merge-patch the ticket metadata.
    pub async fn update_metadata(
        &self,
        ticket_id: i64,
        patch: &serde_json::Value,
    ) -> Result<(), DineoError> {
        tickets::merge_metadata(&self.db, ticket_id, patch, &now_iso()).await
    }

    /// Transition status, append the audit event, and on entry into a
    /// closed status send the driver-facing closure message. Returns the
    /// previous status.
    pub async fn update_status(
        &self,
        ticket_id: i64,
        new_status: &str,
        admin_email: Option<&str>,
        note: Option<&str>,
    ) -> Result<String, DineoError> {
        let now = now_iso();
        let previous = tickets::update_status(&self.db, ticket_id, new_status, &now).await?;
        ticket_logs::log_event(
            &self.db,
            ticket_id,
            admin_email,
            "status_change",
            Some(&previous),
            Some(new_status),
            note,
            &now,
        )
        .await?;

        if is_closed_status(new_status) && !is_closed_status(&previous) {
            self.dispatch_closure_message(ticket_id).await?;
        }
        Ok(previous)
    }

    /// All audit events for a ticket, oldest first.
    pub async fn events(&self, ticket_id: i64) -> Result<Vec<TicketLog>, DineoError> {
        ticket_logs::events_for_ticket(&self.db, ticket_id).await
    }

    /// Most recent open ticket across the given concern types.
    pub async fn find_open(
        &self,
        wa_id: &str,
        concerns: &[ConcernType],
    ) -> Result<Option<Ticket>, DineoError> {
        let names: Vec<String> = concerns.iter().map(ToString::to_string).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        tickets::find_open_for_driver(&self.db, wa_id, &refs).await
    }

    /// Send and log the closure notification. A send failure is recoverable:
    /// the ticket is already closed, the driver just misses the courtesy note.
    async fn dispatch_closure_message(&self, ticket_id: i64) -> Result<(), DineoError> {
        let ticket = self.get(ticket_id).await?;
        let body = closure_message(&ticket);
        let message_id = self.adapter.send_text(&ticket.wa_id, &body).await?;
        if message_id.is_none() {
            warn!(ticket_id, wa_id = %ticket.wa_id, "closure message send failed");
        }
        let entry = MessageLogEntry {
            wa_id: ticket.wa_id.clone(),
            direction: "OUTBOUND".into(),
            message_text: Some(body),
            intent: Some("ticket_closure".into()),
            wa_message_id: message_id,
            logged_at: now_iso(),
            ..Default::default()
        };
        if let Err(e) = self.logger.log(&self.db, &entry).await {
            warn!(ticket_id, error = %e, "closure message log failed");
        }
        Ok(())
    }
}

/// Driver-facing wording on closure. Proof-of-payment tickets get the
/// Finance-specific line.
fn closure_message(ticket: &Ticket) -> String {
    if ticket.issue_type == ConcernType::CashPop.to_string() {
        "Finance has confirmed your payment. The amount will reflect on your account once \
         it's allocated. Thanks for sending the proof of payment."
            .to_string()
    } else {
        format!(
            "Good news - your {} ticket (#{}) has been resolved. If anything still isn't right, \
             just reply here and I'll reopen it.",
            ticket.issue_type.replace('_', " "),
            ticket.id
        )
    }
}
