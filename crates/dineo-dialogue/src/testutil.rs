// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test fixtures shared by the dispatcher and machine tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone};
use dineo_config::DineoConfig;
use dineo_core::time::jhb_offset;
use dineo_core::types::{Intent, MessageKind};
use dineo_drivers::DriverResolver;
use dineo_storage::{Database, MessageLogger};
use dineo_test_utils::MockWhatsApp;
use dineo_tickets::TicketService;
use tempfile::tempdir;

use crate::dispatcher::{DialogueConfig, Dispatcher, Turn};

pub(crate) async fn dispatcher() -> (Dispatcher, Arc<MockWhatsApp>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("d.db").to_str().unwrap())
        .await
        .unwrap();
    let adapter = Arc::new(MockWhatsApp::new());
    let logger = MessageLogger::initialize(&db).await.unwrap();
    let tickets = TicketService::new(db.clone(), adapter.clone(), logger);
    let resolver = Arc::new(DriverResolver::new(db.clone(), Duration::from_secs(60)));
    let config = DialogueConfig::from_config(&DineoConfig::default());
    (Dispatcher::new(db, tickets, resolver, config), adapter, dir)
}

pub(crate) fn test_now() -> DateTime<FixedOffset> {
    jhb_offset().with_ymd_and_hms(2026, 2, 3, 10, 0, 0).unwrap()
}

pub(crate) fn turn<'a>(kind: &'a MessageKind, intent: Intent) -> Turn<'a> {
    Turn {
        wa_id: "27831234567",
        driver: None,
        kind,
        intent,
        now: test_now(),
    }
}
