// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed context store with a best-effort database mirror.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use dineo_core::DineoError;
use dineo_core::types::ConcernType;
use dineo_core::wa::normalize_wa_id;
use dineo_storage::queries::context_memory;
use dineo_storage::{ContextMemoryRow, Database};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::keys;

/// A driver's context map with typed accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverContext {
    map: Map<String, Value>,
}

impl DriverContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.map.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.map.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).and_then(Value::as_bool)
    }

    pub fn get_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.map.get(key).and_then(Value::as_object)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.map.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// True when the driver has opted out of coaching messages.
    pub fn opted_out(&self) -> bool {
        self.get_bool(keys::GLOBAL_OPT_OUT).unwrap_or(false)
    }

    /// Remove every underscore-prefixed concern block in `block_keys`, and
    /// the active-concern marker when it points at one of them.
    pub fn clear_concern_blocks(&mut self, block_keys: &[&str]) {
        for key in block_keys {
            self.map.remove(*key);
        }
        let active_key = self
            .get_object(keys::ACTIVE_CONCERN)
            .and_then(|obj| obj.get("type"))
            .and_then(Value::as_str)
            .and_then(|t| ConcernType::from_str(t).ok())
            .map(|c| c.context_key());
        if active_key.is_some_and(|k| block_keys.contains(&k)) {
            self.map.remove(keys::ACTIVE_CONCERN);
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }
}

/// One JSON file per driver under the configured context directory.
#[derive(Clone)]
pub struct ContextStore {
    dir: PathBuf,
    db: Database,
}

impl ContextStore {
    /// Create the store, ensuring the context directory exists.
    pub fn new(dir: impl AsRef<Path>, db: Database) -> Result<Self, DineoError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| DineoError::Context {
            message: format!("cannot create context dir {}", dir.display()),
            source: Some(Box::new(e)),
        })?;
        Ok(Self { dir, db })
    }

    fn path_for(&self, wa_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", normalize_wa_id(wa_id)))
    }

    /// Load a driver's context. Never fails: a missing, unreadable or corrupt
    /// file yields an empty context and a warning.
    pub fn load(&self, wa_id: &str) -> DriverContext {
        let path = self.path_for(wa_id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return DriverContext::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "context file unreadable, starting empty");
                return DriverContext::new();
            }
        };
        match serde_json::from_str::<Map<String, Value>>(&raw) {
            Ok(map) => DriverContext::from_map(map),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "context file corrupt, starting empty");
                DriverContext::new()
            }
        }
    }

    /// Persist a driver's context atomically, then mirror the highlights to
    /// the database. The mirror is best-effort: a mirror failure is logged
    /// and swallowed, the file write is the one that matters.
    pub async fn save(
        &self,
        wa_id: &str,
        context: &DriverContext,
        now_iso: &str,
    ) -> Result<(), DineoError> {
        let wa_id = normalize_wa_id(wa_id);
        let path = self.path_for(&wa_id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(context.as_map()).map_err(|e| {
            DineoError::Context {
                message: "context serialization failed".into(),
                source: Some(Box::new(e)),
            }
        })?;
        std::fs::write(&tmp, body).map_err(|e| DineoError::Context {
            message: format!("cannot write {}", tmp.display()),
            source: Some(Box::new(e)),
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| DineoError::Context {
            message: format!("cannot replace {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        debug!(wa_id, "context saved");

        let prefs: Map<String, Value> = context
            .as_map()
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let row = ContextMemoryRow {
            wa_id: wa_id.clone(),
            last_intent: context.get_str(keys::LAST_INTENT).map(str::to_string),
            last_reply: context.get_str(keys::LAST_REPLY).map(str::to_string),
            prefs_json: Value::Object(prefs).to_string(),
            updated_at: now_iso.to_string(),
        };
        if let Err(e) = context_memory::upsert_context(&self.db, &row).await {
            warn!(wa_id, error = %e, "context mirror write failed");
        }
        Ok(())
    }

    /// Delete a driver's context file and mirror row contents.
    pub async fn reset(&self, wa_id: &str, now_iso: &str) -> Result<(), DineoError> {
        let wa_id = normalize_wa_id(wa_id);
        let path = self.path_for(&wa_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DineoError::Context {
                    message: format!("cannot remove {}", path.display()),
                    source: Some(Box::new(e)),
                });
            }
        }
        self.save(&wa_id, &DriverContext::new(), now_iso).await
    }
}
