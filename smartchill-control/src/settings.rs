// Copyright (c) 2026, SmartChill Project Contributors.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
// 1. Redistributions of source code must retain the above copyright
//    notice, this list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright
//    notice, this list of conditions and the following disclaimer in the
//    documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its
//    contributors may be used to endorse or promote products derived
//    from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! A control service's own settings document: `defaults` plus a per-device
//! override map (§4.6, §6 "Persisted state layout"). Persisted the same way
//! the Registry persists its document — writing to a sibling `.tmp` path,
//! `fsync`ing it, and renaming it into place — but guarded by this service's
//! own lock rather than the Registry's, per §5 "Shared-resource policy".

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use smartchill_api::config_protocol::validate_update;
use smartchill_api::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(default)]
    pub config_version: u64,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub defaults: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub devices: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

impl SettingsDocument {
    pub fn seed(defaults: BTreeMap<String, serde_json::Value>) -> Self {
        SettingsDocument {
            config_version: 1,
            last_update: Utc::now(),
            defaults,
            devices: BTreeMap::new(),
        }
    }

    /// The effective configuration for a device: its own overrides layered
    /// on top of `defaults`.
    pub fn effective_config(&self, device_id: &str) -> BTreeMap<String, serde_json::Value> {
        let mut merged = self.defaults.clone();
        if let Some(overrides) = self.devices.get(device_id) {
            for (k, v) in overrides {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }

    /// Ensures a device has a settings entry (possibly empty, meaning "use
    /// defaults"), the way auto-registration creates a default entry for a
    /// newly-seen device (§4.6 "Auto-registration of devices").
    pub fn ensure_device(&mut self, device_id: &str) {
        self.devices.entry(device_id.to_string()).or_default();
    }

    pub fn has_device(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    /// Validates and applies an update mapping, bumping `configVersion` on
    /// success (§8 "Round-trips: Config"). Returns the subset actually
    /// applied.
    pub fn apply_update(
        &mut self,
        device_id: &str,
        update: &BTreeMap<String, serde_json::Value>,
    ) -> Result<BTreeMap<String, serde_json::Value>> {
        validate_update(update)?;

        let entry = self.devices.entry(device_id.to_string()).or_default();
        for (k, v) in update {
            entry.insert(k.clone(), v.clone());
        }
        self.config_version += 1;
        Ok(update.clone())
    }
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SettingsStore { path: path.into() }
    }

    pub async fn load(&self, default_defaults: BTreeMap<String, serde_json::Value>) -> Result<SettingsDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::Persistence(format!("corrupt settings file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file found, seeding defaults");
                Ok(SettingsDocument::seed(default_defaults))
            }
            Err(e) => Err(Error::Persistence(format!(
                "could not read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    pub async fn save(&self, doc: &mut SettingsDocument) -> Result<()> {
        doc.last_update = Utc::now();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::Persistence(format!("could not create settings directory: {}", e))
                })?;
            }
        }

        let tmp_path = tmp_path_for(&self.path);
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| Error::Persistence(format!("could not serialize settings: {}", e)))?;

        {
            let mut tmp_file = tokio::fs::File::create(&tmp_path)
                .await
                .map_err(|e| Error::Persistence(format!("could not create tmp settings file: {}", e)))?;

            tmp_file
                .write_all(&bytes)
                .await
                .map_err(|e| Error::Persistence(format!("could not write settings: {}", e)))?;

            tmp_file
                .sync_all()
                .await
                .map_err(|e| Error::Persistence(format!("could not fsync settings: {}", e)))?;
        }

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| Error::Persistence(format!("could not replace settings file: {}", e)))?;

        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

pub fn log_save_failure(e: &Error) {
    warn!(error = %e, "settings save failed; in-memory state retains the change");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> BTreeMap<String, serde_json::Value> {
        let mut d = BTreeMap::new();
        d.insert("max_door_open_seconds".into(), serde_json::json!(60));
        d
    }

    #[test]
    fn effective_config_layers_overrides_on_defaults() {
        let mut doc = SettingsDocument::seed(defaults());
        doc.devices.insert(
            "SmartChill_112233".into(),
            BTreeMap::from([("max_door_open_seconds".into(), serde_json::json!(120))]),
        );

        let effective = doc.effective_config("SmartChill_112233");
        assert_eq!(effective["max_door_open_seconds"], serde_json::json!(120));

        let unseen = doc.effective_config("SmartChill_other");
        assert_eq!(unseen["max_door_open_seconds"], serde_json::json!(60));
    }

    #[test]
    fn apply_update_rejects_out_of_range_and_leaves_version_unchanged() {
        let mut doc = SettingsDocument::seed(defaults());
        let before = doc.config_version;

        let mut update = BTreeMap::new();
        update.insert("max_door_open_seconds".into(), serde_json::json!(10));

        let err = doc.apply_update("SmartChill_112233", &update).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(doc.config_version, before);
    }

    #[test]
    fn apply_update_bumps_version_on_success() {
        let mut doc = SettingsDocument::seed(defaults());
        let before = doc.config_version;

        let mut update = BTreeMap::new();
        update.insert("max_door_open_seconds".into(), serde_json::json!(90));

        doc.apply_update("SmartChill_112233", &update).unwrap();
        assert_eq!(doc.config_version, before + 1);
        assert_eq!(
            doc.effective_config("SmartChill_112233")["max_door_open_seconds"],
            serde_json::json!(90)
        );
    }
}
