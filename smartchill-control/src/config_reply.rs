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

//! Handles an incoming `config_update` message for one device (§4.6): either
//! a `get_config` request or an update mapping, replying on `config_data`,
//! `config_ack`, or `config_error` as appropriate. Shared by all three
//! control services since the protocol is identical; only the settings
//! document differs.

use crate::settings::SettingsDocument;
use chrono::Utc;
use serde_json::Value;
use smartchill_api::config_protocol::{
    is_get_config_request, ConfigAckReply, ConfigDataReply, ConfigErrorReply,
};
use std::collections::BTreeMap;

pub enum ConfigReply {
    Data(ConfigDataReply),
    Ack(ConfigAckReply),
    Error(ConfigErrorReply),
}

impl ConfigReply {
    pub fn topic_suffix(&self) -> &'static str {
        match self {
            ConfigReply::Data(_) => "config_data",
            ConfigReply::Ack(_) => "config_ack",
            ConfigReply::Error(_) => "config_error",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ConfigReply::Data(r) => serde_json::to_value(r).expect("ConfigDataReply always serializes"),
            ConfigReply::Ack(r) => serde_json::to_value(r).expect("ConfigAckReply always serializes"),
            ConfigReply::Error(r) => serde_json::to_value(r).expect("ConfigErrorReply always serializes"),
        }
    }
}

/// Dispatches one `config_update` payload against a device's settings.
pub fn handle_config_update(
    settings: &mut SettingsDocument,
    device_id: &str,
    payload: &Value,
) -> ConfigReply {
    if is_get_config_request(payload) {
        return ConfigReply::Data(ConfigDataReply {
            device_id: device_id.to_string(),
            timestamp: Utc::now(),
            config: settings.effective_config(device_id),
            config_version: settings.config_version,
        });
    }

    let update: BTreeMap<String, Value> = match payload.as_object() {
        Some(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        None => {
            return ConfigReply::Error(ConfigErrorReply {
                device_id: device_id.to_string(),
                timestamp: Utc::now(),
                error: "payload must be a JSON object".into(),
            })
        }
    };

    match settings.apply_update(device_id, &update) {
        Ok(applied) => ConfigReply::Ack(ConfigAckReply {
            device_id: device_id.to_string(),
            timestamp: Utc::now(),
            updated_config: applied,
            config_version: settings.config_version,
        }),
        Err(e) => ConfigReply::Error(ConfigErrorReply {
            device_id: device_id.to_string(),
            timestamp: Utc::now(),
            error: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> SettingsDocument {
        let mut defaults = BTreeMap::new();
        defaults.insert("max_door_open_seconds".into(), json!(60));
        SettingsDocument::seed(defaults)
    }

    #[test]
    fn get_config_returns_effective_config() {
        let settings = settings();
        let reply = handle_config_update(&mut settings.clone(), "d1", &json!({ "request": "get_config" }));
        assert_eq!(reply.topic_suffix(), "config_data");
    }

    #[test]
    fn valid_update_acks_and_bumps_version() {
        let mut settings = settings();
        let reply = handle_config_update(&mut settings, "d1", &json!({ "max_door_open_seconds": 90 }));
        assert_eq!(reply.topic_suffix(), "config_ack");
        assert_eq!(settings.config_version, 2);
    }

    #[test]
    fn out_of_range_update_errors_and_leaves_version() {
        let mut settings = settings();
        let reply = handle_config_update(&mut settings, "d1", &json!({ "max_door_open_seconds": 10 }));
        assert_eq!(reply.topic_suffix(), "config_error");
        assert_eq!(settings.config_version, 1);
    }
}
