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

//! The per-device configuration protocol shared by every Control
//! Service (§4.6) — the allow-list of keys, their ranges, and the
//! request/reply payload shapes carried over `config_update` /
//! `config_data` / `config_ack` / `config_error`.

use crate::error::Error;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One entry of the §4.6 key table.
#[derive(Debug, Clone, Copy)]
pub struct KeySpec {
    pub key: &'static str,
    pub range: Range,
}

#[derive(Debug, Clone, Copy)]
pub enum Range {
    Int(i64, i64),
    Float(f64, f64),
    Bool,
}

/// The full allow-list from the §4.6 table, shared by all three
/// control services. A service only ever validates the subset of keys
/// relevant to it (its own settings schema determines which are
/// present), but the range rules are identical everywhere a key
/// appears.
pub const KEY_SPECS: &[KeySpec] = &[
    KeySpec { key: "max_door_open_seconds", range: Range::Int(30, 300) },
    KeySpec { key: "check_interval", range: Range::Int(1, 30) },
    KeySpec { key: "enable_door_closed_alerts", range: Range::Bool },
    KeySpec { key: "gas_threshold_ppm", range: Range::Int(100, 1000) },
    KeySpec { key: "alert_cooldown_minutes", range: Range::Int(5, 120) },
    KeySpec { key: "enable_continuous_alerts", range: Range::Bool },
    KeySpec { key: "temp_min_celsius", range: Range::Float(-5.0, 5.0) },
    KeySpec { key: "temp_max_celsius", range: Range::Float(5.0, 15.0) },
    KeySpec { key: "humidity_max_percent", range: Range::Float(50.0, 95.0) },
    KeySpec { key: "enable_malfunction_alerts", range: Range::Bool },
];

fn spec_for(key: &str) -> Option<&'static KeySpec> {
    KEY_SPECS.iter().find(|s| s.key == key)
}

/// Validates a single `(key, value)` pair against the §4.6 allow-list.
/// Returns a short human-readable reason on failure, referencing the
/// key's range, matching the `config_error` wording scenario #5 in §8.
pub fn validate_key(key: &str, value: &Value) -> Result<(), String> {
    let spec = spec_for(key).ok_or_else(|| format!("unknown config key '{}'", key))?;

    match spec.range {
        Range::Int(lo, hi) => {
            let n = value
                .as_i64()
                .ok_or_else(|| format!("'{}' must be an integer", key))?;
            if (lo..=hi).contains(&n) {
                Ok(())
            } else {
                Err(format!("'{}' must be between {} and {}", key, lo, hi))
            }
        }
        Range::Float(lo, hi) => {
            let n = value
                .as_f64()
                .ok_or_else(|| format!("'{}' must be a number", key))?;
            if (lo..=hi).contains(&n) {
                Ok(())
            } else {
                Err(format!("'{}' must be between {} and {}", key, lo, hi))
            }
        }
        Range::Bool => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(format!("'{}' must be a boolean", key))
            }
        }
    }
}

/// Validates an entire update mapping, short-circuiting on the first
/// invalid or unknown key. Matches §4.6 "validates each key against
/// the allow-list and range rules".
pub fn validate_update(update: &BTreeMap<String, Value>) -> Result<(), Error> {
    for (key, value) in update {
        validate_key(key, value).map_err(Error::Validation)?;
    }
    Ok(())
}

/// Payload carried on `config_update` to request the merged effective
/// configuration instead of applying an update.
#[derive(Debug, Clone, Deserialize)]
pub struct GetConfigRequest {
    pub request: String,
}

pub fn is_get_config_request(payload: &Value) -> bool {
    payload
        .get("request")
        .and_then(Value::as_str)
        .map(|r| r == "get_config")
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigDataReply {
    pub device_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub config: BTreeMap<String, Value>,
    #[serde(rename = "configVersion")]
    pub config_version: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigAckReply {
    pub device_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub updated_config: BTreeMap<String, Value>,
    #[serde(rename = "configVersion")]
    pub config_version: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigErrorReply {
    pub device_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_boundary_values() {
        assert!(validate_key("max_door_open_seconds", &json!(30)).is_ok());
        assert!(validate_key("max_door_open_seconds", &json!(300)).is_ok());
    }

    #[test]
    fn rejects_values_outside_boundary() {
        assert!(validate_key("max_door_open_seconds", &json!(29)).is_err());
        assert!(validate_key("max_door_open_seconds", &json!(301)).is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(validate_key("not_a_real_key", &json!(1)).is_err());
    }

    #[test]
    fn error_message_references_the_range() {
        let err = validate_key("max_door_open_seconds", &json!(10)).unwrap_err();

        assert!(err.contains("30"));
        assert!(err.contains("300"));
    }
}
