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

//! Device records and the MAC-derived identity scheme (§3 of the design).

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalizes a MAC address to 12 uppercase hex characters, stripping
/// `:` and `-` separators. Returns `Error::Validation` if the result
/// isn't exactly 12 hex digits.
pub fn normalize_mac(mac: &str) -> Result<String> {
    let clean: String = mac
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect::<String>()
        .to_uppercase();

    if clean.len() == 12 && clean.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(clean)
    } else {
        Err(Error::Validation(format!(
            "'{}' is not a 12-digit hex MAC address",
            mac
        )))
    }
}

/// Derives the canonical `deviceID` from a MAC address: `SmartChill_`
/// followed by the last six characters of the normalized MAC.
pub fn derive_device_id(mac: &str) -> Result<String> {
    let clean = normalize_mac(mac)?;

    Ok(format!("SmartChill_{}", &clean[clean.len() - 6..]))
}

/// MQTT endpoint template carried by a device model descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default)]
    pub qos: Option<u8>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Describes a supported device model: the sensors it carries and the
/// MQTT configuration template applied to every device of that model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceModel {
    #[serde(default)]
    pub sensors: Vec<String>,
    #[serde(default)]
    pub mqtt: MqttConfig,
}

/// A registered SmartChill device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    pub mac_address: String,
    pub model: String,
    pub firmware_version: String,
    pub sensors: Vec<String>,
    pub mqtt_topics: Vec<String>,
    pub mqtt_config: MqttConfig,
    pub status: String,
    pub user_assigned: bool,

    // The source refers to this field as both `owner` and
    // `assigned_user` in different places (see the Open Questions in
    // §9). We emit `owner` but accept either on input.
    #[serde(alias = "assigned_user")]
    pub owner: Option<String>,

    pub user_device_name: Option<String>,
    pub registration_time: DateTime<Utc>,
    pub assignment_time: Option<DateTime<Utc>>,
    pub last_sync: DateTime<Utc>,
}

impl Device {
    /// Builds the full set of MQTT topics for this device: one per
    /// sensor plus the door-event topic (§3, "Derived topics").
    pub fn derive_topics(model: &str, device_id: &str, sensors: &[String]) -> Vec<String> {
        let mut topics: Vec<String> = sensors
            .iter()
            .map(|s| format!("Group17/SmartChill/Devices/{}/{}/{}", model, device_id, s))
            .collect();

        topics.push(format!(
            "Group17/SmartChill/Devices/{}/{}/door_event",
            model, device_id
        ));
        topics
    }

    /// Checks the `user_assigned ⇔ owner ≠ null ⇔ assignment_time ≠ null`
    /// invariant from §3.
    pub fn assignment_invariant_holds(&self) -> bool {
        self.user_assigned == self.owner.is_some()
            && self.user_assigned == self.assignment_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_mixed_case_and_separators_identically() {
        let a = normalize_mac("AA:BB:CC:11:22:33").unwrap();
        let b = normalize_mac("aa-bb-cc-11-22-33").unwrap();
        let c = normalize_mac("AABBCC112233").unwrap();

        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn derives_device_id_from_last_six_hex_chars() {
        assert_eq!(
            derive_device_id("AA:BB:CC:11:22:33").unwrap(),
            "SmartChill_112233"
        );
    }

    #[test]
    fn rejects_macs_that_are_not_twelve_hex_digits() {
        assert!(normalize_mac("AA:BB:CC:11:22").is_err());
        assert!(normalize_mac("ZZ:BB:CC:11:22:33").is_err());
    }

    #[test]
    fn derives_sensor_and_door_event_topics() {
        let topics = Device::derive_topics(
            "M1",
            "SmartChill_112233",
            &["temp".to_string(), "humidity".to_string()],
        );

        assert_eq!(
            topics,
            vec![
                "Group17/SmartChill/Devices/M1/SmartChill_112233/temp",
                "Group17/SmartChill/Devices/M1/SmartChill_112233/humidity",
                "Group17/SmartChill/Devices/M1/SmartChill_112233/door_event",
            ]
        );
    }
}
