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

//! MQTT topic grammar (§3 "Derived topics", §6 "Bus topic grammar").

/// Wildcard a control service subscribes to in order to hear every
/// sensor reading and door event for every device of every model.
pub const DEVICE_WILDCARD: &str = "Group17/SmartChill/Devices/+/+/+";

/// Parses `Group17/SmartChill/Devices/{model}/{device_id}/{sensor}`,
/// returning `(model, device_id, sensor)`. `sensor` is `"door_event"`
/// for the door-event topic.
pub fn parse_device_topic(topic: &str) -> Option<(&str, &str, &str)> {
    let parts: Vec<&str> = topic.split('/').collect();

    if parts.len() == 6 && parts[0] == "Group17" && parts[1] == "SmartChill" && parts[2] == "Devices" {
        Some((parts[3], parts[4], parts[5]))
    } else {
        None
    }
}

/// `Group17/SmartChill/{device_id}/Alerts/{kind}`
pub fn alert_topic(device_id: &str, kind: &str) -> String {
    format!("Group17/SmartChill/{}/Alerts/{}", device_id, kind)
}

/// `Group17/SmartChill/{device_id}/Alerts/#` — the wildcard a router
/// subscribes to in order to hear every alert kind for every device.
pub const ALERT_WILDCARD: &str = "Group17/SmartChill/+/Alerts/#";

pub enum ConfigSuffix {
    Update,
    Data,
    Ack,
    Error,
}

impl ConfigSuffix {
    fn as_str(&self) -> &'static str {
        match self {
            ConfigSuffix::Update => "config_update",
            ConfigSuffix::Data => "config_data",
            ConfigSuffix::Ack => "config_ack",
            ConfigSuffix::Error => "config_error",
        }
    }
}

/// `Group17/SmartChill/{service}/{device_id}/{suffix}`
pub fn config_topic(service: &str, device_id: &str, suffix: ConfigSuffix) -> String {
    format!(
        "Group17/SmartChill/{}/{}/{}",
        service,
        device_id,
        suffix.as_str()
    )
}

/// Parses `Group17/SmartChill/{service}/{device_id}/{suffix}`, returning
/// `(service, device_id, suffix)` when the topic matches the
/// configuration grammar.
pub fn parse_config_topic(topic: &str) -> Option<(&str, &str, &str)> {
    let parts: Vec<&str> = topic.split('/').collect();

    if parts.len() == 5 && parts[0] == "Group17" && parts[1] == "SmartChill" {
        Some((parts[2], parts[3], parts[4]))
    } else {
        None
    }
}

/// Extracts `(device_id, kind)` from an alert topic
/// `Group17/SmartChill/{device_id}/Alerts/{kind}`.
pub fn parse_alert_topic(topic: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = topic.split('/').collect();

    if parts.len() == 5 && parts[0] == "Group17" && parts[1] == "SmartChill" && parts[3] == "Alerts"
    {
        Some((parts[2], parts[4]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_parses_alert_topics() {
        let topic = alert_topic("SmartChill_112233", "DoorTimeout");

        assert_eq!(topic, "Group17/SmartChill/SmartChill_112233/Alerts/DoorTimeout");
        assert_eq!(
            parse_alert_topic(&topic),
            Some(("SmartChill_112233", "DoorTimeout"))
        );
    }

    #[test]
    fn parses_sensor_and_door_event_device_topics() {
        assert_eq!(
            parse_device_topic("Group17/SmartChill/Devices/M1/SmartChill_112233/temp"),
            Some(("M1", "SmartChill_112233", "temp"))
        );
        assert_eq!(
            parse_device_topic("Group17/SmartChill/Devices/M1/SmartChill_112233/door_event"),
            Some(("M1", "SmartChill_112233", "door_event"))
        );
        assert_eq!(parse_device_topic("not/a/matching/topic"), None);
    }

    #[test]
    fn builds_and_parses_config_topics() {
        let topic = config_topic("door-timer", "SmartChill_112233", ConfigSuffix::Update);

        assert_eq!(
            topic,
            "Group17/SmartChill/door-timer/SmartChill_112233/config_update"
        );
        assert_eq!(
            parse_config_topic(&topic),
            Some(("door-timer", "SmartChill_112233", "config_update"))
        );
    }
}
