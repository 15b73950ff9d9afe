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

//! The Notification Router (§4.7): alert fan-in, chat resolution,
//! cooldown, and delivery. Grounded on the alert-dispatch branch of
//! `examples/original_source/TelegramBot/modules/bot_handlers.py`
//! (the part of the bot that pushes proactive messages rather than
//! responding to one), re-expressed against the typed `RegistryClient`/
//! `TelegramClient` built for this workspace.

use crate::cooldown::{CooldownKey, CooldownTable};
use crate::registry_client::RegistryClient;
use crate::telegram::TelegramClient;
use chrono::Utc;
use serde_json::Value;
use smartchill_api::alert::is_resolution_alert;
use smartchill_api::error::Result;
use smartchill_api::topics::parse_alert_topic;
use tracing::{debug, warn};

fn severity_icon(severity: &str) -> &'static str {
    match severity {
        "critical" => "🔴",
        "warning" => "🟠",
        _ => "🔵",
    }
}

struct ParsedAlert {
    device_id: Option<String>,
    user_id: Option<String>,
    alert_type: String,
    severity: String,
    message: String,
}

fn parse_alert(topic: &str, payload: &[u8]) -> Option<ParsedAlert> {
    let (topic_device_id, topic_kind) = parse_alert_topic(topic)?;
    let value: Value = serde_json::from_slice(payload).ok()?;

    let device_id = value
        .get("device_id")
        .and_then(Value::as_str)
        .map(String::from)
        .or_else(|| Some(topic_device_id.to_string()));

    let user_id = value.get("userID").and_then(Value::as_str).map(String::from);

    let alert_type = value
        .get("alert_type")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| topic_kind.to_string());

    let severity = value
        .get("severity")
        .and_then(Value::as_str)
        .filter(|s| matches!(*s, "info" | "warning" | "critical"))
        .unwrap_or("info")
        .to_string();

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| format!("{} alert", alert_type));

    Some(ParsedAlert { device_id, user_id, alert_type, severity, message })
}

/// Resolves the chat id a given alert should be delivered to: directly
/// via `userID` if present, otherwise via the device's owner (§4.7 step 2).
async fn resolve_chat_id(registry: &RegistryClient, parsed: &ParsedAlert) -> Result<Option<i64>> {
    let user_id = match &parsed.user_id {
        Some(id) => Some(id.clone()),
        None => match &parsed.device_id {
            Some(device_id) => match registry.get_device(device_id).await? {
                Some(device) => device.owner,
                None => None,
            },
            None => None,
        },
    };

    let Some(user_id) = user_id else {
        return Ok(None);
    };

    let chat_id = registry
        .get_user(&user_id)
        .await?
        .and_then(|u| u.telegram_chat_id)
        .and_then(|s| s.parse::<i64>().ok());

    Ok(chat_id)
}

pub async fn handle_alert(
    topic: &str,
    payload: &[u8],
    registry: &RegistryClient,
    telegram: &TelegramClient,
    cooldown: &CooldownTable,
    cooldown_minutes: i64,
) {
    let Some(parsed) = parse_alert(topic, payload) else {
        warn!(topic, "could not parse alert payload");
        return;
    };

    let chat_id = match resolve_chat_id(registry, &parsed).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            debug!(topic, "no chat resolved for alert, dropping");
            return;
        }
        Err(e) => {
            warn!(error = %e, topic, "failed resolving chat for alert");
            return;
        }
    };

    let resolution = is_resolution_alert(&parsed.alert_type);
    let key = CooldownKey {
        chat_id: chat_id.to_string(),
        alert_type: parsed.alert_type.clone(),
        device_id: parsed.device_id.clone().unwrap_or_default(),
    };
    let now = Utc::now();

    if !resolution && !cooldown.allows(&key, now, cooldown_minutes) {
        debug!(chat_id, alert_type = %parsed.alert_type, "alert suppressed by cooldown");
        return;
    }

    let text = format!("{} *{}*\n{}", severity_icon(&parsed.severity), parsed.alert_type, parsed.message);

    match telegram.send_message(chat_id, &text).await {
        Ok(()) => {
            if !resolution {
                cooldown.record_sent(key, now);
            }
        }
        Err(e) => warn!(error = %e, chat_id, "failed to deliver alert"),
    }
}
