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

#![deny(unsafe_code)]

mod config;

use chrono::Utc;
use smartchill_api::alert::{Alert, Severity};
use smartchill_api::error::{Error, Result};
use smartchill_api::senml::{self, EntryValue};
use smartchill_api::service::ServiceRegistration;
use smartchill_api::topics::{self, ConfigSuffix};
use smartchill_bus::{BrokerConfig, BusClient, Message, MqttBusClient};
use smartchill_control::backoff::with_backoff;
use smartchill_control::catalog_client::CatalogClient;
use smartchill_control::config_reply::{handle_config_update, ConfigReply};
use smartchill_control::door_timer::{DoorAlertKind, DoorTimers};
use smartchill_control::settings::{SettingsDocument, SettingsStore};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SERVICE_ID: &str = "door-timer";

async fn init_app() -> Option<config::Config> {
    match config::get().await {
        Ok(cfg) => {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(cfg.get_log_level())
                .with_target(false)
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .expect("unable to set global default subscriber");
            Some(cfg)
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            None
        }
    }
}

fn default_settings(cfg: &config::Config) -> BTreeMap<String, serde_json::Value> {
    let mut defaults = BTreeMap::new();
    defaults.insert(
        "max_door_open_seconds".into(),
        serde_json::json!(cfg.default_max_door_open_seconds),
    );
    defaults.insert(
        "check_interval".into(),
        serde_json::json!(cfg.default_check_interval),
    );
    defaults.insert("enable_door_closed_alerts".into(), serde_json::json!(true));
    defaults
}

fn max_open_for(settings: &SettingsDocument, device_id: &str) -> Duration {
    let secs = settings
        .effective_config(device_id)
        .get("max_door_open_seconds")
        .and_then(|v| v.as_i64())
        .unwrap_or(60);
    Duration::from_secs(secs.max(0) as u64)
}

/// The monitoring loop's tick period (§9): the smallest `check_interval`
/// configured across currently-tracked devices, or `cfg.default_check_interval`
/// when nothing is tracked yet.
fn check_interval_for(cfg: &config::Config, settings: &SettingsDocument, device_ids: &[String]) -> Duration {
    let secs = device_ids
        .iter()
        .filter_map(|device_id| {
            settings
                .effective_config(device_id)
                .get("check_interval")
                .and_then(|v| v.as_i64())
        })
        .min()
        .unwrap_or(cfg.default_check_interval);

    Duration::from_secs(secs.max(1) as u64)
}

fn door_closed_alerts_enabled(settings: &SettingsDocument, device_id: &str) -> bool {
    settings
        .effective_config(device_id)
        .get("enable_door_closed_alerts")
        .and_then(|v| v.as_bool())
        .unwrap_or(true)
}

fn build_alert(device_id: &str, kind: DoorAlertKind) -> (String, Alert) {
    let (topic_kind, alert_type, severity, message) = match kind {
        DoorAlertKind::Timeout => (
            "DoorTimeout",
            "DoorTimeout",
            Severity::Warning,
            format!("Door on {} has been open too long", device_id),
        ),
        DoorAlertKind::Closed => (
            "DoorClosed",
            "door_closed_after_timeout",
            Severity::Info,
            format!("Door on {} has been closed", device_id),
        ),
    };

    let topic = topics::alert_topic(device_id, topic_kind);
    let alert = Alert {
        alert_type: alert_type.to_string(),
        device_id: Some(device_id.to_string()),
        user_id: None,
        message,
        severity,
        timestamp: Utc::now(),
        service: SERVICE_ID.to_string(),
        extra: Default::default(),
    };

    (topic, alert)
}

async fn publish_alert(bus: &(impl BusClient + ?Sized), device_id: &str, kind: DoorAlertKind) {
    let (topic, alert) = build_alert(device_id, kind);

    match serde_json::to_value(&alert) {
        Ok(payload) => {
            if let Err(e) = bus.publish(&topic, &payload).await {
                warn!(error = %e, topic, "failed to publish alert");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize alert"),
    }
}

async fn register_once(catalog: &CatalogClient) -> Result<()> {
    let registration = ServiceRegistration {
        service_id: SERVICE_ID.to_string(),
        name: "Door Timer".to_string(),
        description: "Alerts when a device's door has been open too long".to_string(),
        endpoints: Vec::new(),
        r#type: Some("microservice".to_string()),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    catalog.register_service(&registration).await
}

async fn handle_device_message(
    msg: &Message,
    settings: &mut SettingsDocument,
    store: &SettingsStore,
    catalog: &CatalogClient,
    timers: &mut DoorTimers,
) -> Option<(String, DoorAlertKind)> {
    let (_model, device_id, sensor) = topics::parse_device_topic(&msg.topic)?;
    if sensor != "door_event" {
        return None;
    }

    let record = match senml::decode(&msg.payload) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, topic = %msg.topic, "could not decode door_event payload");
            return None;
        }
    };

    let opened = record.entries.iter().find(|e| e.name == "door_event").map(|e| match &e.value {
        EntryValue::Text(s) => s.eq_ignore_ascii_case("open") || s.eq_ignore_ascii_case("opened"),
        EntryValue::Number(n) => *n != 0.0,
    })?;

    if !settings.has_device(device_id) {
        match catalog.device_exists(device_id).await {
            Ok(true) => {
                settings.ensure_device(device_id);
                if let Err(e) = store.save(settings).await {
                    smartchill_control::settings::log_save_failure(&e);
                }
            }
            Ok(false) => {
                debug!(device_id, "device not registered in catalog, dropping event");
                return None;
            }
            Err(e) => {
                warn!(error = %e, device_id, "could not reach catalog to check device, dropping event");
                return None;
            }
        }
    }

    let kind = timers.on_door_event(device_id, opened, Instant::now())?;
    if kind == DoorAlertKind::Closed && !door_closed_alerts_enabled(settings, device_id) {
        return None;
    }
    Some((device_id.to_string(), kind))
}

async fn handle_config_message(
    msg: &Message,
    settings: &mut SettingsDocument,
    store: &SettingsStore,
    bus: &(impl BusClient + ?Sized),
) {
    let Some((service, device_id, suffix)) = topics::parse_config_topic(&msg.topic) else {
        return;
    };
    if service != SERVICE_ID || suffix != "config_update" {
        return;
    }

    let payload: serde_json::Value = match serde_json::from_slice(&msg.payload) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "malformed config_update payload");
            return;
        }
    };

    let reply = handle_config_update(settings, device_id, &payload);
    if matches!(reply, ConfigReply::Ack(_)) {
        if let Err(e) = store.save(settings).await {
            smartchill_control::settings::log_save_failure(&e);
        }
    }

    let suffix = match &reply {
        ConfigReply::Data(_) => ConfigSuffix::Data,
        ConfigReply::Ack(_) => ConfigSuffix::Ack,
        ConfigReply::Error(_) => ConfigSuffix::Error,
    };
    let topic = topics::config_topic(SERVICE_ID, device_id, suffix);

    if let Err(e) = bus.publish(&topic, &reply.to_json()).await {
        warn!(error = %e, topic, "failed to publish config reply");
    }
}

async fn run() -> Result<()> {
    let Some(cfg) = init_app().await else {
        return Ok(());
    };

    info!(broker = %cfg.broker_host, catalog = %cfg.catalog_url, "starting door-timer service");

    let catalog = CatalogClient::new(cfg.catalog_url.clone());
    let settings_store = SettingsStore::new(cfg.settings_file.clone());
    let mut settings = settings_store.load(default_settings(&cfg)).await?;

    let broker_cfg = BrokerConfig {
        host: cfg.broker_host.clone(),
        port: cfg.broker_port,
        client_id: format!("{}_{}", cfg.client_id_prefix, std::process::id()),
    };
    let (mut bus, mut rx) = MqttBusClient::new(&broker_cfg);
    bus.start().await?;
    bus.subscribe(topics::DEVICE_WILDCARD).await?;
    bus.subscribe(&format!("Group17/SmartChill/{}/+/config_update", SERVICE_ID)).await?;

    if let Err(e) = with_backoff("initial service registration", || register_once(&catalog)).await {
        warn!(error = %e, "giving up on initial registration, will retry on schedule");
    }

    let mut timers = DoorTimers::new();
    let mut registration_tick = tokio::time::interval(Duration::from_secs(cfg.registration_interval_seconds));
    let mut check_tick = tokio::time::interval(check_interval_for(&cfg, &settings, &[]));

    loop {
        tokio::select! {
            maybe_msg = rx.recv() => {
                let Some(msg) = maybe_msg else {
                    return Err(Error::Transient("bus dispatch channel closed".into()));
                };

                if let Some((device_id, kind)) = handle_device_message(&msg, &mut settings, &settings_store, &catalog, &mut timers).await {
                    publish_alert(&bus, &device_id, kind).await;
                } else {
                    handle_config_message(&msg, &mut settings, &settings_store, &bus).await;
                }
            }
            _ = check_tick.tick() => {
                let now = Instant::now();
                let mut timed_out = Vec::new();
                let tracked = timers.tracked_device_ids();

                for device_id in &tracked {
                    let max_open = max_open_for(&settings, device_id);
                    if timers.check_timeout_for(device_id, now, max_open).is_some() {
                        timed_out.push(device_id.clone());
                    }
                }

                for device_id in timed_out {
                    publish_alert(&bus, &device_id, DoorAlertKind::Timeout).await;
                }

                let period = check_interval_for(&cfg, &settings, &tracked);
                check_tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            }
            _ = registration_tick.tick() => {
                if let Err(e) = with_backoff("periodic service registration", || register_once(&catalog)).await {
                    warn!(error = %e, "periodic service registration failed");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
