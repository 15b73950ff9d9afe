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
use smartchill_control::settings::{SettingsDocument, SettingsStore};
use smartchill_control::status::{StatusState, Thresholds};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

const SERVICE_ID: &str = "status";

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
    defaults.insert("temp_min_celsius".into(), serde_json::json!(cfg.default_temp_min_celsius));
    defaults.insert("temp_max_celsius".into(), serde_json::json!(cfg.default_temp_max_celsius));
    defaults.insert(
        "humidity_max_percent".into(),
        serde_json::json!(cfg.default_humidity_max_percent),
    );
    defaults.insert("enable_malfunction_alerts".into(), serde_json::json!(true));
    defaults
}

fn thresholds_for(settings: &SettingsDocument, device_id: &str) -> Thresholds {
    let cfg = settings.effective_config(device_id);

    Thresholds {
        temp_min_celsius: cfg.get("temp_min_celsius").and_then(|v| v.as_f64()).unwrap_or(-5.0),
        temp_max_celsius: cfg.get("temp_max_celsius").and_then(|v| v.as_f64()).unwrap_or(15.0),
        humidity_max_percent: cfg
            .get("humidity_max_percent")
            .and_then(|v| v.as_f64())
            .unwrap_or(95.0),
    }
}

fn malfunction_alerts_enabled(settings: &SettingsDocument, device_id: &str) -> bool {
    settings
        .effective_config(device_id)
        .get("enable_malfunction_alerts")
        .and_then(|v| v.as_bool())
        .unwrap_or(true)
}

#[derive(Default)]
struct DeviceReadings {
    temp_celsius: Option<f64>,
    humidity_percent: Option<f64>,
    state: StatusState,
}

fn build_alert(device_id: &str) -> (String, Alert) {
    let topic = topics::alert_topic(device_id, "Malfunction");
    let alert = Alert {
        alert_type: "Malfunction".to_string(),
        device_id: Some(device_id.to_string()),
        user_id: None,
        message: format!("Temperature or humidity on {} is out of range", device_id),
        severity: Severity::Warning,
        timestamp: Utc::now(),
        service: SERVICE_ID.to_string(),
        extra: Default::default(),
    };

    (topic, alert)
}

async fn publish_alert(bus: &(impl BusClient + ?Sized), device_id: &str) {
    let (topic, alert) = build_alert(device_id);

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
        name: "Status Monitor".to_string(),
        description: "Alerts when a device's temperature or humidity falls out of range".to_string(),
        endpoints: Vec::new(),
        r#type: Some("microservice".to_string()),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    catalog.register_service(&registration).await
}

fn entry_number(record: &senml::Record, name: &str) -> Option<f64> {
    record.entries.iter().find(|e| e.name == name).and_then(|e| match &e.value {
        EntryValue::Number(n) => Some(*n),
        EntryValue::Text(_) => None,
    })
}

async fn handle_device_message(
    msg: &Message,
    settings: &mut SettingsDocument,
    store: &SettingsStore,
    catalog: &CatalogClient,
    devices: &mut HashMap<String, DeviceReadings>,
) -> Option<String> {
    let (_model, device_id, sensor) = topics::parse_device_topic(&msg.topic)?;
    if sensor != "temp" && sensor != "humidity" {
        return None;
    }

    let record = match senml::decode(&msg.payload) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, topic = %msg.topic, "could not decode reading payload");
            return None;
        }
    };

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

    let readings = devices.entry(device_id.to_string()).or_default();
    if sensor == "temp" {
        readings.temp_celsius = entry_number(&record, "temp").or(readings.temp_celsius);
    } else {
        readings.humidity_percent = entry_number(&record, "humidity").or(readings.humidity_percent);
    }

    let thresholds = thresholds_for(settings, device_id);
    let enabled = malfunction_alerts_enabled(settings, device_id);
    let alert = readings
        .state
        .evaluate(readings.temp_celsius, readings.humidity_percent, &thresholds, enabled);

    alert.then(|| device_id.to_string())
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

    info!(broker = %cfg.broker_host, catalog = %cfg.catalog_url, "starting status service");

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

    let mut devices: HashMap<String, DeviceReadings> = HashMap::new();
    let mut registration_tick = tokio::time::interval(Duration::from_secs(cfg.registration_interval_seconds));

    loop {
        tokio::select! {
            maybe_msg = rx.recv() => {
                let Some(msg) = maybe_msg else {
                    return Err(Error::Transient("bus dispatch channel closed".into()));
                };

                if let Some(device_id) = handle_device_message(&msg, &mut settings, &settings_store, &catalog, &mut devices).await {
                    publish_alert(&bus, &device_id).await;
                } else {
                    handle_config_message(&msg, &mut settings, &settings_store, &bus).await;
                }
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
