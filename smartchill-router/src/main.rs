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
mod cooldown;
mod interaction;
mod registry_client;
mod router;
mod telegram;

use cooldown::CooldownTable;
use interaction::InteractionEngine;
use registry_client::RegistryClient;
use smartchill_api::error::{Error, Result};
use smartchill_api::service::ServiceRegistration;
use smartchill_api::topics;
use smartchill_bus::{BrokerConfig, BusClient, Message, MqttBusClient};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use telegram::TelegramClient;
use tokio::sync::Mutex;
use tracing::{info, warn};

const SERVICE_ID: &str = "router";
const BASE_DELAY: Duration = Duration::from_secs(2);
const MAX_ATTEMPTS: u32 = 5;

/// Same shape as `smartchill_control::backoff::with_backoff`, hand-rolled
/// here rather than pulling in the whole control-service crate for one
/// helper function.
async fn with_backoff<F, Fut, T>(label: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = BASE_DELAY;

    for n in 1..=MAX_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if n == MAX_ATTEMPTS => return Err(e),
            Err(e) => {
                warn!(attempt = n, error = %e, "{} failed, retrying in {:?}", label, delay);
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
    unreachable!("loop always returns by the last iteration")
}

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

async fn register_once(registry: &RegistryClient) -> Result<()> {
    let registration = ServiceRegistration {
        service_id: SERVICE_ID.to_string(),
        name: "Notification Router".to_string(),
        description: "Routes alerts to Telegram and drives the account/config chat flows".to_string(),
        endpoints: Vec::new(),
        r#type: Some("microservice".to_string()),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    registry.register_service(&registration).await
}

/// Drains one message off the bus dispatch channel: alert topics go to
/// the Notification Router, config-reply topics go to the Interaction
/// Engine's pending-request table (§4.7, §4.8).
async fn handle_bus_message(
    msg: &Message,
    registry: &RegistryClient,
    telegram: &TelegramClient,
    cooldown: &CooldownTable,
    cooldown_minutes: i64,
    engine: &Mutex<InteractionEngine>,
) {
    if topics::parse_alert_topic(&msg.topic).is_some() {
        router::handle_alert(&msg.topic, &msg.payload, registry, telegram, cooldown, cooldown_minutes).await;
        return;
    }

    let Some((service, device_id, suffix)) = topics::parse_config_topic(&msg.topic) else {
        return;
    };
    if !matches!(suffix, "config_data" | "config_ack" | "config_error") {
        return;
    }

    let payload: serde_json::Value = match serde_json::from_slice(&msg.payload) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, topic = %msg.topic, "malformed config reply payload");
            return;
        }
    };

    engine
        .lock()
        .await
        .handle_config_reply(service, device_id, suffix, &payload, telegram)
        .await;
}

/// Long-polls Telegram in a loop, dispatching each update to the
/// Interaction Engine. Runs as its own task so a 30-second `getUpdates`
/// long poll never blocks the bus dispatch loop in `run`.
async fn run_telegram_loop(
    telegram: Arc<TelegramClient>,
    registry: Arc<RegistryClient>,
    bus: Arc<MqttBusClient>,
    engine: Arc<Mutex<InteractionEngine>>,
    poll_timeout_seconds: u64,
) -> Result<()> {
    let mut offset: i64 = 0;

    loop {
        let updates = match telegram.get_updates(offset, poll_timeout_seconds).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying shortly");
                tokio::time::sleep(Duration::from_secs(2)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            if let Some(msg) = update.message {
                let Some(text) = msg.text else { continue };
                engine
                    .lock()
                    .await
                    .handle_text(msg.chat.id, &text, &registry, &telegram, bus.as_ref())
                    .await;
            } else if let Some(cb) = update.callback_query {
                let Some(tg_msg) = &cb.message else { continue };
                let data = cb.data.clone().unwrap_or_default();
                engine
                    .lock()
                    .await
                    .handle_callback(tg_msg.chat.id, &cb.id, &data, &registry, &telegram, bus.as_ref())
                    .await;
            } else if let Some(member) = update.my_chat_member {
                // Chat blocked or left: drop any pending state so it
                // doesn't leak across a later re-join with the same id.
                engine.lock().await.handle_blocked(member.chat.id).await;
            }
        }
    }
}

async fn run() -> Result<()> {
    let Some(cfg) = init_app().await else {
        return Ok(());
    };

    info!(broker = %cfg.broker_host, catalog = %cfg.catalog_url, "starting notification router");

    let registry = Arc::new(RegistryClient::new(cfg.catalog_url.clone()));
    let telegram = Arc::new(TelegramClient::new(&cfg.telegram_token, Duration::from_secs(cfg.poll_timeout_seconds)));
    let cooldown = CooldownTable::new();
    let engine = Arc::new(Mutex::new(InteractionEngine::new()));

    let broker_cfg = BrokerConfig {
        host: cfg.broker_host.clone(),
        port: cfg.broker_port,
        client_id: format!("{}_{}", cfg.client_id_prefix, std::process::id()),
    };
    let (mut bus, mut rx) = MqttBusClient::new(&broker_cfg);
    bus.start().await?;
    bus.subscribe(topics::ALERT_WILDCARD).await?;
    bus.subscribe("Group17/SmartChill/+/+/config_data").await?;
    bus.subscribe("Group17/SmartChill/+/+/config_ack").await?;
    bus.subscribe("Group17/SmartChill/+/+/config_error").await?;
    let bus = Arc::new(bus);

    if let Err(e) = with_backoff("initial service registration", || register_once(&registry)).await {
        warn!(error = %e, "giving up on initial registration, will retry on schedule");
    }

    if cfg.set_descriptions_on_start {
        let commands = [
            ("start", "Register or log in"),
            ("help", "List commands"),
            ("mydevices", "Manage your fridges"),
            ("newdevice", "Link another fridge"),
            ("showme", "Show your account"),
            ("deleteme", "Delete your account"),
            ("cancel", "Cancel the current action"),
        ];
        if let Err(e) = telegram.set_my_commands(&commands).await {
            warn!(error = %e, "could not set bot command descriptions");
        }
    }

    let mut telegram_task = tokio::spawn(run_telegram_loop(
        telegram.clone(),
        registry.clone(),
        bus.clone(),
        engine.clone(),
        cfg.poll_timeout_seconds,
    ));

    let mut registration_tick = tokio::time::interval(Duration::from_secs(cfg.registration_interval_seconds));

    loop {
        tokio::select! {
            maybe_msg = rx.recv() => {
                let Some(msg) = maybe_msg else {
                    telegram_task.abort();
                    return Err(Error::Transient("bus dispatch channel closed".into()));
                };
                handle_bus_message(&msg, &registry, &telegram, &cooldown, cfg.default_alert_cooldown_minutes, &engine).await;
            }
            _ = registration_tick.tick() => {
                if let Err(e) = with_backoff("periodic service registration", || register_once(&registry)).await {
                    warn!(error = %e, "periodic service registration failed");
                }
            }
            result = &mut telegram_task => {
                let _ = result;
                return Err(Error::Transient("telegram long-poll task exited".into()));
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
