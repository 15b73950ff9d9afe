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

//! The Interaction Engine (§4.8): a per-chat state machine driving the
//! registration/login flow, device management, and the per-device
//! configuration flow. Grounded on `BotRequestHandler` in
//! `examples/original_source/TelegramBot/modules/bot_handlers.py`
//! (command table, `on_chat_message`/`on_callback_query` dispatch,
//! registration flow), re-expressed over this workspace's typed
//! `RegistryClient`/`TelegramClient`/`BusClient`.
//!
//! Simplification versus the original bot: instead of one inline button
//! per configuration key, editing prompts for a single `key value` line
//! of free text. The underlying protocol — local range validation,
//! `config_update` publish, `config_ack`/`config_error` resolution via
//! the pending-request table — is unchanged.

use crate::registry_client::RegistryClient;
use crate::telegram::{InlineButton, TelegramClient};
use serde_json::Value;
use smartchill_api::config_protocol::validate_key;
use smartchill_api::device::{derive_device_id, normalize_mac};
use smartchill_api::topics::{config_topic, ConfigSuffix};
use smartchill_api::user::is_valid_user_id;
use smartchill_bus::BusClient;
use std::collections::HashMap;
use tracing::warn;

const KNOWN_SERVICES: &[&str] = &["door-timer", "spoilage", "status"];

#[derive(Debug, Clone)]
enum ChatState {
    Idle,
    AwaitingMac,
    AwaitingUsername { device_id: String },
    AwaitingNewDeviceMac { user_id: String },
    AwaitingRename { device_id: String },
    AwaitingConfigValue { service: String, device_id: String },
}

#[derive(Debug, Clone)]
struct PendingConfigRequest {
    chat_id: i64,
    for_edit: bool,
}

pub struct InteractionEngine {
    states: HashMap<i64, ChatState>,
    pending: HashMap<(String, String), PendingConfigRequest>,
}

impl InteractionEngine {
    pub fn new() -> Self {
        InteractionEngine {
            states: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    fn state_of(&self, chat_id: i64) -> ChatState {
        self.states.get(&chat_id).cloned().unwrap_or(ChatState::Idle)
    }

    fn set_state(&mut self, chat_id: i64, state: ChatState) {
        self.states.insert(chat_id, state);
    }

    fn clear_state(&mut self, chat_id: i64) {
        self.states.remove(&chat_id);
    }

    pub async fn handle_text(
        &mut self,
        chat_id: i64,
        text: &str,
        registry: &RegistryClient,
        telegram: &TelegramClient,
        bus: &(impl BusClient + ?Sized),
    ) {
        let text = text.trim();

        if text.eq_ignore_ascii_case("/cancel") {
            self.clear_state(chat_id);
            let _ = telegram.send_message(chat_id, "Cancelled.").await;
            return;
        }

        if let Some(cmd) = text.strip_prefix('/') {
            let cmd = cmd.split_whitespace().next().unwrap_or("").to_lowercase();
            self.clear_state(chat_id);

            match cmd.as_str() {
                "start" => self.cmd_start(chat_id, registry, telegram).await,
                "help" => self.cmd_help(chat_id, telegram).await,
                "mydevices" => self.cmd_mydevices(chat_id, registry, telegram).await,
                "newdevice" => self.cmd_newdevice(chat_id, registry, telegram).await,
                "showme" => self.cmd_showme(chat_id, registry, telegram).await,
                "deleteme" => self.cmd_deleteme(chat_id, registry, telegram).await,
                _ => {
                    let _ = telegram.send_message(chat_id, "Unknown command. Use /help.").await;
                }
            }
            return;
        }

        match self.state_of(chat_id) {
            ChatState::Idle => {
                let _ = telegram
                    .send_message(chat_id, "Use commands (start with /) or reply using the menus.")
                    .await;
            }
            ChatState::AwaitingMac => self.on_mac_for_login(chat_id, text, registry, telegram).await,
            ChatState::AwaitingUsername { device_id } => {
                self.on_username(chat_id, text, &device_id, registry, telegram).await
            }
            ChatState::AwaitingNewDeviceMac { user_id } => {
                self.on_mac_for_new_device(chat_id, text, &user_id, registry, telegram).await
            }
            ChatState::AwaitingRename { device_id } => {
                self.on_rename(chat_id, text, &device_id, registry, telegram).await
            }
            ChatState::AwaitingConfigValue { service, device_id } => {
                self.on_config_value(chat_id, text, &service, &device_id, telegram, bus).await
            }
        }
    }

    async fn cmd_start(&mut self, chat_id: i64, registry: &RegistryClient, telegram: &TelegramClient) {
        let _ = telegram.send_message(chat_id, "👋 Welcome!").await;

        match registry.get_user_by_chat(&chat_id.to_string()).await {
            Ok(Some(user)) => {
                let _ = telegram
                    .send_message(chat_id, &format!("You are linked to user *{}*. Use /mydevices.", user.user_id))
                    .await;
            }
            Ok(None) => {
                let _ = telegram
                    .send_message(chat_id, "To link your SmartChill account, enter your fridge's *MAC address*\nFormat: `XX:XX:XX:XX:XX:XX`")
                    .await;
                self.set_state(chat_id, ChatState::AwaitingMac);
            }
            Err(e) => warn!(error = %e, chat_id, "lookup failed during /start"),
        }
    }

    async fn cmd_help(&self, chat_id: i64, telegram: &TelegramClient) {
        let text = "🤖 *SmartChill Bot Commands*\n\n\
            /start - Register/Login\n\
            /mydevices - Manage fridges\n\
            /newdevice - Add fridge\n\
            /showme - Info\n\
            /deleteme - Delete account\n\
            /cancel - Stop action";
        let _ = telegram.send_message(chat_id, text).await;
    }

    async fn cmd_mydevices(&self, chat_id: i64, registry: &RegistryClient, telegram: &TelegramClient) {
        let Ok(Some(user)) = registry.get_user_by_chat(&chat_id.to_string()).await else {
            let _ = telegram.send_message(chat_id, "Please /start to register first.").await;
            return;
        };

        if user.devices_list.is_empty() {
            let _ = telegram.send_message(chat_id, "You have no fridges yet. Use /newdevice.").await;
            return;
        }

        let rows: Vec<Vec<InlineButton>> = user
            .devices_list
            .iter()
            .map(|d| vec![InlineButton { text: d.device_name.clone(), callback_data: format!("dev {}", d.device_id) }])
            .collect();

        let _ = telegram.send_message_with_buttons(chat_id, "Your fridges:", &rows).await;
    }

    async fn cmd_newdevice(&mut self, chat_id: i64, registry: &RegistryClient, telegram: &TelegramClient) {
        let Ok(Some(user)) = registry.get_user_by_chat(&chat_id.to_string()).await else {
            let _ = telegram.send_message(chat_id, "Please /start to register first.").await;
            return;
        };

        let _ = telegram.send_message(chat_id, "Enter the *MAC address* of the new fridge:").await;
        self.set_state(chat_id, ChatState::AwaitingNewDeviceMac { user_id: user.user_id });
    }

    async fn cmd_showme(&self, chat_id: i64, registry: &RegistryClient, telegram: &TelegramClient) {
        match registry.get_user_by_chat(&chat_id.to_string()).await {
            Ok(Some(user)) => {
                let text = format!(
                    "User: *{}*\nName: {}\nFridges: {}",
                    user.user_id,
                    user.user_name,
                    user.devices_list.len()
                );
                let _ = telegram.send_message(chat_id, &text).await;
            }
            Ok(None) => {
                let _ = telegram.send_message(chat_id, "Please /start to register first.").await;
            }
            Err(e) => warn!(error = %e, chat_id, "lookup failed during /showme"),
        }
    }

    async fn cmd_deleteme(&self, chat_id: i64, registry: &RegistryClient, telegram: &TelegramClient) {
        let Ok(Some(user)) = registry.get_user_by_chat(&chat_id.to_string()).await else {
            let _ = telegram.send_message(chat_id, "Please /start to register first.").await;
            return;
        };

        match registry.delete_user(&user.user_id).await {
            Ok(()) => {
                let _ = telegram.send_message(chat_id, "Your account has been deleted.").await;
            }
            Err(e) => {
                let _ = telegram.send_message(chat_id, &format!("Could not delete account: {}", e)).await;
            }
        }
    }

    async fn on_mac_for_login(&mut self, chat_id: i64, text: &str, registry: &RegistryClient, telegram: &TelegramClient) {
        let device_id = match normalize_mac(text).and_then(|_| derive_device_id(text)) {
            Ok(id) => id,
            Err(_) => {
                let _ = telegram.send_message(chat_id, "That doesn't look like a MAC address. Try again, or /cancel.").await;
                return;
            }
        };

        let device = match registry.get_device(&device_id).await {
            Ok(Some(d)) => d,
            Ok(None) => {
                self.clear_state(chat_id);
                let _ = telegram.send_message(chat_id, "No fridge with that MAC address is registered.").await;
                return;
            }
            Err(e) => {
                warn!(error = %e, chat_id, "device lookup failed");
                return;
            }
        };

        if device.user_assigned {
            let already_mine = registry
                .get_user_by_chat(&chat_id.to_string())
                .await
                .ok()
                .flatten()
                .map(|u| Some(u.user_id) == device.owner)
                .unwrap_or(false);

            self.clear_state(chat_id);
            if already_mine {
                let _ = telegram.send_message(chat_id, "That fridge is already linked to your account.").await;
            } else {
                let _ = telegram.send_message(chat_id, "That fridge is already linked to another account.").await;
            }
            return;
        }

        if let Ok(Some(user)) = registry.get_user_by_chat(&chat_id.to_string()).await {
            self.clear_state(chat_id);
            match registry.assign_device(&user.user_id, &device_id, None).await {
                Ok(_) => {
                    let _ = telegram.send_message(chat_id, "Fridge linked to your account.").await;
                }
                Err(e) => {
                    let _ = telegram.send_message(chat_id, &format!("Could not link fridge: {}", e)).await;
                }
            }
            return;
        }

        let _ = telegram.send_message(chat_id, "Choose a username (3-32 chars, letters/digits/_.-):").await;
        self.set_state(chat_id, ChatState::AwaitingUsername { device_id });
    }

    async fn on_username(&mut self, chat_id: i64, text: &str, device_id: &str, registry: &RegistryClient, telegram: &TelegramClient) {
        if !is_valid_user_id(text) {
            let _ = telegram.send_message(chat_id, "Invalid username. Try again, or /cancel.").await;
            return;
        }

        if let Ok(Some(_)) = registry.get_user(&text.to_lowercase()).await {
            let _ = telegram.send_message(chat_id, "That username is taken. Try again, or /cancel.").await;
            return;
        }

        let user_id = text.to_lowercase();
        match registry.create_user(&user_id, text, Some(&chat_id.to_string())).await {
            Ok(_) => match registry.assign_device(&user_id, device_id, None).await {
                Ok(_) => {
                    self.clear_state(chat_id);
                    let _ = telegram.send_message(chat_id, "Account created and fridge linked.").await;
                }
                Err(e) => {
                    self.clear_state(chat_id);
                    let _ = telegram.send_message(chat_id, &format!("Account created, but linking the fridge failed: {}", e)).await;
                }
            },
            Err(e) => {
                let _ = telegram.send_message(chat_id, &format!("Could not create account: {}", e)).await;
            }
        }
    }

    async fn on_mac_for_new_device(&mut self, chat_id: i64, text: &str, user_id: &str, registry: &RegistryClient, telegram: &TelegramClient) {
        let device_id = match normalize_mac(text).and_then(|_| derive_device_id(text)) {
            Ok(id) => id,
            Err(_) => {
                let _ = telegram.send_message(chat_id, "That doesn't look like a MAC address. Try again, or /cancel.").await;
                return;
            }
        };

        let device = match registry.get_device(&device_id).await {
            Ok(Some(d)) => d,
            Ok(None) => {
                self.clear_state(chat_id);
                let _ = telegram.send_message(chat_id, "No fridge with that MAC address is registered.").await;
                return;
            }
            Err(e) => {
                warn!(error = %e, chat_id, "device lookup failed");
                return;
            }
        };

        self.clear_state(chat_id);
        if device.user_assigned {
            let _ = telegram.send_message(chat_id, "That fridge is already linked to an account.").await;
            return;
        }

        match registry.assign_device(user_id, &device_id, None).await {
            Ok(_) => {
                let _ = telegram.send_message(chat_id, "Fridge added to your account.").await;
            }
            Err(e) => {
                let _ = telegram.send_message(chat_id, &format!("Could not add fridge: {}", e)).await;
            }
        }
    }

    async fn on_rename(&mut self, chat_id: i64, text: &str, device_id: &str, registry: &RegistryClient, telegram: &TelegramClient) {
        if text.is_empty() || text.chars().count() > 50 {
            let _ = telegram.send_message(chat_id, "Name must be 1-50 characters. Try again, or /cancel.").await;
            return;
        }

        self.clear_state(chat_id);
        match registry.rename_device(device_id, text).await {
            Ok(_) => {
                let _ = telegram.send_message(chat_id, "Fridge renamed.").await;
            }
            Err(e) => {
                let _ = telegram.send_message(chat_id, &format!("Could not rename fridge: {}", e)).await;
            }
        }
    }

    async fn on_config_value(
        &mut self,
        chat_id: i64,
        text: &str,
        service: &str,
        device_id: &str,
        telegram: &TelegramClient,
        bus: &(impl BusClient + ?Sized),
    ) {
        let mut parts = text.splitn(2, char::is_whitespace);
        let (key, raw_value) = match (parts.next(), parts.next()) {
            (Some(k), Some(v)) => (k, v.trim()),
            _ => {
                let _ = telegram.send_message(chat_id, "Send `key value`, e.g. `max_door_open_seconds 90`.").await;
                return;
            }
        };

        let value: Value = serde_json::from_str(raw_value)
            .unwrap_or_else(|_| Value::String(raw_value.to_string()));

        if let Err(e) = validate_key(key, &value) {
            let _ = telegram.send_message(chat_id, &format!("Invalid value: {}", e)).await;
            return;
        }

        let topic = config_topic(service, device_id, ConfigSuffix::Update);
        let payload = serde_json::json!({ key: value });

        if let Err(e) = bus.publish(&topic, &payload).await {
            let _ = telegram.send_message(chat_id, &format!("Could not send update: {}", e)).await;
            return;
        }

        self.pending.insert(
            (service.to_string(), device_id.to_string()),
            PendingConfigRequest { chat_id, for_edit: true },
        );
        self.clear_state(chat_id);
        let _ = telegram.send_message(chat_id, "Update sent, waiting for confirmation...").await;
    }

    pub async fn handle_callback(
        &mut self,
        chat_id: i64,
        callback_id: &str,
        data: &str,
        registry: &RegistryClient,
        telegram: &TelegramClient,
        bus: &(impl BusClient + ?Sized),
    ) {
        let _ = telegram.answer_callback_query(callback_id).await;

        let mut parts = data.split_whitespace();
        let Some(action) = parts.next() else { return };
        let args: Vec<&str> = parts.collect();

        match (action, args.as_slice()) {
            ("dev", [device_id]) => self.show_device_menu(chat_id, device_id, telegram).await,
            ("info", [device_id]) => self.show_device_info(chat_id, device_id, registry, telegram).await,
            ("rename", [device_id]) => {
                let _ = telegram.send_message(chat_id, "Send the new name (max 50 chars):").await;
                self.set_state(chat_id, ChatState::AwaitingRename { device_id: device_id.to_string() });
            }
            ("unassign", [device_id]) => {
                match registry.unassign_device(device_id).await {
                    Ok(()) => {
                        let _ = telegram.send_message(chat_id, "Fridge unlinked.").await;
                    }
                    Err(e) => {
                        let _ = telegram.send_message(chat_id, &format!("Could not unlink fridge: {}", e)).await;
                    }
                }
            }
            ("conf", [device_id]) => self.show_services_menu(chat_id, device_id, telegram).await,
            ("svc", [device_id, service]) => self.show_service_actions(chat_id, device_id, service, telegram).await,
            ("valshow", [device_id, service]) => {
                self.request_config(chat_id, device_id, service, false, bus, telegram).await
            }
            ("editmenu", [device_id, service]) => {
                self.request_config(chat_id, device_id, service, true, bus, telegram).await
            }
            ("cancel_edit", []) => {
                self.clear_state(chat_id);
                let _ = telegram.send_message(chat_id, "Cancelled.").await;
            }
            _ => {}
        }
    }

    async fn show_device_menu(&self, chat_id: i64, device_id: &str, telegram: &TelegramClient) {
        let rows = vec![
            vec![InlineButton { text: "Info".into(), callback_data: format!("info {}", device_id) }],
            vec![InlineButton { text: "Rename".into(), callback_data: format!("rename {}", device_id) }],
            vec![InlineButton { text: "Configure".into(), callback_data: format!("conf {}", device_id) }],
            vec![InlineButton { text: "Unlink".into(), callback_data: format!("unassign {}", device_id) }],
        ];
        let _ = telegram.send_message_with_buttons(chat_id, "Choose an action:", &rows).await;
    }

    async fn show_device_info(&self, chat_id: i64, device_id: &str, registry: &RegistryClient, telegram: &TelegramClient) {
        match registry.get_device(device_id).await {
            Ok(Some(device)) => {
                let text = format!(
                    "*{}*\nModel: {}\nFirmware: {}\nStatus: {}",
                    device.user_device_name.unwrap_or_else(|| device.device_id.clone()),
                    device.model,
                    device.firmware_version,
                    device.status
                );
                let _ = telegram.send_message(chat_id, &text).await;
            }
            Ok(None) => {
                let _ = telegram.send_message(chat_id, "That fridge no longer exists.").await;
            }
            Err(e) => warn!(error = %e, chat_id, "device lookup failed"),
        }
    }

    async fn show_services_menu(&self, chat_id: i64, device_id: &str, telegram: &TelegramClient) {
        let rows = vec![KNOWN_SERVICES
            .iter()
            .map(|s| InlineButton { text: (*s).to_string(), callback_data: format!("svc {} {}", device_id, s) })
            .collect()];
        let _ = telegram.send_message_with_buttons(chat_id, "Choose a setting:", &rows).await;
    }

    async fn show_service_actions(&self, chat_id: i64, device_id: &str, service: &str, telegram: &TelegramClient) {
        let rows = vec![vec![
            InlineButton { text: "Show".into(), callback_data: format!("valshow {} {}", device_id, service) },
            InlineButton { text: "Edit".into(), callback_data: format!("editmenu {} {}", device_id, service) },
        ]];
        let _ = telegram.send_message_with_buttons(chat_id, "Show or edit?", &rows).await;
    }

    async fn request_config(
        &mut self,
        chat_id: i64,
        device_id: &str,
        service: &str,
        for_edit: bool,
        bus: &(impl BusClient + ?Sized),
        telegram: &TelegramClient,
    ) {
        let topic = config_topic(service, device_id, ConfigSuffix::Update);
        let payload = serde_json::json!({ "request": "get_config" });

        if let Err(e) = bus.publish(&topic, &payload).await {
            let _ = telegram.send_message(chat_id, &format!("Could not reach {}: {}", service, e)).await;
            return;
        }

        self.pending.insert((service.to_string(), device_id.to_string()), PendingConfigRequest { chat_id, for_edit });
    }

    /// Resolves an incoming `config_data`/`config_ack`/`config_error`
    /// reply against the pending-request table (§4.8 "a per-device
    /// pending-request table resolves the incoming reply").
    pub async fn handle_config_reply(&mut self, service: &str, device_id: &str, suffix: &str, payload: &Value, telegram: &TelegramClient) {
        let Some(pending) = self.pending.remove(&(service.to_string(), device_id.to_string())) else {
            return;
        };

        match suffix {
            "config_data" => {
                let config = payload.get("config").cloned().unwrap_or(Value::Null);
                if pending.for_edit {
                    let _ = telegram
                        .send_message(
                            pending.chat_id,
                            &format!("Current config:\n```\n{}\n```\nSend `key value` to change one.", config),
                        )
                        .await;
                    self.set_state(pending.chat_id, ChatState::AwaitingConfigValue {
                        service: service.to_string(),
                        device_id: device_id.to_string(),
                    });
                } else {
                    let _ = telegram
                        .send_message(pending.chat_id, &format!("Current config:\n```\n{}\n```", config))
                        .await;
                }
            }
            "config_ack" => {
                let updated = payload.get("updated_config").cloned().unwrap_or(Value::Null);
                let _ = telegram
                    .send_message(pending.chat_id, &format!("Updated:\n```\n{}\n```", updated))
                    .await;
            }
            "config_error" => {
                let error = payload.get("error").and_then(Value::as_str).unwrap_or("unknown error");
                let _ = telegram.send_message(pending.chat_id, &format!("Update rejected: {}", error)).await;
            }
            _ => {}
        }
    }

    pub async fn handle_blocked(&mut self, chat_id: i64) {
        self.clear_state(chat_id);
        self.pending.retain(|_, p| p.chat_id != chat_id);
    }
}
