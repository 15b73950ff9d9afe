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

//! In-memory registry state: the entity model, its derived indices,
//! and the invariant-preserving mutations of §4.2. This module is the
//! pure logic layer; [`actor`](crate::actor) is what serializes access
//! to a single `State` and schedules snapshot writes.

use chrono::Utc;
use smartchill_api::device::{derive_device_id, normalize_mac, Device};
use smartchill_api::error::{Error, Result};
use smartchill_api::registry_doc::RegistryDocument;
use smartchill_api::service::{Service, ServiceRegistration};
use smartchill_api::user::{is_valid_user_id, User, UserDevice};
use std::collections::HashMap;

const MAX_DEVICE_NAME_LEN: usize = 50;

pub enum RegisterDeviceOutcome {
    Registered(Device),
    Synced(Device),
}

pub enum RegisterServiceOutcome {
    Registered(Service),
    Updated(Service),
}

pub enum UnassignOutcome {
    Unassigned(Device),
    AlreadyUnassigned(Device),
}

pub struct DeleteUserOutcome {
    pub user: User,
    pub unassigned_device_ids: Vec<String>,
}

/// The registry document plus the indices described in §4.2: by
/// `deviceID`, by normalized MAC, by `userID`, by chat-id, by model,
/// and by `serviceID`. All indices map a key to a position in the
/// corresponding `Vec` in `doc`; they're rebuilt in one pass after
/// every mutation, which is cheap at the scale of a device fleet and
/// keeps this module free of the bookkeeping bugs that come with
/// incremental index fix-up on removal.
pub struct State {
    pub doc: RegistryDocument,
    by_device_id: HashMap<String, usize>,
    by_mac: HashMap<String, usize>,
    by_user_id: HashMap<String, usize>,
    by_chat_id: HashMap<String, usize>,
    by_model: HashMap<String, Vec<usize>>,
    by_service_id: HashMap<String, usize>,
}

impl State {
    pub fn new(doc: RegistryDocument) -> Self {
        let mut state = State {
            doc,
            by_device_id: HashMap::new(),
            by_mac: HashMap::new(),
            by_user_id: HashMap::new(),
            by_chat_id: HashMap::new(),
            by_model: HashMap::new(),
            by_service_id: HashMap::new(),
        };
        state.rebuild_indices();
        state
    }

    fn rebuild_indices(&mut self) {
        self.by_device_id.clear();
        self.by_mac.clear();
        self.by_model.clear();
        for (i, d) in self.doc.devices_list.iter().enumerate() {
            self.by_device_id.insert(d.device_id.clone(), i);
            if let Ok(mac) = normalize_mac(&d.mac_address) {
                self.by_mac.insert(mac, i);
            }
            self.by_model.entry(d.model.clone()).or_default().push(i);
        }

        self.by_user_id.clear();
        self.by_chat_id.clear();
        for (i, u) in self.doc.users_list.iter().enumerate() {
            self.by_user_id.insert(u.user_id.to_lowercase(), i);
            if let Some(chat_id) = &u.telegram_chat_id {
                self.by_chat_id.insert(chat_id.clone(), i);
            }
        }

        self.by_service_id.clear();
        for (i, s) in self.doc.services_list.iter().enumerate() {
            self.by_service_id.insert(s.service_id.clone(), i);
        }
    }

    // ---------------------------------------------------------- reads

    pub fn get_device(&self, device_id: &str) -> Option<&Device> {
        self.by_device_id
            .get(device_id)
            .and_then(|&i| self.doc.devices_list.get(i))
    }

    pub fn device_exists(&self, device_id: &str) -> bool {
        self.by_device_id.contains_key(device_id)
    }

    pub fn get_unassigned_devices(&self) -> Vec<&Device> {
        self.doc
            .devices_list
            .iter()
            .filter(|d| !d.user_assigned)
            .collect()
    }

    pub fn get_devices_by_model(&self, model: &str) -> Vec<&Device> {
        match self.by_model.get(model) {
            Some(idxs) => idxs
                .iter()
                .filter_map(|&i| self.doc.devices_list.get(i))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn get_service(&self, service_id: &str) -> Option<&Service> {
        self.by_service_id
            .get(service_id)
            .and_then(|&i| self.doc.services_list.get(i))
    }

    pub fn get_user(&self, user_id: &str) -> Option<&User> {
        self.by_user_id
            .get(&user_id.to_lowercase())
            .and_then(|&i| self.doc.users_list.get(i))
    }

    pub fn get_user_by_chat(&self, chat_id: &str) -> Option<&User> {
        self.by_chat_id
            .get(chat_id)
            .and_then(|&i| self.doc.users_list.get(i))
    }

    pub fn get_user_devices(&self, user_id: &str) -> Result<Vec<&Device>> {
        let user = self
            .get_user(user_id)
            .ok_or_else(|| Error::NotFound(format!("user '{}'", user_id)))?;
        let ids: Vec<&str> = user.devices_list.iter().map(|d| d.device_id.as_str()).collect();

        Ok(self
            .doc
            .devices_list
            .iter()
            .filter(|d| ids.contains(&d.device_id.as_str()))
            .collect())
    }

    // ------------------------------------------------------- mutations

    /// Registers a device, or (idempotently, keyed on MAC) syncs an
    /// existing one (§3 Lifecycles, §8 invariant 2). Structural fields
    /// of an existing device ("first write wins", §9 Open Questions)
    /// are never updated on a repeat registration — only `last_sync`.
    pub fn register_device(
        &mut self,
        mac_address: &str,
        model: &str,
        sensors: Vec<String>,
        firmware_version: String,
    ) -> Result<RegisterDeviceOutcome> {
        let mac = normalize_mac(mac_address)?;

        if let Some(&i) = self.by_mac.get(&mac) {
            let d = &mut self.doc.devices_list[i];
            d.last_sync = Utc::now();
            return Ok(RegisterDeviceOutcome::Synced(d.clone()));
        }

        let model_cfg = self
            .doc
            .device_models
            .get(model)
            .ok_or_else(|| Error::Validation(format!("unsupported_model: {}", model)))?
            .clone();

        let device_id = derive_device_id(mac_address)?;
        let now = Utc::now();
        let device = Device {
            device_id: device_id.clone(),
            mac_address: mac_address.to_string(),
            model: model.to_string(),
            firmware_version,
            mqtt_topics: Device::derive_topics(model, &device_id, &sensors),
            sensors,
            mqtt_config: model_cfg.mqtt,
            status: String::from("registered"),
            user_assigned: false,
            owner: None,
            user_device_name: None,
            registration_time: now,
            assignment_time: None,
            last_sync: now,
        };

        self.doc.devices_list.push(device.clone());
        self.rebuild_indices();
        Ok(RegisterDeviceOutcome::Registered(device))
    }

    /// Upserts a service by `serviceID` (§3 Lifecycles).
    pub fn register_service(&mut self, data: ServiceRegistration) -> RegisterServiceOutcome {
        let now = Utc::now();

        if let Some(&i) = self.by_service_id.get(&data.service_id) {
            let existing = &mut self.doc.services_list[i];
            existing.name = data.name;
            existing.description = data.description;
            existing.endpoints = data.endpoints;
            existing.r#type = data.r#type.unwrap_or_else(|| existing.r#type.clone());
            existing.version = data.version.unwrap_or_else(|| existing.version.clone());
            existing.status = String::from("active");
            existing.last_update = now;
            return RegisterServiceOutcome::Updated(existing.clone());
        }

        let service = Service {
            service_id: data.service_id,
            name: data.name,
            description: data.description,
            endpoints: data.endpoints,
            r#type: data.r#type.unwrap_or_else(|| String::from("microservice")),
            version: data.version.unwrap_or_else(|| String::from("1.0.0")),
            status: String::from("active"),
            registration_time: Some(now),
            last_update: now,
        };

        self.doc.services_list.push(service.clone());
        self.rebuild_indices();
        RegisterServiceOutcome::Registered(service)
    }

    pub fn create_user(
        &mut self,
        user_id: &str,
        user_name: String,
        telegram_chat_id: Option<String>,
    ) -> Result<User> {
        let user_id_lc = user_id.to_lowercase();

        if self.by_user_id.contains_key(&user_id_lc) {
            return Err(Error::Conflict(format!("user '{}' already exists", user_id)));
        }

        let user = User {
            user_id: user_id_lc,
            user_name,
            telegram_chat_id,
            devices_list: Vec::new(),
            registration_time: Utc::now(),
        };

        self.doc.users_list.push(user.clone());
        self.rebuild_indices();
        Ok(user)
    }

    /// Deletes a user, cascading an unassignment of every device they
    /// own before removing the user record (§3 Lifecycles, §8
    /// invariant 3).
    pub fn delete_user(&mut self, user_id: &str) -> Result<DeleteUserOutcome> {
        let i = *self
            .by_user_id
            .get(&user_id.to_lowercase())
            .ok_or_else(|| Error::NotFound(format!("user '{}'", user_id)))?;
        let user = self.doc.users_list.remove(i);

        let mut unassigned_device_ids = Vec::new();
        for d in self.doc.devices_list.iter_mut() {
            if d.owner.as_deref() == Some(user.user_id.as_str()) {
                d.user_assigned = false;
                d.owner = None;
                d.user_device_name = None;
                d.assignment_time = None;
                unassigned_device_ids.push(d.device_id.clone());
            }
        }

        self.rebuild_indices();
        Ok(DeleteUserOutcome {
            user,
            unassigned_device_ids,
        })
    }

    pub fn assign_device_to_user(
        &mut self,
        user_id: &str,
        device_id: &str,
        device_name: String,
    ) -> Result<Device> {
        let user_i = *self
            .by_user_id
            .get(&user_id.to_lowercase())
            .ok_or_else(|| Error::NotFound(format!("user '{}'", user_id)))?;
        let device_i = *self
            .by_device_id
            .get(device_id)
            .ok_or_else(|| Error::NotFound(format!("device '{}'", device_id)))?;

        if self.doc.devices_list[device_i].user_assigned {
            return Err(Error::Conflict(format!(
                "device '{}' already assigned to another user",
                device_id
            )));
        }

        let now = Utc::now();
        let user_id_canonical = self.doc.users_list[user_i].user_id.clone();

        self.doc.users_list[user_i].devices_list.push(UserDevice {
            device_id: device_id.to_string(),
            device_name: device_name.clone(),
        });

        let device = &mut self.doc.devices_list[device_i];
        device.user_assigned = true;
        device.owner = Some(user_id_canonical);
        device.user_device_name = Some(device_name);
        device.assignment_time = Some(now);

        Ok(device.clone())
    }

    /// Unassigns a device; idempotent (§4.2, §8 Idempotence).
    pub fn unassign_device(&mut self, device_id: &str) -> Result<UnassignOutcome> {
        let device_i = *self
            .by_device_id
            .get(device_id)
            .ok_or_else(|| Error::NotFound(format!("device '{}'", device_id)))?;

        if !self.doc.devices_list[device_i].user_assigned {
            return Ok(UnassignOutcome::AlreadyUnassigned(
                self.doc.devices_list[device_i].clone(),
            ));
        }

        let owner_id = self.doc.devices_list[device_i].owner.clone();

        if let Some(owner_id) = owner_id {
            if let Some(&user_i) = self.by_user_id.get(&owner_id.to_lowercase()) {
                self.doc.users_list[user_i]
                    .devices_list
                    .retain(|d| d.device_id != device_id);
            }
        }

        let device = &mut self.doc.devices_list[device_i];
        device.user_assigned = false;
        device.owner = None;
        device.user_device_name = None;
        device.assignment_time = None;

        Ok(UnassignOutcome::Unassigned(device.clone()))
    }

    pub fn rename_device(&mut self, device_id: &str, new_name: &str) -> Result<Device> {
        if new_name.is_empty() {
            return Err(Error::Validation("user_device_name is required".into()));
        }
        if new_name.chars().count() > MAX_DEVICE_NAME_LEN {
            return Err(Error::Validation(format!(
                "device name too long (max {} characters)",
                MAX_DEVICE_NAME_LEN
            )));
        }

        let device_i = *self
            .by_device_id
            .get(device_id)
            .ok_or_else(|| Error::NotFound(format!("device '{}'", device_id)))?;

        self.doc.devices_list[device_i].user_device_name = Some(new_name.to_string());
        let owner = self.doc.devices_list[device_i].owner.clone();

        if let Some(owner) = owner {
            if let Some(&user_i) = self.by_user_id.get(&owner.to_lowercase()) {
                if let Some(entry) = self.doc.users_list[user_i]
                    .devices_list
                    .iter_mut()
                    .find(|d| d.device_id == device_id)
                {
                    entry.device_name = new_name.to_string();
                }
            }
        }

        Ok(self.doc.devices_list[device_i].clone())
    }

    pub fn link_telegram(&mut self, user_id: &str, chat_id: &str) -> Result<()> {
        let i = *self
            .by_user_id
            .get(&user_id.to_lowercase())
            .ok_or_else(|| Error::NotFound(format!("user '{}'", user_id)))?;

        self.doc.users_list[i].telegram_chat_id = Some(chat_id.to_string());
        self.rebuild_indices();
        Ok(())
    }

    pub fn validate_user_id(user_id: &str) -> Result<()> {
        if is_valid_user_id(user_id) {
            Ok(())
        } else {
            Err(Error::Validation(
                "userID must be 3-32 characters of [A-Za-z0-9_.-]".into(),
            ))
        }
    }

    /// Backs `GET /health`.
    pub fn health(&self) -> serde_json::Value {
        serde_json::json!({
            "status": "healthy",
            "service": "SmartChill Registry Service",
            "timestamp": Utc::now(),
            "devices_count": self.doc.devices_list.len(),
            "services_count": self.doc.services_list.len(),
        })
    }

    /// Backs `GET /info`.
    pub fn stats(&self) -> serde_json::Value {
        let total_devices = self.doc.devices_list.len();
        let assigned_devices = self
            .doc
            .devices_list
            .iter()
            .filter(|d| d.user_assigned)
            .count();

        let mut devices_by_model: HashMap<&str, usize> = HashMap::new();
        for d in &self.doc.devices_list {
            *devices_by_model.entry(d.model.as_str()).or_default() += 1;
        }

        serde_json::json!({
            "project": {
                "owner": self.doc.project_owner,
                "name": self.doc.project_name,
                "last_update": self.doc.last_update,
                "schema_version": self.doc.schema_version,
            },
            "broker": self.doc.broker,
            "statistics": {
                "total_devices": total_devices,
                "assigned_devices": assigned_devices,
                "unassigned_devices": total_devices - assigned_devices,
                "total_users": self.doc.users_list.len(),
                "total_services": self.doc.services_list.len(),
                "supported_models": self.doc.device_models.len(),
                "devices_by_model": devices_by_model,
            },
            "supported_models": self.doc.device_models.keys().collect::<Vec<_>>(),
        })
    }

    /// Backs `GET /mqtt/topics`.
    pub fn mqtt_topics(&self) -> serde_json::Value {
        let device_topics: HashMap<&str, serde_json::Value> = self
            .doc
            .devices_list
            .iter()
            .map(|d| {
                (
                    d.device_id.as_str(),
                    serde_json::json!({
                        "model": d.model,
                        "topics": d.mqtt_topics,
                        "mqtt_config": d.mqtt_config,
                    }),
                )
            })
            .collect();

        let service_topics: HashMap<&str, serde_json::Value> = self
            .doc
            .services_list
            .iter()
            .map(|s| (s.service_id.as_str(), serde_json::json!({ "endpoints": s.endpoints })))
            .collect();

        serde_json::json!({ "device_topics": device_topics, "service_topics": service_topics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartchill_api::device::DeviceModel;

    fn state_with_model() -> State {
        let mut doc = RegistryDocument::seed(Utc::now());
        doc.device_models.insert(
            "M1".to_string(),
            DeviceModel {
                sensors: vec!["temp".to_string()],
                mqtt: Default::default(),
            },
        );
        State::new(doc)
    }

    #[test]
    fn register_device_is_idempotent_by_mac() {
        let mut state = state_with_model();

        let first = state
            .register_device("AA:BB:CC:11:22:33", "M1", vec!["temp".into()], "1.0".into())
            .unwrap();
        let id = match first {
            RegisterDeviceOutcome::Registered(d) => d.device_id,
            _ => panic!("expected Registered"),
        };
        assert_eq!(id, "SmartChill_112233");

        let second = state
            .register_device("aa-bb-cc-11-22-33", "M1", vec!["humidity".into()], "2.0".into())
            .unwrap();

        match second {
            RegisterDeviceOutcome::Synced(d) => {
                assert_eq!(d.device_id, id);
                // "first write wins" (§9): sensors/firmware unchanged.
                assert_eq!(d.sensors, vec!["temp".to_string()]);
                assert_eq!(d.firmware_version, "1.0");
            }
            _ => panic!("expected Synced"),
        }
    }

    #[test]
    fn unsupported_model_is_rejected() {
        let mut state = state_with_model();
        let err = state
            .register_device("AA:BB:CC:11:22:33", "unknown", vec![], "1.0".into())
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn assign_then_rename_updates_both_sides() {
        let mut state = state_with_model();
        state
            .register_device("AA:BB:CC:11:22:33", "M1", vec!["temp".into()], "1.0".into())
            .unwrap();
        state
            .create_user("alice", "Alice".into(), None)
            .unwrap();
        state
            .assign_device_to_user("alice", "SmartChill_112233", "Kitchen".into())
            .unwrap();
        state
            .rename_device("SmartChill_112233", "Kitchen2")
            .unwrap();

        let device = state.get_device("SmartChill_112233").unwrap();
        assert_eq!(device.user_device_name.as_deref(), Some("Kitchen2"));
        assert!(device.assignment_invariant_holds());

        let user = state.get_user("alice").unwrap();
        assert_eq!(user.devices_list[0].device_name, "Kitchen2");
    }

    #[test]
    fn delete_user_cascades_unassignment() {
        let mut state = state_with_model();
        state
            .register_device("AA:BB:CC:11:22:33", "M1", vec!["temp".into()], "1.0".into())
            .unwrap();
        state.create_user("alice", "Alice".into(), Some("555".into())).unwrap();
        state
            .assign_device_to_user("alice", "SmartChill_112233", "Kitchen".into())
            .unwrap();

        let outcome = state.delete_user("alice").unwrap();
        assert_eq!(outcome.unassigned_device_ids, vec!["SmartChill_112233"]);

        let device = state.get_device("SmartChill_112233").unwrap();
        assert!(!device.user_assigned);
        assert!(device.owner.is_none());
        assert!(state.get_user_by_chat("555").is_none());
    }

    #[test]
    fn unassign_device_is_idempotent() {
        let mut state = state_with_model();
        state
            .register_device("AA:BB:CC:11:22:33", "M1", vec!["temp".into()], "1.0".into())
            .unwrap();

        let first = state.unassign_device("SmartChill_112233").unwrap();
        assert!(matches!(first, UnassignOutcome::AlreadyUnassigned(_)));

        let second = state.unassign_device("SmartChill_112233").unwrap();
        assert!(matches!(second, UnassignOutcome::AlreadyUnassigned(_)));
    }

    #[test]
    fn rename_rejects_names_over_fifty_chars() {
        let mut state = state_with_model();
        state
            .register_device("AA:BB:CC:11:22:33", "M1", vec!["temp".into()], "1.0".into())
            .unwrap();

        assert!(state
            .rename_device("SmartChill_112233", &"a".repeat(50))
            .is_ok());
        assert!(state
            .rename_device("SmartChill_112233", &"a".repeat(51))
            .is_err());
    }
}
