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

//! The versioned root document persisted by the Registry (§3, §4.1).

use crate::device::{Device, DeviceModel};
use crate::service::Service;
use crate::user::User;
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broker {
    #[serde(rename = "IP")]
    pub address: String,
    pub port: String,
}

impl Default for Broker {
    fn default() -> Self {
        Broker {
            address: String::from("mosquitto"),
            port: String::from("1883"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "projectOwner")]
    pub project_owner: String,
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
    pub broker: Broker,
    #[serde(rename = "deviceModels", default)]
    pub device_models: HashMap<String, DeviceModel>,
    #[serde(rename = "devicesList", default)]
    pub devices_list: Vec<Device>,
    #[serde(rename = "usersList", default)]
    pub users_list: Vec<User>,
    #[serde(rename = "servicesList", default)]
    pub services_list: Vec<Service>,
}

impl RegistryDocument {
    /// Returns the well-defined empty document (§4.1): schema version
    /// 1, a seed `admin` user, and empty lists. Produced when no
    /// snapshot file exists yet (mirrors `CatalogDataManager.load_catalog`
    /// in `original_source/Catalog/modules/data_manager.py`).
    pub fn seed(now: DateTime<Utc>) -> Self {
        RegistryDocument {
            schema_version: 1,
            project_owner: String::from("Group17"),
            project_name: String::from("SmartChill"),
            last_update: now,
            broker: Broker::default(),
            device_models: HashMap::new(),
            devices_list: Vec::new(),
            users_list: vec![User {
                user_id: String::from("admin"),
                user_name: String::from("Administrator"),
                telegram_chat_id: None,
                devices_list: Vec::new(),
                registration_time: now,
            }],
            services_list: Vec::new(),
        }
    }
}
