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

//! Service records (§3): the control services and the notification
//! router register themselves with the Registry using this shape.

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};

fn default_service_type() -> String {
    String::from("microservice")
}

fn default_version() -> String {
    String::from("1.0.0")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "serviceID")]
    pub service_id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default = "default_service_type")]
    pub r#type: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub status: String,
    pub registration_time: Option<DateTime<Utc>>,
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
}

/// Body accepted by `POST /services/register`, and also what control
/// services and the notification router send *as* the client of that
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRegistration {
    #[serde(rename = "serviceID")]
    pub service_id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
    pub r#type: Option<String>,
    pub version: Option<String>,
}
