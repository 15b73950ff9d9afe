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

//! A `reqwest` wrapper around the Registry HTTP surface (§6) used by the
//! Notification Router (to resolve an alert's target chat) and the
//! Interaction Engine (every command and flow step). Grounded on the
//! same `reqwest::Client` pattern as `smartchill_control::catalog_client`.

use serde_json::json;
use smartchill_api::device::Device;
use smartchill_api::service::ServiceRegistration;
use smartchill_api::user::User;
use smartchill_api::error::{Error, Result};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(6);

pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
}

fn transient(e: reqwest::Error) -> Error {
    Error::Transient(format!("registry unreachable: {}", e))
}

fn parse_error(e: reqwest::Error) -> Error {
    Error::ParseError(format!("malformed registry reply: {}", e))
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        RegistryClient {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("reqwest client builds with a fixed timeout"),
            base_url: base_url.into(),
        }
    }

    async fn get_optional<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).send().await.map_err(transient)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Error::Transient(format!("registry returned HTTP {}", resp.status())));
        }
        resp.json().await.map(Some).map_err(parse_error)
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Option<Device>> {
        self.get_optional(&format!("/devices/{}", device_id)).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.get_optional(&format!("/users/{}", user_id)).await
    }

    pub async fn get_user_by_chat(&self, chat_id: &str) -> Result<Option<User>> {
        self.get_optional(&format!("/users/by-chat/{}", chat_id)).await
    }

    pub async fn create_user(&self, user_id: &str, user_name: &str, chat_id: Option<&str>) -> Result<User> {
        let url = format!("{}/users", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&json!({
                "userID": user_id,
                "userName": user_name,
                "telegram_chat_id": chat_id,
            }))
            .send()
            .await
            .map_err(transient)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body: serde_json::Value = resp.json().await.unwrap_or(json!({}));
            let msg = body.get("error").and_then(|v| v.as_str()).unwrap_or("create user failed");
            return Err(match status {
                reqwest::StatusCode::CONFLICT => Error::Conflict(msg.to_string()),
                reqwest::StatusCode::BAD_REQUEST => Error::Validation(msg.to_string()),
                _ => Error::Transient(msg.to_string()),
            });
        }
        resp.json().await.map_err(parse_error)
    }

    pub async fn link_telegram(&self, user_id: &str, chat_id: &str) -> Result<()> {
        let url = format!("{}/users/{}/link_telegram", self.base_url, user_id);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "chat_id": chat_id }))
            .send()
            .await
            .map_err(transient)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::Transient(format!("link_telegram failed: HTTP {}", resp.status())))
        }
    }

    pub async fn assign_device(&self, user_id: &str, device_id: &str, device_name: Option<&str>) -> Result<Device> {
        let url = format!("{}/users/{}/assign-device", self.base_url, user_id);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "device_id": device_id, "device_name": device_name }))
            .send()
            .await
            .map_err(transient)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body: serde_json::Value = resp.json().await.unwrap_or(json!({}));
            let msg = body.get("error").and_then(|v| v.as_str()).unwrap_or("assign device failed");
            return Err(match status {
                reqwest::StatusCode::CONFLICT => Error::Conflict(msg.to_string()),
                reqwest::StatusCode::NOT_FOUND => Error::NotFound(msg.to_string()),
                _ => Error::Transient(msg.to_string()),
            });
        }
        resp.json().await.map_err(parse_error)
    }

    pub async fn unassign_device(&self, device_id: &str) -> Result<()> {
        let url = format!("{}/devices/{}/unassign", self.base_url, device_id);
        let resp = self.http.post(&url).send().await.map_err(transient)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::Transient(format!("unassign failed: HTTP {}", resp.status())))
        }
    }

    pub async fn rename_device(&self, device_id: &str, user_device_name: &str) -> Result<Device> {
        let url = format!("{}/devices/{}/rename", self.base_url, device_id);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "user_device_name": user_device_name }))
            .send()
            .await
            .map_err(transient)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body: serde_json::Value = resp.json().await.unwrap_or(json!({}));
            let msg = body.get("error").and_then(|v| v.as_str()).unwrap_or("rename failed");
            return Err(match status {
                reqwest::StatusCode::BAD_REQUEST => Error::Validation(msg.to_string()),
                reqwest::StatusCode::NOT_FOUND => Error::NotFound(msg.to_string()),
                _ => Error::Transient(msg.to_string()),
            });
        }
        resp.json().await.map_err(parse_error)
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        let url = format!("{}/users/{}", self.base_url, user_id);
        let resp = self.http.delete(&url).send().await.map_err(transient)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::Transient(format!("delete user failed: HTTP {}", resp.status())))
        }
    }

    pub async fn register_service(&self, registration: &ServiceRegistration) -> Result<()> {
        let url = format!("{}/services/register", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(registration)
            .send()
            .await
            .map_err(transient)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::Transient(format!("service registration rejected: HTTP {}", resp.status())))
        }
    }
}
