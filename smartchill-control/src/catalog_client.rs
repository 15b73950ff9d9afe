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

//! A thin `reqwest` wrapper around the Registry HTTP surface (§6), used by
//! the control services for device-existence probes and periodic service
//! registration. Grounded on the `reqwest::Client` + typed-error pattern in
//! `drmem-drv-weather-wu`, adapted from an external-API client to an
//! internal one.

use serde_json::Value;
use smartchill_api::error::{Error, Result};
use smartchill_api::service::ServiceRegistration;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(6);

pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        CatalogClient {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("reqwest client builds with a fixed timeout"),
            base_url: base_url.into(),
        }
    }

    /// `GET /devices/{id}/exists` (§4.6 "Auto-registration of devices").
    pub async fn device_exists(&self, device_id: &str) -> Result<bool> {
        let url = format!("{}/devices/{}/exists", self.base_url, device_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("catalog unreachable: {}", e)))?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::ParseError(format!("malformed exists reply: {}", e)))?;

        Ok(body.get("exists").and_then(Value::as_bool).unwrap_or(false))
    }

    /// `POST /services/register` (§4.6 "Periodic service registration").
    pub async fn register_service(&self, registration: &ServiceRegistration) -> Result<()> {
        let url = format!("{}/services/register", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(registration)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("catalog unreachable: {}", e)))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::Transient(format!(
                "service registration rejected: HTTP {}",
                resp.status()
            )))
        }
    }
}
