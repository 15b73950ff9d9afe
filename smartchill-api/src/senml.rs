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

//! The SenML-like record format used for sensor and door events (§4.5).
//!
//! ```json
//! {"bn": "Group17/SmartChill/Devices/M1/SmartChill_112233/",
//!  "bt": 1700000000, "e": [{"n": "temp", "v": 4.2, "u": "Cel", "t": 0}]}
//! ```

use crate::error::{Error, Result};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One entry of the `e` array. Carries either a numeric (`v`) or string
/// (`vs`) value; unknown SenML fields round-trip via `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub n: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub u: Option<String>,
    #[serde(default)]
    pub t: f64,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A decoded SenML record, with the per-entry timestamp resolved to an
/// absolute value (`bt + t`) and the device id extracted from `bn`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub device_id: String,
    pub base_name: String,
    pub entries: Vec<DecodedEntry>,
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntry {
    pub name: String,
    pub value: EntryValue,
    pub unit: Option<String>,
    pub absolute_time: f64,
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    Number(f64),
    Text(String),
}

/// The wire shape: `{bn, bt, e: [...]}` plus any pass-through fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Wire {
    #[serde(skip_serializing_if = "Option::is_none")]
    bn: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    bt: f64,
    e: Vec<Entry>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

/// Decodes a raw SenML payload into a `Record`. The device id is the
/// base-name with its trailing `/` stripped, taking the final path
/// segment (e.g. `.../SmartChill_112233/` -> `SmartChill_112233`).
pub fn decode(raw: &[u8]) -> Result<Record> {
    let wire: Wire = serde_json::from_slice(raw)
        .map_err(|e| Error::ParseError(format!("invalid SenML payload: {}", e)))?;

    let base_name = wire.bn.clone().unwrap_or_default();
    let device_id = base_name
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string();

    let entries = wire
        .e
        .into_iter()
        .map(|entry| {
            let value = if let Some(vs) = entry.vs {
                EntryValue::Text(vs)
            } else {
                EntryValue::Number(entry.v.unwrap_or(0.0))
            };

            DecodedEntry {
                name: entry.n,
                value,
                unit: entry.u,
                absolute_time: wire.bt + entry.t,
                extra: entry.extra,
            }
        })
        .collect();

    Ok(Record {
        device_id,
        base_name,
        entries,
        extra: wire.extra,
    })
}

/// Encodes a `Record` back into the SenML wire shape. Inverse of
/// `decode`, modulo `t` being re-derived relative to the first entry's
/// absolute timestamp (the smallest `bt` that reproduces every `t`).
pub fn encode(record: &Record) -> Vec<u8> {
    let bt = record
        .entries
        .iter()
        .map(|e| e.absolute_time)
        .fold(f64::INFINITY, f64::min);
    let bt = if bt.is_finite() { bt } else { 0.0 };

    let e = record
        .entries
        .iter()
        .map(|entry| {
            let (v, vs) = match &entry.value {
                EntryValue::Number(n) => (Some(*n), None),
                EntryValue::Text(s) => (None, Some(s.clone())),
            };

            Entry {
                n: entry.name.clone(),
                v,
                vs,
                u: entry.unit.clone(),
                t: entry.absolute_time - bt,
                extra: entry.extra.clone(),
            }
        })
        .collect();

    let wire = Wire {
        bn: Some(record.base_name.clone()),
        bt,
        e,
        extra: record.extra.clone(),
    };

    serde_json::to_vec(&wire).expect("SenML records always serialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            device_id: "SmartChill_112233".to_string(),
            base_name: "Group17/SmartChill/Devices/M1/SmartChill_112233/".to_string(),
            entries: vec![DecodedEntry {
                name: "temp".to_string(),
                value: EntryValue::Number(4.2),
                unit: Some("Cel".to_string()),
                absolute_time: 1_700_000_000.0,
                extra: HashMap::new(),
            }],
            extra: HashMap::new(),
        }
    }

    #[test]
    fn decode_extracts_device_id_from_base_name() {
        let rec = sample();
        let wire = encode(&rec);
        let decoded = decode(&wire).unwrap();

        assert_eq!(decoded.device_id, "SmartChill_112233");
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let rec = sample();
        let decoded = decode(&encode(&rec)).unwrap();

        assert_eq!(decoded, rec);
    }

    #[test]
    fn absolute_timestamp_is_base_time_plus_t() {
        let raw = br#"{"bn":"x/y/z/","bt":1000,"e":[{"n":"temp","v":1.0,"t":5}]}"#;
        let decoded = decode(raw).unwrap();

        assert_eq!(decoded.entries[0].absolute_time, 1005.0);
    }

    #[test]
    fn preserves_unknown_fields_on_pass_through() {
        let raw = br#"{"bn":"x/y/z/","bt":0,"e":[{"n":"temp","v":1.0,"t":0,"extra_field":"keep"}],"custom":true}"#;
        let decoded = decode(raw).unwrap();

        assert_eq!(
            decoded.entries[0].extra.get("extra_field").unwrap(),
            "keep"
        );
        assert_eq!(decoded.extra.get("custom").unwrap(), true);
    }
}
