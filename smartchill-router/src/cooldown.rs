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

//! Per-chat alert cooldown (§4.7 step 3, §5 "Shared-resource policy").
//! Mutated only under the Router's own lock; never shared across
//! component boundaries. Grounded on the "one lock owns one map" idiom
//! used throughout the Registry's `State`, scaled down to a single
//! `HashMap`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CooldownKey {
    pub chat_id: String,
    pub alert_type: String,
    pub device_id: String,
}

#[derive(Default)]
pub struct CooldownTable {
    last_sent: Mutex<HashMap<CooldownKey, DateTime<Utc>>>,
}

impl CooldownTable {
    pub fn new() -> Self {
        CooldownTable::default()
    }

    /// True if a notification for `key` may be sent right now.
    /// Resolution alerts (`door_closed*`) always pass and never update
    /// the map (§4.7 step 3).
    pub fn allows(&self, key: &CooldownKey, now: DateTime<Utc>, cooldown_minutes: i64) -> bool {
        let last_sent = self.last_sent.lock().unwrap();
        match last_sent.get(key) {
            Some(last) => (now - *last).num_minutes() >= cooldown_minutes,
            None => true,
        }
    }

    pub fn record_sent(&self, key: CooldownKey, now: DateTime<Utc>) {
        self.last_sent.lock().unwrap().insert(key, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn key() -> CooldownKey {
        CooldownKey {
            chat_id: "123".into(),
            alert_type: "DoorTimeout".into(),
            device_id: "SmartChill_112233".into(),
        }
    }

    #[test]
    fn first_send_is_always_allowed() {
        let table = CooldownTable::new();
        assert!(table.allows(&key(), Utc::now(), 30));
    }

    #[test]
    fn suppresses_within_cooldown_window_then_allows_after() {
        let table = CooldownTable::new();
        let t0 = Utc::now();

        table.record_sent(key(), t0);
        assert!(!table.allows(&key(), t0 + ChronoDuration::minutes(10), 30));
        assert!(table.allows(&key(), t0 + ChronoDuration::minutes(31), 30));
    }
}
