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

//! User records (§3).

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};

/// An entry in a `User`'s `devicesList`: a device this user owns, plus
/// the label they gave it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDevice {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "deviceName")]
    pub device_name: String,
}

/// A registered SmartChill user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub telegram_chat_id: Option<String>,
    #[serde(rename = "devicesList", default)]
    pub devices_list: Vec<UserDevice>,
    pub registration_time: DateTime<Utc>,
}

/// Validates a `userID`: 3-32 chars of `[A-Za-z0-9_.-]`, matching the
/// Interaction Engine's username flow (§4.8).
pub fn is_valid_user_id(candidate: &str) -> bool {
    let len_ok = (3..=32).contains(&candidate.chars().count());

    len_ok
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_user_ids() {
        assert!(is_valid_user_id("alice_01"));
        assert!(is_valid_user_id("a.b-c"));
    }

    #[test]
    fn rejects_too_short_too_long_or_bad_chars() {
        assert!(!is_valid_user_id("ab"));
        assert!(!is_valid_user_id(&"a".repeat(33)));
        assert!(!is_valid_user_id("alice!"));
    }
}
