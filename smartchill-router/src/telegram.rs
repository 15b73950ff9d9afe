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

//! A minimal Telegram Bot API client over `reqwest`, covering exactly the
//! calls the Interaction Engine and Notification Router need: long-poll
//! for updates, send/edit a message, answer a callback query, and set the
//! bot's command descriptions on start (§6 `telegram.TOKEN`,
//! `SET_DESCRIPTIONS_ON_START`). Grounded on `telepot`'s surface in
//! `examples/original_source/TelegramBot`, re-expressed as a typed HTTP
//! client the way `smartchill_control::catalog_client` wraps the Registry.

use serde_derive::{Deserialize, Serialize};
use smartchill_api::error::{Error, Result};
use std::time::Duration;

const LONG_POLL_SLACK: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub chat: TgChat,
    #[serde(default)]
    pub text: Option<String>,
    pub from: Option<TgUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgCallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<TgMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChatMemberUpdated {
    pub chat: TgChat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    pub message: Option<TgMessage>,
    pub callback_query: Option<TgCallbackQuery>,
    pub my_chat_member: Option<TgChatMemberUpdated>,
}

#[derive(Debug, Deserialize)]
struct TgResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str, poll_timeout: Duration) -> Self {
        TelegramClient {
            http: reqwest::Client::builder()
                .timeout(poll_timeout + LONG_POLL_SLACK)
                .build()
                .expect("reqwest client builds with a fixed timeout"),
            base_url: format!("https://api.telegram.org/bot{}", token),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("telegram unreachable: {}", e)))?;

        let parsed: TgResponse<T> = resp
            .json()
            .await
            .map_err(|e| Error::ParseError(format!("malformed telegram reply: {}", e)))?;

        if parsed.ok {
            parsed
                .result
                .ok_or_else(|| Error::ParseError("telegram reply missing result".into()))
        } else {
            Err(Error::Transient(parsed.description.unwrap_or_else(|| "telegram call failed".into())))
        }
    }

    /// Long-polls `getUpdates`, acknowledging everything up to `offset - 1`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<TgUpdate>> {
        self.call(
            "getUpdates",
            serde_json::json!({ "offset": offset, "timeout": timeout_secs }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.call::<serde_json::Value>(
            "sendMessage",
            serde_json::json!({ "chat_id": chat_id, "text": text, "parse_mode": "Markdown" }),
        )
        .await
        .map(|_| ())
    }

    pub async fn send_message_with_buttons(&self, chat_id: i64, text: &str, rows: &[Vec<InlineButton>]) -> Result<i64> {
        let keyboard: Vec<Vec<serde_json::Value>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| serde_json::json!({ "text": b.text, "callback_data": b.callback_data }))
                    .collect()
            })
            .collect();

        let result: TgMessage = self
            .call(
                "sendMessage",
                serde_json::json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "Markdown",
                    "reply_markup": { "inline_keyboard": keyboard },
                }),
            )
            .await?;
        Ok(result.message_id)
    }

    pub async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        self.call::<serde_json::Value>(
            "editMessageText",
            serde_json::json!({ "chat_id": chat_id, "message_id": message_id, "text": text, "parse_mode": "Markdown" }),
        )
        .await
        .map(|_| ())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        self.call::<serde_json::Value>(
            "answerCallbackQuery",
            serde_json::json!({ "callback_query_id": callback_query_id }),
        )
        .await
        .map(|_| ())
    }

    pub async fn set_my_commands(&self, commands: &[(&str, &str)]) -> Result<()> {
        let commands: Vec<serde_json::Value> = commands
            .iter()
            .map(|(cmd, desc)| serde_json::json!({ "command": cmd, "description": desc }))
            .collect();

        self.call::<serde_json::Value>("setMyCommands", serde_json::json!({ "commands": commands }))
            .await
            .map(|_| ())
    }
}
