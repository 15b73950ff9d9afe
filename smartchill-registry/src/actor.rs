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

//! Serializes all access to the `Store` behind a single task, the way
//! `drmemd::core::State::run` serializes driver/client requests over
//! an `mpsc` channel (§4.2 "single exclusive critical section"). Every
//! mutating request is handled, persisted, and replied to before the
//! next one is dequeued; reads never block behind a snapshot write
//! they don't need because they're handled by the same loop in the
//! order they arrive, with no separate lock to contend for.

use crate::persistence::{self, Persistence};
use crate::store::{
    DeleteUserOutcome, RegisterDeviceOutcome, RegisterServiceOutcome, State, UnassignOutcome,
};
use serde_json::Value;
use smartchill_api::device::Device;
use smartchill_api::error::Result;
use smartchill_api::service::ServiceRegistration;
use smartchill_api::user::User;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

type Reply<T> = oneshot::Sender<Result<T>>;

pub enum Request {
    RegisterDevice {
        mac_address: String,
        model: String,
        sensors: Vec<String>,
        firmware_version: String,
        reply: Reply<RegisterDeviceOutcome>,
    },
    RegisterService {
        data: ServiceRegistration,
        reply: Reply<RegisterServiceOutcome>,
    },
    CreateUser {
        user_id: String,
        user_name: String,
        telegram_chat_id: Option<String>,
        reply: Reply<User>,
    },
    DeleteUser {
        user_id: String,
        reply: Reply<DeleteUserOutcome>,
    },
    AssignDevice {
        user_id: String,
        device_id: String,
        device_name: String,
        reply: Reply<Device>,
    },
    UnassignDevice {
        device_id: String,
        reply: Reply<UnassignOutcome>,
    },
    RenameDevice {
        device_id: String,
        new_name: String,
        reply: Reply<Device>,
    },
    LinkTelegram {
        user_id: String,
        chat_id: String,
        reply: Reply<()>,
    },
    /// Every read-only endpoint funnels through here: the closure runs
    /// against `&State` inside the actor and returns the JSON the HTTP
    /// layer will send back verbatim.
    Query(Box<dyn FnOnce(&State) -> Value + Send>, oneshot::Sender<Value>),
}

/// A cheap, cloneable handle to the actor; this is what the HTTP layer
/// holds and what `warp::any().map(move || handle.clone())` injects
/// into every filter, mirroring `drmemd::graphql`'s context injection.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<Request>,
}

impl StoreHandle {
    pub async fn register_device(
        &self,
        mac_address: String,
        model: String,
        sensors: Vec<String>,
        firmware_version: String,
    ) -> Result<RegisterDeviceOutcome> {
        self.call(|reply| Request::RegisterDevice {
            mac_address,
            model,
            sensors,
            firmware_version,
            reply,
        })
        .await
    }

    pub async fn register_service(
        &self,
        data: ServiceRegistration,
    ) -> Result<RegisterServiceOutcome> {
        self.call(|reply| Request::RegisterService { data, reply }).await
    }

    pub async fn create_user(
        &self,
        user_id: String,
        user_name: String,
        telegram_chat_id: Option<String>,
    ) -> Result<User> {
        self.call(|reply| Request::CreateUser {
            user_id,
            user_name,
            telegram_chat_id,
            reply,
        })
        .await
    }

    pub async fn delete_user(&self, user_id: String) -> Result<DeleteUserOutcome> {
        self.call(|reply| Request::DeleteUser { user_id, reply }).await
    }

    pub async fn assign_device(
        &self,
        user_id: String,
        device_id: String,
        device_name: String,
    ) -> Result<Device> {
        self.call(|reply| Request::AssignDevice {
            user_id,
            device_id,
            device_name,
            reply,
        })
        .await
    }

    pub async fn unassign_device(&self, device_id: String) -> Result<UnassignOutcome> {
        self.call(|reply| Request::UnassignDevice { device_id, reply }).await
    }

    pub async fn rename_device(&self, device_id: String, new_name: String) -> Result<Device> {
        self.call(|reply| Request::RenameDevice {
            device_id,
            new_name,
            reply,
        })
        .await
    }

    pub async fn link_telegram(&self, user_id: String, chat_id: String) -> Result<()> {
        self.call(|reply| Request::LinkTelegram {
            user_id,
            chat_id,
            reply,
        })
        .await
    }

    pub async fn query<F>(&self, f: F) -> Result<Value>
    where
        F: FnOnce(&State) -> Value + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        self.tx.send(Request::Query(Box::new(f), tx)).await?;
        Ok(rx.await?)
    }

    async fn call<T, F>(&self, build: F) -> Result<T>
    where
        F: FnOnce(Reply<T>) -> Request,
    {
        let (tx, rx) = oneshot::channel();

        self.tx.send(build(tx)).await?;
        rx.await?
    }
}

fn reply<T>(reply: Reply<T>, result: Result<T>) {
    if reply.send(result).is_err() {
        warn!("caller went away before the reply could be delivered");
    }
}

async fn persist(persistence: &Persistence, state: &mut State) -> Result<()> {
    match persistence.save(&mut state.doc).await {
        Ok(()) => Ok(()),
        Err(e) => {
            persistence::log_save_failure(&e);
            Err(e)
        }
    }
}

/// Wraps a mutation so its success is only reported once the snapshot
/// write has also been attempted, without undoing the in-memory
/// mutation on a save failure (§4.1, §7).
async fn mutate_and_persist<T>(
    persistence: &Persistence,
    state: &mut State,
    mutation: Result<T>,
) -> Result<T> {
    let value = mutation?;
    persist(persistence, state).await?;
    Ok(value)
}

async fn run(mut state: State, persistence: Persistence, mut rx: mpsc::Receiver<Request>) {
    info!("registry store actor starting");

    while let Some(req) = rx.recv().await {
        match req {
            Request::RegisterDevice {
                mac_address,
                model,
                sensors,
                firmware_version,
                reply: rpy,
            } => {
                let result = state.register_device(&mac_address, &model, sensors, firmware_version);
                reply(rpy, mutate_and_persist(&persistence, &mut state, result).await);
            }
            Request::RegisterService { data, reply: rpy } => {
                let outcome = state.register_service(data);
                reply(rpy, mutate_and_persist(&persistence, &mut state, Ok(outcome)).await);
            }
            Request::CreateUser {
                user_id,
                user_name,
                telegram_chat_id,
                reply: rpy,
            } => {
                let result = State::validate_user_id(&user_id)
                    .and_then(|()| state.create_user(&user_id, user_name, telegram_chat_id));
                reply(rpy, mutate_and_persist(&persistence, &mut state, result).await);
            }
            Request::DeleteUser { user_id, reply: rpy } => {
                let result = state.delete_user(&user_id);
                reply(rpy, mutate_and_persist(&persistence, &mut state, result).await);
            }
            Request::AssignDevice {
                user_id,
                device_id,
                device_name,
                reply: rpy,
            } => {
                let result = state.assign_device_to_user(&user_id, &device_id, device_name);
                reply(rpy, mutate_and_persist(&persistence, &mut state, result).await);
            }
            Request::UnassignDevice { device_id, reply: rpy } => {
                let result = state.unassign_device(&device_id);
                reply(rpy, mutate_and_persist(&persistence, &mut state, result).await);
            }
            Request::RenameDevice {
                device_id,
                new_name,
                reply: rpy,
            } => {
                let result = state.rename_device(&device_id, &new_name);
                reply(rpy, mutate_and_persist(&persistence, &mut state, result).await);
            }
            Request::LinkTelegram {
                user_id,
                chat_id,
                reply: rpy,
            } => {
                let result = state.link_telegram(&user_id, &chat_id);
                reply(rpy, mutate_and_persist(&persistence, &mut state, result).await);
            }
            Request::Query(f, rpy) => {
                let value = f(&state);
                if rpy.send(value).is_err() {
                    warn!("caller went away before a query reply could be delivered");
                }
            }
        }
    }
    warn!("registry store actor exiting: no senders left");
}

/// Spawns the actor task and returns a handle to it.
pub fn spawn(state: State, persistence: Persistence) -> StoreHandle {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(run(state, persistence, rx));
    StoreHandle { tx }
}
