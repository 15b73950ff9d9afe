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

//! HTTP surface of the Registry (§6): a thin `warp::Filter` tree that
//! maps each route onto a `StoreHandle` call and turns the `Result`
//! back into a status code and JSON body. No business logic lives
//! here; it belongs in [`crate::store::State`].

use crate::actor::StoreHandle;
use crate::store::{RegisterDeviceOutcome, RegisterServiceOutcome, UnassignOutcome};
use serde_derive::Deserialize;
use serde_json::json;
use smartchill_api::error::Error;
use smartchill_api::service::ServiceRegistration;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::{Reply, WithStatus};
use warp::Filter;

type JsonReply = WithStatus<warp::reply::Json>;

fn with_store(
    store: StoreHandle,
) -> impl Filter<Extract = (StoreHandle,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(64 * 1024).and(warp::body::json())
}

fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Validation(_) | Error::ParseError(_) => StatusCode::BAD_REQUEST,
        Error::Persistence(_) | Error::Transient(_) | Error::ConfigError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_reply(e: Error) -> JsonReply {
    warp::reply::with_status(warp::reply::json(&json!({ "error": e.to_string() })), status_for(&e))
}

fn ok_reply<T: serde::Serialize>(status: StatusCode, body: &T) -> JsonReply {
    warp::reply::with_status(warp::reply::json(body), status)
}

fn reply_result<T: serde::Serialize>(
    result: Result<T, Error>,
    ok_status: StatusCode,
) -> JsonReply {
    match result {
        Ok(v) => ok_reply(ok_status, &v),
        Err(e) => error_reply(e),
    }
}

#[derive(Deserialize)]
struct RegisterDeviceBody {
    mac_address: String,
    model: String,
    #[serde(default)]
    sensors: Vec<String>,
    firmware_version: Option<String>,
}

#[derive(Deserialize)]
struct RenameBody {
    user_device_name: String,
}

#[derive(Deserialize)]
struct CreateUserBody {
    #[serde(rename = "userID")]
    user_id: String,
    #[serde(rename = "userName")]
    user_name: String,
    telegram_chat_id: Option<String>,
}

#[derive(Deserialize)]
struct AssignDeviceBody {
    device_id: String,
    device_name: Option<String>,
}

#[derive(Deserialize)]
struct LinkTelegramBody {
    chat_id: String,
}

/// Maps a `warp::Rejection` that fell through every route (a malformed
/// body, an unknown path, a wrong method) onto the same JSON error shape
/// `error_reply` produces, so every response is JSON (§4.3) and not just
/// the ones that reach application code.
async fn handle_rejection(err: warp::Rejection) -> Result<JsonReply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("malformed request body: {}", e))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "unhandled rejection".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        status,
    ))
}

/// Builds the full route tree (§6). Every leaf returns `JsonReply` so
/// the `.or()` chain type-checks without boxing each branch; the whole
/// tree is wrapped in `.recover()` so rejections that never reach a
/// leaf (bad JSON, unknown path, wrong method) are JSON too.
pub fn routes(
    store: StoreHandle,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let aggregates = health(store.clone())
        .or(info(store.clone()))
        .or(mqtt_topics_one(store.clone()))
        .or(mqtt_topics_all(store.clone()))
        .or(get_model(store.clone()))
        .or(list_models(store.clone()));

    let devices = register_device(store.clone())
        .or(device_exists(store.clone()))
        .or(unassigned_devices(store.clone()))
        .or(devices_by_model(store.clone()))
        .or(unassign_device(store.clone()))
        .or(rename_device(store.clone()))
        .or(get_device(store.clone()))
        .or(list_devices(store.clone()));

    let services = register_service(store.clone())
        .or(get_service(store.clone()))
        .or(list_services(store.clone()));

    let users = create_user(store.clone())
        .or(user_by_chat(store.clone()))
        .or(user_devices(store.clone()))
        .or(assign_device(store.clone()))
        .or(link_telegram(store.clone()))
        .or(delete_user(store.clone()))
        .or(get_user(store.clone()))
        .or(list_users(store.clone()));

    aggregates
        .or(devices)
        .or(services)
        .or(users)
        .recover(handle_rejection)
        .boxed()
}

fn health(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("health")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|store: StoreHandle| async move {
            Ok::<_, warp::Rejection>(reply_result(store.query(|s| s.health()).await, StatusCode::OK))
        })
}

fn info(store: StoreHandle) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("info")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|store: StoreHandle| async move {
            Ok::<_, warp::Rejection>(reply_result(store.query(|s| s.stats()).await, StatusCode::OK))
        })
}

fn mqtt_topics_all(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("mqtt" / "topics")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|store: StoreHandle| async move {
            Ok::<_, warp::Rejection>(reply_result(store.query(|s| s.mqtt_topics()).await, StatusCode::OK))
        })
}

fn mqtt_topics_one(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("mqtt" / "topics" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(|device_id: String, store: StoreHandle| async move {
            let result = store
                .query(move |s| match s.get_device(&device_id) {
                    Some(d) => json!({
                        "device_id": d.device_id,
                        "topics": d.mqtt_topics,
                        "mqtt_config": d.mqtt_config,
                    }),
                    None => json!(null),
                })
                .await;

            let result = match result {
                Ok(v) if v.is_null() => Err(Error::NotFound("device".into())),
                other => other,
            };
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn list_models(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("models")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|store: StoreHandle| async move {
            let result = store.query(|s| json!(s.doc.device_models)).await;
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn get_model(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("models" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(|model: String, store: StoreHandle| async move {
            let result = store
                .query(move |s| match s.doc.device_models.get(&model) {
                    Some(m) => json!(m),
                    None => json!(null),
                })
                .await;

            let result = match result {
                Ok(v) if v.is_null() => Err(Error::NotFound("model".into())),
                other => other,
            };
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn register_device(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / "register")
        .and(warp::post())
        .and(json_body::<RegisterDeviceBody>())
        .and(with_store(store))
        .and_then(|body: RegisterDeviceBody, store: StoreHandle| async move {
            let result = store
                .register_device(
                    body.mac_address,
                    body.model,
                    body.sensors,
                    body.firmware_version.unwrap_or_else(|| String::from("unknown")),
                )
                .await;

            let reply = match result {
                Ok(RegisterDeviceOutcome::Registered(d)) => ok_reply(StatusCode::CREATED, &d),
                Ok(RegisterDeviceOutcome::Synced(d)) => {
                    ok_reply(StatusCode::OK, &json!({ "status": "synced", "device": d }))
                }
                Err(e) => error_reply(e),
            };
            Ok::<_, warp::Rejection>(reply)
        })
}

fn list_devices(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("devices")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|store: StoreHandle| async move {
            let result = store.query(|s| json!(s.doc.devices_list)).await;
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn get_device(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(|device_id: String, store: StoreHandle| async move {
            let result = store
                .query(move |s| match s.get_device(&device_id) {
                    Some(d) => json!(d),
                    None => json!(null),
                })
                .await;

            let result = match result {
                Ok(v) if v.is_null() => Err(Error::NotFound("device".into())),
                other => other,
            };
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn device_exists(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / String / "exists")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|device_id: String, store: StoreHandle| async move {
            let id_for_reply = device_id.clone();
            let result = store.query(move |s| json!(s.device_exists(&device_id))).await;

            let reply = match result {
                Ok(exists) => ok_reply(
                    StatusCode::OK,
                    &json!({
                        "device_id": id_for_reply,
                        "exists": exists,
                        "timestamp": chrono::Utc::now(),
                    }),
                ),
                Err(e) => error_reply(e),
            };
            Ok::<_, warp::Rejection>(reply)
        })
}

fn unassigned_devices(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / "unassigned")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|store: StoreHandle| async move {
            let result = store.query(|s| json!(s.get_unassigned_devices())).await;
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn devices_by_model(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / "by-model" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(|model: String, store: StoreHandle| async move {
            let result = store.query(move |s| json!(s.get_devices_by_model(&model))).await;
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn unassign_device(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / String / "unassign")
        .and(warp::post())
        .and(with_store(store))
        .and_then(|device_id: String, store: StoreHandle| async move {
            let result = store.unassign_device(device_id).await;

            let reply = match result {
                Ok(UnassignOutcome::Unassigned(d)) => ok_reply(
                    StatusCode::OK,
                    &json!({ "message": "device unassigned", "already_unassigned": false, "device": d }),
                ),
                Ok(UnassignOutcome::AlreadyUnassigned(d)) => ok_reply(
                    StatusCode::OK,
                    &json!({ "message": "device was not assigned", "already_unassigned": true, "device": d }),
                ),
                Err(e) => error_reply(e),
            };
            Ok::<_, warp::Rejection>(reply)
        })
}

fn rename_device(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / String / "rename")
        .and(warp::post())
        .and(json_body::<RenameBody>())
        .and(with_store(store))
        .and_then(|device_id: String, body: RenameBody, store: StoreHandle| async move {
            let result = store.rename_device(device_id, body.user_device_name).await;
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn register_service(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("services" / "register")
        .and(warp::post())
        .and(json_body::<ServiceRegistration>())
        .and(with_store(store))
        .and_then(|body: ServiceRegistration, store: StoreHandle| async move {
            let result = store.register_service(body).await;

            let reply = match result {
                Ok(RegisterServiceOutcome::Registered(s)) => ok_reply(StatusCode::CREATED, &s),
                Ok(RegisterServiceOutcome::Updated(s)) => ok_reply(StatusCode::OK, &s),
                Err(e) => error_reply(e),
            };
            Ok::<_, warp::Rejection>(reply)
        })
}

fn list_services(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("services")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|store: StoreHandle| async move {
            let result = store.query(|s| json!(s.doc.services_list)).await;
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn get_service(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("services" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(|service_id: String, store: StoreHandle| async move {
            let result = store
                .query(move |s| match s.get_service(&service_id) {
                    Some(svc) => json!(svc),
                    None => json!(null),
                })
                .await;

            let result = match result {
                Ok(v) if v.is_null() => Err(Error::NotFound("service".into())),
                other => other,
            };
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn list_users(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("users")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|store: StoreHandle| async move {
            let result = store.query(|s| json!(s.doc.users_list)).await;
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn create_user(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("users")
        .and(warp::post())
        .and(json_body::<CreateUserBody>())
        .and(with_store(store))
        .and_then(|body: CreateUserBody, store: StoreHandle| async move {
            let result = store
                .create_user(body.user_id, body.user_name, body.telegram_chat_id)
                .await;
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::CREATED))
        })
}

fn get_user(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("users" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(|user_id: String, store: StoreHandle| async move {
            let result = store
                .query(move |s| match s.get_user(&user_id) {
                    Some(u) => json!(u),
                    None => json!(null),
                })
                .await;

            let result = match result {
                Ok(v) if v.is_null() => Err(Error::NotFound("user".into())),
                other => other,
            };
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn delete_user(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("users" / String)
        .and(warp::delete())
        .and(with_store(store))
        .and_then(|user_id: String, store: StoreHandle| async move {
            let result = store.delete_user(user_id).await;
            let result = result.map(|outcome| {
                json!({
                    "user": outcome.user,
                    "unassigned_device_ids": outcome.unassigned_device_ids,
                })
            });
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn user_devices(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("users" / String / "devices")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|user_id: String, store: StoreHandle| async move {
            let result = store
                .query(move |s| s.get_user_devices(&user_id).map(|ds| json!(ds)).unwrap_or(json!(null)))
                .await;

            let result = match result {
                Ok(v) if v.is_null() => Err(Error::NotFound("user".into())),
                other => other,
            };
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn assign_device(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("users" / String / "assign-device")
        .and(warp::post())
        .and(json_body::<AssignDeviceBody>())
        .and(with_store(store))
        .and_then(|user_id: String, body: AssignDeviceBody, store: StoreHandle| async move {
            let device_name = body.device_name.unwrap_or_else(|| body.device_id.clone());
            let result = store.assign_device(user_id, body.device_id, device_name).await;
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn link_telegram(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("users" / String / "link_telegram")
        .and(warp::post())
        .and(json_body::<LinkTelegramBody>())
        .and(with_store(store))
        .and_then(|user_id: String, body: LinkTelegramBody, store: StoreHandle| async move {
            let result = store.link_telegram(user_id, body.chat_id).await;
            let result = result.map(|()| json!({ "linked": true }));
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}

fn user_by_chat(
    store: StoreHandle,
) -> impl Filter<Extract = (JsonReply,), Error = warp::Rejection> + Clone {
    warp::path!("users" / "by-chat" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(|chat_id: String, store: StoreHandle| async move {
            let result = store
                .query(move |s| match s.get_user_by_chat(&chat_id) {
                    Some(u) => json!(u),
                    None => json!(null),
                })
                .await;

            let result = match result {
                Ok(v) if v.is_null() => Err(Error::NotFound("user".into())),
                other => other,
            };
            Ok::<_, warp::Rejection>(reply_result(result, StatusCode::OK))
        })
}
