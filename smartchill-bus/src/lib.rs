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

//! Wraps a publish/subscribe client for the SmartChill bus (§4.4).
//!
//! `BusClient` is the thin interface every Control Service and the
//! Notification Router program against; `MqttBusClient` is the only
//! implementation, built on `rumqttc`. Incoming messages are delivered
//! through a bounded channel rather than a callback so the network
//! event loop (`rumqttc::EventLoop::poll`) is never blocked by slow
//! application code, matching the "must not block" requirement.

use async_trait::async_trait;
use smartchill_api::error::{Error, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DISPATCH_CHAN_SIZE: usize = 256;

/// A message delivered from the bus: the topic it arrived on and the
/// raw, possibly non-JSON, payload bytes.
#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Configuration needed to reach the broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
}

#[async_trait]
pub trait BusClient: Send + Sync {
    /// Connects with a fresh session, waiting up to 10s for the
    /// broker's CONNACK before returning `Error::Transient`.
    async fn start(&mut self) -> Result<()>;

    /// Subscribes to `topic`. Requires a connected client; returns
    /// whether the broker accepted the subscription.
    async fn subscribe(&self, topic: &str) -> Result<bool>;

    /// Publishes `payload` at an exactly-once QoS. Drops (logging a
    /// warning) if not currently connected.
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<()>;

    /// Unsubscribes from everything and disconnects.
    async fn stop(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// The `rumqttc`-backed implementation of `BusClient`.
pub struct MqttBusClient {
    client: rumqttc::AsyncClient,
    connected: std::sync::Arc<std::sync::atomic::AtomicBool>,
    subscribed: std::sync::Mutex<Vec<String>>,
}

impl MqttBusClient {
    /// Builds the client and spawns the task that drives `EventLoop`.
    /// Returns the client handle plus the receiver end of the
    /// dispatch channel; the caller owns draining that channel (the
    /// "single dispatch callback" of §4.4).
    pub fn new(cfg: &BrokerConfig) -> (Self, mpsc::Receiver<Message>) {
        let mut mqtt_opts =
            rumqttc::MqttOptions::new(cfg.client_id.clone(), cfg.host.clone(), cfg.port);
        mqtt_opts.set_keep_alive(Duration::from_secs(30));
        mqtt_opts.set_clean_session(true);

        let (client, mut event_loop) = rumqttc::AsyncClient::new(mqtt_opts, 64);
        let (tx, rx) = mpsc::channel(DISPATCH_CHAN_SIZE);
        let connected = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let connected_bg = connected.clone();

        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                        connected_bg.store(true, std::sync::atomic::Ordering::SeqCst);
                        info!("bus connected");
                    }
                    Ok(rumqttc::Event::Incoming(rumqttc::Packet::Disconnect)) => {
                        connected_bg.store(false, std::sync::atomic::Ordering::SeqCst);
                        warn!("bus disconnected");
                    }
                    Ok(rumqttc::Event::Incoming(rumqttc::Packet::Publish(p))) => {
                        let msg = Message {
                            topic: p.topic.clone(),
                            payload: p.payload.to_vec(),
                        };

                        // A full channel means the application is
                        // falling behind; drop rather than block the
                        // network loop.
                        if tx.try_send(msg).is_err() {
                            warn!(topic = %p.topic, "dispatch channel full, dropping message");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        connected_bg.store(false, std::sync::atomic::Ordering::SeqCst);
                        debug!(error = %e, "bus event loop error");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        });

        (
            MqttBusClient {
                client,
                connected,
                subscribed: std::sync::Mutex::new(Vec::new()),
            },
            rx,
        )
    }
}

#[async_trait]
impl BusClient for MqttBusClient {
    async fn start(&mut self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + CONNECT_TIMEOUT;

        while !self.is_connected() {
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Transient(
                    "timed out waiting for broker CONNACK".into(),
                ));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<bool> {
        if !self.is_connected() {
            warn!(topic, "cannot subscribe, bus not connected");
            return Ok(false);
        }

        match self.client.subscribe(topic, rumqttc::QoS::ExactlyOnce).await {
            Ok(()) => {
                self.subscribed.lock().unwrap().push(topic.to_string());
                Ok(true)
            }
            Err(e) => {
                error!(topic, error = %e, "subscribe failed");
                Ok(false)
            }
        }
    }

    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<()> {
        if !self.is_connected() {
            warn!(topic, "cannot publish, bus not connected");
            return Ok(());
        }

        let bytes = serde_json::to_vec(payload)
            .map_err(|e| Error::ParseError(format!("could not serialize payload: {}", e)))?;

        self.client
            .publish(topic, rumqttc::QoS::ExactlyOnce, false, bytes)
            .await
            .map_err(|e| Error::Transient(format!("publish failed: {}", e)))
    }

    async fn stop(&mut self) -> Result<()> {
        let topics: Vec<String> = self.subscribed.lock().unwrap().drain(..).collect();

        for topic in topics {
            let _ = self.client.unsubscribe(topic).await;
        }
        let _ = self.client.disconnect().await;
        self.connected
            .store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_config_holds_fields_verbatim() {
        let cfg = BrokerConfig {
            host: "mosquitto".into(),
            port: 1883,
            client_id: "door-timer_1".into(),
        };

        assert_eq!(cfg.host, "mosquitto");
        assert_eq!(cfg.port, 1883);
    }
}
