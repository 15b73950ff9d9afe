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

//! The door-timer state machine (§4.6): `Closed -> Open -> Alerted ->
//! Closed`, keyed per device. Durations are measured with a monotonic
//! clock (§9 "use monotonic clocks for durations"); only the alert payload
//! itself carries a wall-clock timestamp.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorAlertKind {
    Timeout,
    Closed,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Open { since: Instant },
    Alerted { since: Instant },
}

/// Per-device door timers, shared by the monitoring loop and the
/// door-event callback.
#[derive(Default)]
pub struct DoorTimers {
    devices: HashMap<String, Phase>,
}

impl DoorTimers {
    pub fn new() -> Self {
        DoorTimers { devices: HashMap::new() }
    }

    /// Handles a `door_opened`/`door_closed` reading. A `door_closed`
    /// without a tracked open state is a no-op logged at debug (§4.6).
    pub fn on_door_event(&mut self, device_id: &str, opened: bool, now: Instant) -> Option<DoorAlertKind> {
        if opened {
            self.devices.entry(device_id.to_string()).or_insert(Phase::Open { since: now });
            None
        } else {
            match self.devices.remove(device_id) {
                Some(Phase::Alerted { .. }) => Some(DoorAlertKind::Closed),
                Some(Phase::Open { .. }) => None,
                None => {
                    debug!(device_id, "door_closed with no prior door_opened, ignoring");
                    None
                }
            }
        }
    }

    /// Called on the monitoring loop's tick: promotes any `Open` device
    /// whose elapsed time has reached `max_open` to `Alerted`, emitting one
    /// `DoorTimeout` per device exactly once (§8 scenario #3).
    pub fn check_timeouts(&mut self, now: Instant, max_open: Duration) -> Vec<String> {
        let mut timed_out = Vec::new();

        for (device_id, phase) in self.devices.iter_mut() {
            if let Phase::Open { since } = *phase {
                if now.duration_since(since) >= max_open {
                    *phase = Phase::Alerted { since };
                    timed_out.push(device_id.clone());
                }
            }
        }
        timed_out
    }

    /// Device ids currently tracked (open or alerted), for callers that
    /// need to check each device against its own configured threshold
    /// rather than one threshold shared by every device.
    pub fn tracked_device_ids(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    /// Single-device variant of `check_timeouts`, for a caller iterating
    /// `tracked_device_ids()` with a per-device `max_open`.
    pub fn check_timeout_for(&mut self, device_id: &str, now: Instant, max_open: Duration) -> Option<DoorAlertKind> {
        if let Some(Phase::Open { since }) = self.devices.get(device_id).copied() {
            if now.duration_since(since) >= max_open {
                self.devices.insert(device_id.to_string(), Phase::Alerted { since });
                return Some(DoorAlertKind::Timeout);
            }
        }
        None
    }

    #[cfg(test)]
    fn is_tracked(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_then_close_before_timeout_emits_nothing() {
        let mut timers = DoorTimers::new();
        let t0 = Instant::now();

        assert_eq!(timers.on_door_event("d1", true, t0), None);
        assert!(timers.check_timeouts(t0 + Duration::from_secs(10), Duration::from_secs(30)).is_empty());
        assert_eq!(timers.on_door_event("d1", false, t0 + Duration::from_secs(20)), None);
        assert!(!timers.is_tracked("d1"));
    }

    #[test]
    fn exceeding_threshold_alerts_exactly_once_then_close_alerts_again() {
        let mut timers = DoorTimers::new();
        let t0 = Instant::now();

        timers.on_door_event("d1", true, t0);

        let at_30 = timers.check_timeouts(t0 + Duration::from_secs(30), Duration::from_secs(30));
        assert_eq!(at_30, vec!["d1".to_string()]);

        let at_60 = timers.check_timeouts(t0 + Duration::from_secs(60), Duration::from_secs(30));
        assert!(at_60.is_empty(), "timeout must fire once, not repeatedly");

        let closed = timers.on_door_event("d1", false, t0 + Duration::from_secs(90));
        assert_eq!(closed, Some(DoorAlertKind::Closed));
    }

    #[test]
    fn close_without_open_is_a_noop() {
        let mut timers = DoorTimers::new();
        assert_eq!(timers.on_door_event("d1", false, Instant::now()), None);
    }
}
