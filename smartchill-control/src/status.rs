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

//! Temperature/humidity range evaluation for the Status control service
//! (§4.6). Like spoilage, alerts on the rising edge into an out-of-range
//! reading rather than on every reading, so a steadily malfunctioning unit
//! doesn't flood the bus; the Notification Router still owns cooldown for
//! user-facing delivery (§4.7).

#[derive(Debug, Default, Clone, Copy)]
pub struct StatusState {
    out_of_range: bool,
}

pub struct Thresholds {
    pub temp_min_celsius: f64,
    pub temp_max_celsius: f64,
    pub humidity_max_percent: f64,
}

impl StatusState {
    pub fn new() -> Self {
        StatusState::default()
    }

    /// Returns whether this reading should raise a `Malfunction` alert,
    /// honoring `enable_malfunction_alerts` (§4.6).
    pub fn evaluate(
        &mut self,
        temp_celsius: Option<f64>,
        humidity_percent: Option<f64>,
        thresholds: &Thresholds,
        enabled: bool,
    ) -> bool {
        let temp_bad = temp_celsius
            .map(|t| t < thresholds.temp_min_celsius || t > thresholds.temp_max_celsius)
            .unwrap_or(false);
        let humidity_bad = humidity_percent
            .map(|h| h > thresholds.humidity_max_percent)
            .unwrap_or(false);

        let now_bad = temp_bad || humidity_bad;
        let rising_edge = now_bad && !self.out_of_range;
        self.out_of_range = now_bad;

        enabled && rising_edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds {
            temp_min_celsius: -5.0,
            temp_max_celsius: 15.0,
            humidity_max_percent: 95.0,
        }
    }

    #[test]
    fn in_range_readings_never_alert() {
        let mut state = StatusState::new();
        assert!(!state.evaluate(Some(4.0), Some(50.0), &thresholds(), true));
    }

    #[test]
    fn out_of_range_alerts_once_until_back_in_range() {
        let mut state = StatusState::new();
        assert!(state.evaluate(Some(20.0), Some(50.0), &thresholds(), true));
        assert!(!state.evaluate(Some(21.0), Some(50.0), &thresholds(), true));
        assert!(!state.evaluate(Some(4.0), Some(50.0), &thresholds(), true));
        assert!(state.evaluate(Some(20.0), Some(50.0), &thresholds(), true));
    }

    #[test]
    fn disabled_flag_suppresses_alerts_but_still_tracks_state() {
        let mut state = StatusState::new();
        assert!(!state.evaluate(Some(20.0), Some(50.0), &thresholds(), false));
    }

    #[test]
    fn humidity_alone_can_trigger() {
        let mut state = StatusState::new();
        assert!(state.evaluate(Some(4.0), Some(99.0), &thresholds(), true));
    }
}
