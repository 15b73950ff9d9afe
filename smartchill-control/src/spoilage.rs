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

//! Spoilage threshold evaluation (§4.6). The continuous-alert flag's
//! runtime meaning was left ambiguous by the original source (§9 Open
//! Question); this implementation fixes it as: **off** — alert once on the
//! rising edge above `gas_threshold_ppm`, rearming only after a reading
//! drops back below the threshold; **on** — alert on every reading at or
//! above the threshold. Either way, final de-duplication of repeated sends
//! to the same chat is still the Notification Router's cooldown (§4.7), not
//! this module's job.

#[derive(Debug, Default, Clone, Copy)]
pub struct SpoilageState {
    above_threshold: bool,
}

impl SpoilageState {
    pub fn new() -> Self {
        SpoilageState::default()
    }

    /// Returns whether this reading should raise a `Spoilage` alert.
    pub fn evaluate(&mut self, ppm: f64, threshold_ppm: f64, continuous: bool) -> bool {
        let now_above = ppm >= threshold_ppm;
        let rising_edge = now_above && !self.above_threshold;
        self.above_threshold = now_above;

        if continuous {
            now_above
        } else {
            rising_edge
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_continuous_alerts_only_on_rising_edge() {
        let mut state = SpoilageState::new();

        assert!(state.evaluate(1200.0, 1000.0, false));
        assert!(!state.evaluate(1250.0, 1000.0, false));
        assert!(!state.evaluate(900.0, 1000.0, false));
        assert!(state.evaluate(1100.0, 1000.0, false));
    }

    #[test]
    fn continuous_alerts_on_every_reading_above_threshold() {
        let mut state = SpoilageState::new();

        assert!(state.evaluate(1200.0, 1000.0, true));
        assert!(state.evaluate(1250.0, 1000.0, true));
        assert!(!state.evaluate(900.0, 1000.0, true));
    }

    #[test]
    fn below_threshold_never_alerts() {
        let mut state = SpoilageState::new();
        assert!(!state.evaluate(500.0, 1000.0, false));
        assert!(!state.evaluate(500.0, 1000.0, true));
    }
}
