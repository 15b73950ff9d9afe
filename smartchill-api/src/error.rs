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

use std::fmt;
use tokio::sync::{mpsc, oneshot};

/// Enumerates the errors that can cross a component boundary in the
/// SmartChill control plane. Handlers translate these into HTTP status
/// codes or bus reply payloads (see §6/§7 of the design); no other error
/// type should leak out of a crate's public API.
#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// The requested device, user, model, or service doesn't exist.
    NotFound(String),

    /// A uniqueness constraint would be violated (duplicate user,
    /// device already assigned).
    Conflict(String),

    /// The caller supplied a malformed or out-of-range value.
    Validation(String),

    /// A dependency (bus, Registry, chat platform) is unreachable or
    /// timed out; retryable.
    Transient(String),

    /// A snapshot or settings file failed to save.
    Persistence(String),

    /// A configuration file or command-line argument was invalid.
    ConfigError(String),

    /// A payload could not be parsed into its expected shape.
    ParseError(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(v) => write!(f, "not found: {}", v),
            Error::Conflict(v) => write!(f, "conflict: {}", v),
            Error::Validation(v) => write!(f, "invalid: {}", v),
            Error::Transient(v) => write!(f, "transient error: {}", v),
            Error::Persistence(v) => write!(f, "persistence error: {}", v),
            Error::ConfigError(v) => write!(f, "config error: {}", v),
            Error::ParseError(v) => write!(f, "parse error: {}", v),
        }
    }
}

// Lets any code that sends requests over an `mpsc` channel and awaits a
// `oneshot` reply translate channel errors into a SmartChill error
// without a manual match at every call site.

impl<T> From<mpsc::error::SendError<T>> for Error {
    fn from(_error: mpsc::error::SendError<T>) -> Self {
        Error::Transient(String::from("request channel is closed"))
    }
}

impl From<oneshot::error::RecvError> for Error {
    fn from(_error: oneshot::error::RecvError) -> Self {
        Error::Transient(String::from("reply dropped"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
