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

#![deny(unsafe_code)]

use smartchill_api::error::{Error, Result};
use std::convert::Infallible;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

mod actor;
mod config;
mod http;
mod persistence;
mod store;

use persistence::Persistence;
use store::State;

/// Reads the configuration and sets up the global logger, the way
/// `drmemd`'s `init_app` does. Returns `None` if the process should
/// exit immediately (e.g. `--print-config`).
async fn init_app() -> Option<config::Config> {
    match config::get().await {
        Ok(cfg) => {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(cfg.get_log_level())
                .with_target(false)
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .expect("unable to set global default subscriber");
            Some(cfg)
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            None
        }
    }
}

async fn wrap_task(handle: JoinHandle<Result<Infallible>>) -> Result<Infallible> {
    match handle.await {
        Err(e) if e.is_panic() => {
            error!("terminated due to panic");
            Err(Error::Transient("task panicked".into()))
        }
        Err(_) => {
            error!("terminated due to cancellation");
            Err(Error::Transient("task was canceled".into()))
        }
        Ok(result) => result,
    }
}

async fn run() -> Result<()> {
    let Some(cfg) = init_app().await else {
        return Ok(());
    };

    info!(listen_addr = %cfg.listen_addr, catalog_file = %cfg.catalog_file, "starting registry");

    let persistence = Persistence::new(cfg.catalog_file.clone());
    let doc = persistence.load().await?;
    let state = State::new(doc);
    let store = actor::spawn(state, persistence);

    let addr: std::net::SocketAddr = cfg
        .listen_addr
        .parse()
        .map_err(|e| Error::ConfigError(format!("bad listen_addr '{}': {}", cfg.listen_addr, e)))?;

    let routes = http::routes(store);
    let server: JoinHandle<Result<Infallible>> = tokio::spawn(async move {
        warp::serve(routes).run(addr).await;
        Err(Error::Transient("http server exited".into()))
    });

    let _ = wrap_task(server).await;
    warn!("shutting down");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
