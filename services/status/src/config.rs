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

//! Command-line and TOML configuration for the status service
//! (§6 "Configuration knobs", §10.3). Same pipeline as door-timer's
//! `config.rs`, with this service's own knobs.

use serde_derive::Deserialize;
use smartchill_api::error::Error;
use std::env;
use tracing::Level;

fn def_log_level() -> String {
    String::from("warn")
}
fn def_broker_host() -> String {
    String::from("mosquitto")
}
fn def_broker_port() -> u16 {
    1883
}
fn def_catalog_url() -> String {
    String::from("http://registry:8001")
}
fn def_registration_interval() -> u64 {
    300
}
fn def_settings_file() -> String {
    String::from("status-settings.json")
}
fn def_client_id_prefix() -> String {
    String::from("status")
}
fn def_temp_min_celsius() -> f64 {
    -5.0
}
fn def_temp_max_celsius() -> f64 {
    15.0
}
fn def_humidity_max_percent() -> f64 {
    95.0
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "def_log_level")]
    log_level: String,
    #[serde(default = "def_broker_host")]
    pub broker_host: String,
    #[serde(default = "def_broker_port")]
    pub broker_port: u16,
    #[serde(default = "def_catalog_url")]
    pub catalog_url: String,
    #[serde(default = "def_registration_interval")]
    pub registration_interval_seconds: u64,
    #[serde(default = "def_settings_file")]
    pub settings_file: String,
    #[serde(default = "def_client_id_prefix")]
    pub client_id_prefix: String,
    #[serde(default = "def_temp_min_celsius")]
    pub default_temp_min_celsius: f64,
    #[serde(default = "def_temp_max_celsius")]
    pub default_temp_max_celsius: f64,
    #[serde(default = "def_humidity_max_percent")]
    pub default_humidity_max_percent: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: def_log_level(),
            broker_host: def_broker_host(),
            broker_port: def_broker_port(),
            catalog_url: def_catalog_url(),
            registration_interval_seconds: def_registration_interval(),
            settings_file: def_settings_file(),
            client_id_prefix: def_client_id_prefix(),
            default_temp_min_celsius: def_temp_min_celsius(),
            default_temp_max_celsius: def_temp_max_celsius(),
            default_humidity_max_percent: def_humidity_max_percent(),
        }
    }
}

impl Config {
    pub fn get_log_level(&self) -> Level {
        match self.log_level.as_str() {
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::WARN,
        }
    }
}

fn from_cmdline(mut cfg: Config) -> (bool, Config) {
    use clap::{crate_version, Arg, ArgAction, Command};

    let matches = Command::new("status")
        .version(crate_version!())
        .about("Temperature-and-humidity-status control service")
        .arg(Arg::new("config").short('c').long("config").action(ArgAction::Set).value_name("FILE"))
        .arg(Arg::new("verbose").short('v').long("verbose").action(ArgAction::Count))
        .arg(Arg::new("print_cfg").long("print-config").action(ArgAction::SetTrue))
        .get_matches();

    match matches.get_count("verbose") {
        0 => (),
        1 => cfg.log_level = String::from("info"),
        2 => cfg.log_level = String::from("debug"),
        _ => cfg.log_level = String::from("trace"),
    };

    if let Some(file) = matches.get_one::<String>("config") {
        if let Ok(contents) = std::fs::read_to_string(file) {
            if let Ok(parsed) = toml::from_str::<Config>(&contents) {
                cfg = merge_file_into_cmdline(parsed, cfg);
            }
        }
    }

    (matches.get_flag("print_cfg"), cfg)
}

fn merge_file_into_cmdline(file_cfg: Config, cmdline_cfg: Config) -> Config {
    Config {
        log_level: cmdline_cfg.log_level,
        ..file_cfg
    }
}

async fn find_cfg() -> Config {
    const CFG_FILE: &str = "status.toml";
    let mut dirs = vec![String::from("./")];

    if let Ok(home) = env::var("HOME") {
        dirs.push(format!("{}/.", home));
    }
    dirs.push(String::from("/etc/"));

    for dir in dirs {
        let file = format!("{}{}", &dir, CFG_FILE);

        if let Ok(contents) = tokio::fs::read(&file).await {
            let contents = String::from_utf8_lossy(&contents);

            match toml::from_str::<Config>(&contents) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!(file = %file, error = %e, "ignoring unparsable config file");
                }
            }
        }
    }
    Config::default()
}

fn dump_config(cfg: &Config) {
    println!("Configuration:");
    println!("    log level: {}", cfg.get_log_level());
    println!("    broker: {}:{}", cfg.broker_host, cfg.broker_port);
    println!("    catalog url: {}", cfg.catalog_url);
}

#[tracing::instrument(name = "loading config")]
pub async fn get() -> Result<Config, Error> {
    let cfg = find_cfg().await;
    let (print_cfg, cfg) = from_cmdline(cfg);

    if print_cfg {
        dump_config(&cfg);
        std::process::exit(0);
    }
    Ok(cfg)
}
