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

//! Command-line and TOML configuration for the Registry (§10.3).
//!
//! Mirrors `drmemd`'s `from_cmdline` / `parse_config` / `find_cfg`
//! pattern: command-line flags tweak a config that was first read from
//! a TOML file (or defaulted), and the file search walks a short list
//! of conventional directories.

use serde_derive::Deserialize;
use smartchill_api::error::Error;
use std::env;
use tracing::Level;

fn def_log_level() -> String {
    String::from("warn")
}

fn def_listen_addr() -> String {
    String::from("0.0.0.0:8001")
}

fn def_catalog_file() -> String {
    String::from("catalog.json")
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "def_log_level")]
    log_level: String,
    #[serde(default = "def_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "def_catalog_file")]
    pub catalog_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: def_log_level(),
            listen_addr: def_listen_addr(),
            catalog_file: def_catalog_file(),
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

    let matches = Command::new("SmartChill Registry")
        .version(crate_version!())
        .about("Authoritative device/user/service registry")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .action(ArgAction::Set)
                .value_name("FILE")
                .help("Specifies the configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Sets verbosity of log; can be used more than once"),
        )
        .arg(
            Arg::new("print_cfg")
                .long("print-config")
                .action(ArgAction::SetTrue)
                .help("Displays the configuration and exits"),
        )
        .get_matches();

    match matches.get_count("verbose") {
        0 => (),
        1 => cfg.log_level = String::from("info"),
        2 => cfg.log_level = String::from("debug"),
        _ => cfg.log_level = String::from("trace"),
    };

    if let Some(file) = matches.get_one::<String>("config") {
        if let Ok(Some(parsed)) = parse_file_sync(file) {
            cfg = merge_file_into_cmdline(parsed, cfg);
        }
    }

    // CATALOG_FILE env var takes priority, matching the original
    // Python service's `os.environ.get("CATALOG_FILE", ...)`.
    if let Ok(path) = env::var("CATALOG_FILE") {
        cfg.catalog_file = path;
    }

    (matches.get_flag("print_cfg"), cfg)
}

fn merge_file_into_cmdline(file_cfg: Config, cmdline_cfg: Config) -> Config {
    Config {
        log_level: cmdline_cfg.log_level,
        listen_addr: file_cfg.listen_addr,
        catalog_file: file_cfg.catalog_file,
    }
}

fn parse_file_sync(path: &str) -> std::io::Result<Option<Config>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(toml::from_str(&contents).ok()),
        Err(_) => Ok(None),
    }
}

async fn find_cfg() -> Config {
    const CFG_FILE: &str = "registry.toml";
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
    println!("    listen address: {}", &cfg.listen_addr);
    println!("    catalog file: {}", &cfg.catalog_file);
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
