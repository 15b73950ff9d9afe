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

//! Atomic snapshot read/write of the registry document (§4.1).
//!
//! Loads a single JSON document at startup, returning the well-defined
//! empty document when the file is absent. Saves overwrite the file by
//! writing to a sibling `.tmp` path, `fsync`ing it, and renaming it into
//! place, so a crash mid-write can never corrupt the previous snapshot
//! nor leave the replacement half-flushed. The caller
//! (the `Store` actor) is the only writer; it already serializes
//! mutations, so this module doesn't need its own lock.

use chrono::Utc;
use smartchill_api::error::{Error, Result};
use smartchill_api::registry_doc::RegistryDocument;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub struct Persistence {
    path: PathBuf,
}

impl Persistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Persistence { path: path.into() }
    }

    /// Loads the document, or returns the seed document (§4.1) if the
    /// file doesn't exist yet.
    pub async fn load(&self) -> Result<RegistryDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::Persistence(format!("corrupt catalog file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no catalog file found, seeding empty registry");
                Ok(RegistryDocument::seed(Utc::now()))
            }
            Err(e) => Err(Error::Persistence(format!(
                "could not read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Overwrites the snapshot, first bumping `lastUpdate`. On failure
    /// the in-memory state the caller already mutated is *not* rolled
    /// back (§7, §9 Open Questions) — the caller is responsible for
    /// surfacing the error to whoever requested the mutation.
    pub async fn save(&self, doc: &mut RegistryDocument) -> Result<()> {
        doc.last_update = Utc::now();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::Persistence(format!("could not create catalog directory: {}", e))
                })?;
            }
        }

        let tmp_path = tmp_path_for(&self.path);
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| Error::Persistence(format!("could not serialize catalog: {}", e)))?;

        {
            let mut tmp_file = tokio::fs::File::create(&tmp_path)
                .await
                .map_err(|e| Error::Persistence(format!("could not create tmp catalog file: {}", e)))?;

            tmp_file
                .write_all(&bytes)
                .await
                .map_err(|e| Error::Persistence(format!("could not write catalog: {}", e)))?;

            tmp_file
                .sync_all()
                .await
                .map_err(|e| Error::Persistence(format!("could not fsync catalog: {}", e)))?;
        }

        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            Error::Persistence(format!("could not replace catalog file: {}", e))
        })?;

        debug!(path = %self.path.display(), "catalog saved");
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

pub fn log_save_failure(e: &Error) {
    warn!(error = %e, "catalog save failed; in-memory state retains the change");
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartchill_api::registry_doc::RegistryDocument;

    #[tokio::test]
    async fn round_trips_a_saved_document() {
        let dir = std::env::temp_dir().join(format!("smartchill-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("catalog.json");
        let persistence = Persistence::new(&path);

        let mut doc = RegistryDocument::seed(Utc::now());
        persistence.save(&mut doc).await.unwrap();

        let loaded = persistence.load().await.unwrap();

        assert_eq!(loaded.schema_version, doc.schema_version);
        assert_eq!(loaded.users_list.len(), doc.users_list.len());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn missing_file_yields_seed_document() {
        let path = std::env::temp_dir().join(format!("smartchill-missing-{}.json", std::process::id()));
        let _ = tokio::fs::remove_file(&path).await;

        let doc = Persistence::new(&path).load().await.unwrap();

        assert_eq!(doc.schema_version, 1);
        assert_eq!(doc.users_list.len(), 1);
        assert_eq!(doc.users_list[0].user_id, "admin");
    }
}
