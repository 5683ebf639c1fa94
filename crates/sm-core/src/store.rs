// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-safe persistence of the session registry.
//!
//! Writes go to a `.tmp` sibling, are `fsync`'d, then renamed over the
//! target so a crash mid-write can never leave a torn file behind. A
//! corrupt file on load is quarantined to `.bak` rather than treated as a
//! hard error, so the daemon can still start with an empty registry.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StateStoreError;
use crate::session::Session;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSessions {
    sessions: Vec<Session>,
}

/// Atomic-replace JSON persistence for the registry's session list.
pub struct StateStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize and atomically replace the persisted file.
    ///
    /// On serialization failure the temp file is removed and the original
    /// is left untouched.
    pub async fn save(&self, sessions: &[Session]) -> Result<(), StateStoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let payload = PersistedSessions {
            sessions: sessions.to_vec(),
        };
        tokio::task::spawn_blocking(move || Self::save_blocking(&path, &payload))
            .await
            .map_err(|e| StateStoreError::Io(std::io::Error::other(e)))?
    }

    fn save_blocking(path: &Path, payload: &PersistedSessions) -> Result<(), StateStoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        let write_result = (|| -> Result<(), StateStoreError> {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, payload)?;
            let file = writer
                .into_inner()
                .map_err(|e| StateStoreError::Io(e.into_error()))?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load the persisted session list. Returns an empty vec if the file
    /// is absent. A corrupt file is rotated to `.bak` and treated as empty
    /// rather than returned as an error.
    pub async fn load(&self) -> Result<Vec<Session>, StateStoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::load_blocking(&path))
            .await
            .map_err(|e| StateStoreError::Io(std::io::Error::other(e)))?
    }

    fn load_blocking(path: &Path) -> Result<Vec<Session>, StateStoreError> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, PersistedSessions>(reader) {
            Ok(persisted) => Ok(persisted.sessions),
            Err(e) => {
                let bak_path = rotate_bak_path(path);
                warn!(
                    error = %e,
                    path = %path.display(),
                    bak = %bak_path.display(),
                    "corrupt session state file, quarantining and starting fresh",
                );
                fs::rename(path, &bak_path)?;
                Ok(Vec::new())
            }
        }
    }
}

const MAX_BAK_FILES: u32 = 3;

fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
