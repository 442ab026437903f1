// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-file store with atomic writes.
//!
//! Every operation re-reads the file so separate processes sharing a state
//! directory observe each other's writes. Writes within this process are
//! serialized; writes across processes are last-writer-wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::Mutex;

use super::{KeyValueStore, StoreError};

type Entries = BTreeMap<String, Value>;

/// Key-value store persisted to a single JSON object on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// Open `storage.json` under `dir`, creating the directory if needed.
    pub fn in_dir(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self::new(dir.join("storage.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Entries, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Entries::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write tmp + rename. The temp name is unique per process and write so
    /// concurrent saves never share a partially written file.
    async fn save(&self, entries: &Entries) -> Result<(), StoreError> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let json = serde_json::to_string_pretty(entries)?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, entries: Vec<(&'static str, Value)>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.load().await?;
        for (key, value) in entries {
            current.insert(key.to_owned(), value);
        }
        self.save(&current).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.load().await?;
        let before = current.len();
        for key in keys {
            current.remove(*key);
        }
        if current.len() == before && !self.path.exists() {
            return Ok(());
        }
        self.save(&current).await
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
