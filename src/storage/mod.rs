//! JSON file backed record store

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::Companies;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed data in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Stores the whole company collection in a single JSON file.
///
/// Every access is serialized by one mutex; the update methods hold it across
/// the full read/modify/write so concurrent edits never interleave.
pub struct JsonStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Read the collection. A missing file is an empty collection.
    pub async fn read(&self) -> StorageResult<Companies> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    /// Read, apply `f`, and write back under one lock. Returns what `f`
    /// returned together with the collection as written.
    pub async fn update<T, F>(&self, f: F) -> StorageResult<(T, Companies)>
    where
        F: FnOnce(&mut Companies) -> T,
    {
        let _guard = self.lock.lock().await;
        let mut companies = self.read_unlocked().await?;
        let output = f(&mut companies);
        self.write_unlocked(&companies).await?;
        Ok((output, companies))
    }

    /// Like [`update`](Self::update), but `f` returning `None` means nothing
    /// changed: the file is left untouched and `None` is returned.
    pub async fn update_if<T, F>(&self, f: F) -> StorageResult<Option<(T, Companies)>>
    where
        F: FnOnce(&mut Companies) -> Option<T>,
    {
        let _guard = self.lock.lock().await;
        let mut companies = self.read_unlocked().await?;
        let Some(output) = f(&mut companies) else {
            return Ok(None);
        };
        self.write_unlocked(&companies).await?;
        Ok(Some((output, companies)))
    }

    async fn read_unlocked(&self) -> StorageResult<Companies> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Companies::new());
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&data).map_err(|source| StorageError::Json {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_unlocked(&self, companies: &Companies) -> StorageResult<()> {
        let data = serde_json::to_vec_pretty(companies).map_err(|source| StorageError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&self.path, data)
            .await
            .map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })
    }
}
