//! File-backed keyed store for client-local state.
//!
//! Each key is one file under the store root. Writes go to a temporary
//! sibling first and are renamed into place, so a reader never sees a
//! half-written value.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Keys are used as file names, so only a conservative character set is
/// accepted.
fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_owned()))
    }
}

impl LocalStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(io_error(&root))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Raw string value for `key`, or `None` when unset.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] or [`StoreError::Io`].
    pub async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    /// Stores a raw string value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] or [`StoreError::Io`].
    pub async fn set_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let temp_path = self.root.join(format!(".{key}.tmp"));

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await
            .map_err(io_error(&temp_path))?;
        file.write_all(value.as_bytes())
            .await
            .map_err(io_error(&temp_path))?;
        file.sync_all().await.map_err(io_error(&temp_path))?;
        drop(file);

        fs::rename(&temp_path, &path)
            .await
            .map_err(io_error(&path))?;
        Ok(())
    }

    /// JSON value for `key`, or `None` when unset.
    ///
    /// # Errors
    ///
    /// [`StoreError::Json`] when the stored value does not decode as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.get_string(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Json {
                key: key.to_owned(),
                source,
            })
    }

    /// # Errors
    ///
    /// [`StoreError::Json`] if `value` cannot be serialized, else as
    /// [`LocalStore::set_string`].
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Json {
            key: key.to_owned(),
            source,
        })?;
        self.set_string(key, &raw).await
    }

    /// Removes `key`; removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] or [`StoreError::Io`].
    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    /// # Errors
    ///
    /// [`StoreError::InvalidKey`].
    pub async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }
}
