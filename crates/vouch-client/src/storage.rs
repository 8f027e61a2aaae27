use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::debug;

use vouch_drafts::local::MAX_LOCAL_VALUE_LEN;
use vouch_drafts::{LocalStorage, StorageError};

/// Browser-tier storage persisted as one file per key under a directory.
/// File names are the base64url form of the key.
pub struct DirStorage {
    dir: PathBuf,
    max_value_len: usize,
}

impl DirStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(io)?;
        debug!("Local storage at {}", dir.display());
        Ok(Self {
            dir,
            max_value_len: MAX_LOCAL_VALUE_LEN,
        })
    }

    pub fn with_limit(mut self, max_value_len: usize) -> Self {
        self.max_value_len = max_value_len;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(URL_SAFE_NO_PAD.encode(key))
    }
}

fn io(e: std::io::Error) -> StorageError {
    StorageError::Io(e.to_string())
}

impl LocalStorage for DirStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if value.len() > self.max_value_len {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                len: value.len(),
                limit: self.max_value_len,
            });
        }

        // write-then-rename so a crash never leaves half a value behind
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).map_err(io)?;
        fs::rename(&tmp, &path).map_err(io)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io(e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io)? {
            let name = entry.map_err(io)?.file_name();
            let Some(name) = name.to_str() else { continue };
            // skips in-flight `.tmp` files and anything not written by us
            let Ok(bytes) = URL_SAFE_NO_PAD.decode(name) else { continue };
            if let Ok(key) = String::from_utf8(bytes) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
