use std::{io::ErrorKind, path::PathBuf};

use anyhow::Result;
use serde_json::Value;
use tracing::warn;

/// File-per-key value store backing the remote server. Values are opaque JSON; a value that
/// no longer parses counts as unset, same as the client-side stores.
pub struct KvStore {
    root: PathBuf,
}

impl KvStore {
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // keys come from the route table (`day:{date}`, `presets`); ':' is the only character
        // that needs mapping for the filesystem
        self.root.join(format!("{}.json", key.replace(':', "_")))
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!("Stored value for {key} at {path:?} is corrupted, treating as unset: {e}");
                Ok(None)
            }
        }
    }

    pub async fn put(&self, key: &str, value: &Value) -> Result<()> {
        tokio::fs::write(self.path_for(key), serde_json::to_vec(value)?).await?;
        Ok(())
    }
}
