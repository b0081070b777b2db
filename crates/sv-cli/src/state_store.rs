use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sv_api::ScopePersistence;
use sv_core::VarError;
use tokio::fs;

use crate::{map_cli_state_read, map_cli_state_write};

/// One JSON file per scope key under a state directory.
#[derive(Debug, Clone)]
pub(crate) struct FilePersistence {
    root: PathBuf,
}

impl FilePersistence {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// ASCII letters, digits and `-` pass through; every other byte becomes `_XX` (upper
    /// hex), so distinct keys never share a file.
    pub(crate) fn file_for(&self, key: &str) -> PathBuf {
        let mut stem = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                stem.push(char::from(byte));
            } else {
                stem.push_str(&format!("_{:02X}", byte));
            }
        }
        self.root.join(format!("{}.json", stem))
    }
}

#[async_trait]
impl ScopePersistence for FilePersistence {
    async fn load(&self, key: &str) -> Result<Option<String>, VarError> {
        match fs::read_to_string(self.file_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == IoErrorKind::NotFound => Ok(None),
            Err(error) => Err(map_cli_state_read(error)),
        }
    }

    async fn save(&self, key: &str, blob: &str) -> Result<(), VarError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(map_cli_state_write)?;
        fs::write(self.file_for(key), blob)
            .await
            .map_err(map_cli_state_write)
    }
}
