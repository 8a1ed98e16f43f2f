//! Store selection: which backend, which file.
//!
//! ```toml
//! # One of: text, stream, snapshot, random-access, document
//! backend = "random-access"
//! path = "players.dat"
//! # fsync after every mutation (default: false)
//! sync_writes = false
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::DocumentStore;
use crate::error::{ConfigError, StoreResult};
use crate::random_access::RandomAccessStore;
use crate::snapshot::SnapshotStore;
use crate::stream::StreamStore;
use crate::text::TextStore;
use crate::traits::PlayerStore;

/// The on-disk representation a store uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// One human-readable line per record.
    Text,
    /// Variable-length binary records, appended.
    Stream,
    /// Whole collection as one checksummed blob.
    Snapshot,
    /// Fixed-width 56-byte slots with in-place updates.
    RandomAccess,
    /// XML document.
    Document,
}

impl BackendKind {
    /// Every backend, in declaration order.
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Text,
        BackendKind::Stream,
        BackendKind::Snapshot,
        BackendKind::RandomAccess,
        BackendKind::Document,
    ];

    /// Stable lowercase name, as used in config files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Text => "text",
            BackendKind::Stream => "stream",
            BackendKind::Snapshot => "snapshot",
            BackendKind::RandomAccess => "random-access",
            BackendKind::Document => "document",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownBackend(s.to_string()))
    }
}

/// Configuration for opening one player store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub path: PathBuf,
    /// fsync after every mutation.
    #[serde(default)]
    pub sync_writes: bool,
}

impl StoreConfig {
    pub fn new(backend: BackendKind, path: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            path: path.into(),
            sync_writes: false,
        }
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML config file.
    ///
    /// A relative `path` inside the file is resolved against the directory
    /// holding the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if config.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.path = dir.join(&config.path);
            }
        }
        Ok(config)
    }

    /// Render this config as TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

/// Open the store a config describes.
pub fn open_store(config: &StoreConfig) -> StoreResult<Box<dyn PlayerStore>> {
    debug!(
        backend = %config.backend,
        path = %config.path.display(),
        sync_writes = config.sync_writes,
        "opening player store"
    );
    let path = config.path.as_path();
    let sync = config.sync_writes;
    Ok(match config.backend {
        BackendKind::Text => Box::new(TextStore::open_with(path, sync)?),
        BackendKind::Stream => Box::new(StreamStore::open_with(path, sync)?),
        BackendKind::Snapshot => Box::new(SnapshotStore::open_with(path, sync)?),
        BackendKind::RandomAccess => Box::new(RandomAccessStore::open_with(path, sync)?),
        BackendKind::Document => Box::new(DocumentStore::open_with(path, sync)?),
    })
}
