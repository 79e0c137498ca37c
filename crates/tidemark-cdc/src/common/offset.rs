//! # Snapshot Offsets
//!
//! The offset handed from the snapshot phase to streaming capture, and the
//! stores that persist it across restarts.
//!
//! A persisted [`OffsetContext`] is what makes the snapshot phase run at most
//! once per source: when one exists, the coordinator returns it without
//! touching the data store.
//!
//! ## Usage
//!
//! ```ignore
//! use tidemark_cdc::common::{FileOffsetStore, OffsetStore};
//!
//! let store = FileOffsetStore::new("/var/lib/tidemark/offsets").await?;
//! if let Some(offset) = store.load("server1").await? {
//!     streaming.resume_from(offset.position());
//! }
//! ```

use crate::common::{Result, SnapshotError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

// ============================================================================
// Position and partition
// ============================================================================

/// The store's global change counter at the instant it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionMarker(u64);

impl PositionMarker {
    /// Wrap a raw counter value
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw counter value
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PositionMarker {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for PositionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Partition key of a source: its logical server name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePartition {
    /// Logical source name
    pub server: String,
}

impl SourcePartition {
    /// Create a partition for a logical source
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }

    /// Partition document carried on events
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("server".to_string(), self.server.clone().into());
        map
    }
}

/// Resume position produced by a snapshot.
///
/// Immutable once built; owned by whoever receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetContext {
    partition: SourcePartition,
    position: PositionMarker,
}

impl OffsetContext {
    /// Create an offset for a logical source at a position
    pub fn new(logical_name: impl Into<String>, position: PositionMarker) -> Self {
        Self {
            partition: SourcePartition::new(logical_name),
            position,
        }
    }

    /// Logical source name
    pub fn logical_name(&self) -> &str {
        &self.partition.server
    }

    /// Partition key
    pub fn partition(&self) -> &SourcePartition {
        &self.partition
    }

    /// Snapshot position
    pub fn position(&self) -> PositionMarker {
        self.position
    }

    /// Partition document carried on events
    pub fn partition_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.partition.to_map()
    }

    /// Offset document carried on events
    pub fn offset_map(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("position".to_string(), self.position.value().into());
        map.insert("snapshot".to_string(), true.into());
        map
    }
}

// ============================================================================
// Offset stores
// ============================================================================

/// Persistence for snapshot offsets, keyed by logical source name.
#[async_trait::async_trait]
pub trait OffsetStore: Send + Sync {
    /// Load the offset of a source, if one was ever committed
    async fn load(&self, logical_name: &str) -> Result<Option<OffsetContext>>;

    /// Commit an offset
    async fn save(&self, offset: &OffsetContext) -> Result<()>;
}

/// In-memory offset store (for testing or when persistence isn't needed).
#[derive(Debug, Default)]
pub struct MemoryOffsetStore {
    offsets: RwLock<HashMap<String, OffsetContext>>,
}

impl MemoryOffsetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed offsets
    pub async fn len(&self) -> usize {
        self.offsets.read().await.len()
    }

    /// Check if nothing was committed
    pub async fn is_empty(&self) -> bool {
        self.offsets.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl OffsetStore for MemoryOffsetStore {
    async fn load(&self, logical_name: &str) -> Result<Option<OffsetContext>> {
        Ok(self.offsets.read().await.get(logical_name).cloned())
    }

    async fn save(&self, offset: &OffsetContext) -> Result<()> {
        self.offsets
            .write()
            .await
            .insert(offset.logical_name().to_string(), offset.clone());
        Ok(())
    }
}

/// File-backed offset store.
///
/// One JSON file per source, written to a temp file and renamed into place.
pub struct FileOffsetStore {
    base_dir: PathBuf,
    fsync: bool,
}

impl FileOffsetStore {
    /// Create a store under `base_dir`, creating the directory if needed.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(base_dir, true).await
    }

    /// Create a store with explicit fsync behaviour.
    pub async fn with_options(base_dir: impl AsRef<Path>, fsync: bool) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir, fsync })
    }

    fn file_path(&self, logical_name: &str) -> Result<PathBuf> {
        if logical_name.is_empty()
            || logical_name.contains('/')
            || logical_name.contains('\\')
            || logical_name.starts_with('.')
        {
            return Err(SnapshotError::config(format!(
                "Invalid offset key '{}'",
                logical_name
            )));
        }
        Ok(self.base_dir.join(format!("{}.json", logical_name)))
    }
}

#[async_trait::async_trait]
impl OffsetStore for FileOffsetStore {
    async fn load(&self, logical_name: &str) -> Result<Option<OffsetContext>> {
        let path = self.file_path(logical_name)?;
        let contents = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let offset: OffsetContext = serde_json::from_str(&contents).map_err(|e| {
            SnapshotError::serialization(format!("Corrupt offset file {:?}: {}", path, e))
        })?;
        debug!("Loaded offset for {}: {}", logical_name, offset.position());
        Ok(Some(offset))
    }

    async fn save(&self, offset: &OffsetContext) -> Result<()> {
        let path = self.file_path(offset.logical_name())?;
        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(offset)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await?;
        file.write_all(json.as_bytes()).await?;
        if self.fsync {
            file.sync_all().await?;
        }
        drop(file);

        fs::rename(&temp_path, &path).await?;
        info!(
            "Committed offset for {} at position {}",
            offset.logical_name(),
            offset.position()
        );
        Ok(())
    }
}
