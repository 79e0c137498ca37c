//! # Schema Change Events
//!
//! Table definitions captured by a snapshot are delivered, one event per table,
//! to a [`SchemaHistory`] as they are produced. Delivery is not buffered:
//! events already handed over are never retracted when a later table fails.
//!
//! ## Usage
//!
//! ```ignore
//! use tidemark_cdc::common::ChannelSchemaHistory;
//!
//! let (history, mut rx) = ChannelSchemaHistory::new(64);
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         registry.register(event.qualified_table_name(), &event.ddl).await;
//!     }
//! });
//! ```

use crate::common::{OffsetContext, Result, SnapshotError, SourcePartition, TableStructure};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

// ============================================================================
// Schema Change Types
// ============================================================================

/// Type of schema change (DDL operation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaChangeType {
    /// CREATE TABLE
    Create,
    /// ALTER TABLE
    Alter,
    /// DROP TABLE
    Drop,
}

impl SchemaChangeType {
    /// Get a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            SchemaChangeType::Create => "CREATE TABLE",
            SchemaChangeType::Alter => "ALTER TABLE",
            SchemaChangeType::Drop => "DROP TABLE",
        }
    }
}

impl std::fmt::Display for SchemaChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// Schema Change Event
// ============================================================================

/// Structural state of one table at a position.
///
/// Snapshot captures always carry `change_type = Create` and `snapshot = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChangeEvent {
    /// Source database type: "oracle", "postgres"
    pub source_type: String,
    /// Partition key of the source
    pub partition: SourcePartition,
    /// Position the definition was captured at
    pub offset: OffsetContext,
    /// Working catalog (tenant or database)
    pub catalog: String,
    /// Schema/owner name
    pub schema: String,
    /// Table name
    pub table: String,
    /// Table DDL as returned by the store
    pub ddl: String,
    /// Logical model of the table
    pub structure: TableStructure,
    /// Type of schema change
    pub change_type: SchemaChangeType,
    /// Produced by the initial snapshot rather than online DDL
    pub snapshot: bool,
    /// Capture time
    pub timestamp: DateTime<Utc>,
}

impl SchemaChangeEvent {
    /// Create a snapshot `CREATE` event for a captured table.
    pub fn snapshot_create(
        source_type: impl Into<String>,
        offset: &OffsetContext,
        catalog: impl Into<String>,
        ddl: impl Into<String>,
        structure: TableStructure,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            partition: offset.partition().clone(),
            offset: offset.clone(),
            catalog: catalog.into(),
            schema: structure.id.schema.clone(),
            table: structure.id.table.clone(),
            ddl: ddl.into(),
            structure,
            change_type: SchemaChangeType::Create,
            snapshot: true,
            timestamp: Utc::now(),
        }
    }

    /// Get fully-qualified table name (schema.table).
    pub fn qualified_table_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Convert to JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ============================================================================
// Schema History
// ============================================================================

/// Receiver of captured table definitions (schema registry / history topic).
#[async_trait::async_trait]
pub trait SchemaHistory: Send + Sync {
    /// Record one schema change. A failure aborts the snapshot.
    async fn apply_schema_change(&self, event: SchemaChangeEvent) -> Result<()>;
}

/// In-memory schema history that records events in delivery order.
#[derive(Debug, Default)]
pub struct MemorySchemaHistory {
    events: Mutex<Vec<SchemaChangeEvent>>,
}

impl MemorySchemaHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events delivered so far
    pub fn events(&self) -> Vec<SchemaChangeEvent> {
        self.events.lock().clone()
    }

    /// Qualified names of delivered tables, in delivery order
    pub fn tables(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| e.qualified_table_name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait::async_trait]
impl SchemaHistory for MemorySchemaHistory {
    async fn apply_schema_change(&self, event: SchemaChangeEvent) -> Result<()> {
        debug!("Recorded schema for {}", event.qualified_table_name());
        self.events.lock().push(event);
        Ok(())
    }
}

/// Schema history that forwards events over a bounded channel.
#[derive(Clone)]
pub struct ChannelSchemaHistory {
    sender: mpsc::Sender<SchemaChangeEvent>,
}

impl ChannelSchemaHistory {
    /// Create a history and the receiving end of its channel.
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<SchemaChangeEvent>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (Self { sender }, receiver)
    }
}

#[async_trait::async_trait]
impl SchemaHistory for ChannelSchemaHistory {
    async fn apply_schema_change(&self, event: SchemaChangeEvent) -> Result<()> {
        self.sender.send(event).await.map_err(|e| {
            SnapshotError::schema_history(format!(
                "Receiver dropped before {} was delivered",
                e.0.qualified_table_name()
            ))
        })
    }
}
