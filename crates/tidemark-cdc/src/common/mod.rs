//! # Common Snapshot Types and Traits
//!
//! Database-agnostic building blocks shared by the snapshot phase and the
//! store-specific providers:
//!
//! - [`SnapshotError`] - Error taxonomy and [`Result`] alias
//! - [`TableId`], [`TableStructure`], [`Tables`] - Table identity and model
//! - [`TablePattern`] - SQL `LIKE` table filters
//! - [`SnapshotConfig`] - Source configuration
//! - [`OffsetContext`], [`OffsetStore`] - Resume position and persistence
//! - [`SchemaChangeEvent`], [`SchemaHistory`] - Captured definitions and delivery
//! - [`SnapshotDialect`] - Store-specific statements
//! - [`MetadataProvider`] - The driver seam
//! - [`MockMetadataProvider`] - Scriptable in-memory provider
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Common Module                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MetadataProvider ←─── PgMetadataProvider, Mock implement   │
//! │  SnapshotDialect  ←─── Oracle / PostgreSQL statements       │
//! │  OffsetStore      ←─── Memory / file persistence            │
//! │  SchemaHistory    ←─── Memory / channel delivery            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod dialect;
mod error;
mod mock;
mod offset;
mod pattern;
mod provider;
mod schema_change;
mod types;

pub use config::{SnapshotConfig, SnapshotConfigBuilder};
pub use dialect::{
    dialect_for, quote_ident, quote_literal, OracleDialect, PostgresDialect, SnapshotDialect,
    SourceKind,
};
pub use error::{ErrorCategory, Result, SnapshotError};
pub use mock::{Call, MockFailure, MockMetadataProvider};
pub use offset::{
    FileOffsetStore, MemoryOffsetStore, OffsetContext, OffsetStore, PositionMarker,
    SourcePartition,
};
pub use pattern::{PatternError, TablePattern};
pub use provider::MetadataProvider;
pub use schema_change::{
    ChannelSchemaHistory, MemorySchemaHistory, SchemaChangeEvent, SchemaChangeType, SchemaHistory,
};
pub use types::{ColumnDefinition, Row, TableId, TableStructure, Tables, Value};
