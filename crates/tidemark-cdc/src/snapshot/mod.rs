//! # Consistent Schema Snapshot
//!
//! The one-time procedure that captures every target table's definition at a
//! single, consistent position and hands that position to streaming capture.
//!
//! - [`SnapshotCoordinator`] - Runs the protocol and reports [`SnapshotResult`]
//! - [`ConsistencyGate`] - Exclusive per-table locks
//! - [`PositionMarkerReader`] - Reads the consistency boundary
//! - [`SchemaCaptureEngine`] - DDL and structural model per table
//! - [`TransactionScope`], [`TenantContext`] - Session scoping with explicit release
//! - [`CancellationMonitor`] - Cooperative stop signal
//! - [`SnapshotRunner`] - Run-at-most-once glue over an [`OffsetStore`](crate::common::OffsetStore)
//!
//! ## Ordering
//!
//! No position is read and no definition captured until every target table is
//! locked. Locks live as long as the transaction, so no writer can change a
//! table between the marker read and the last capture.

mod cancel;
mod capture;
mod coordinator;
mod gate;
mod marker;
mod runner;
mod scope;

pub use cancel::{CancellationMonitor, SnapshotContext};
pub use capture::SchemaCaptureEngine;
pub use coordinator::{SnapshotCoordinator, SnapshotResult, SnapshotStats, SnapshotStatsSnapshot};
pub use gate::ConsistencyGate;
pub use marker::PositionMarkerReader;
pub use runner::SnapshotRunner;
pub use scope::{TenantContext, TransactionScope};
