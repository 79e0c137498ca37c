//! Per-table exclusive locking

use crate::common::{MetadataProvider, Result, SnapshotError, TableId};
use tracing::debug;

/// Takes the write-blocking lock on each target table.
///
/// Locks are owned by the open transaction; the gate never releases them.
#[derive(Debug, Default)]
pub struct ConsistencyGate {
    acquired: Vec<TableId>,
}

impl ConsistencyGate {
    /// Create a gate holding no locks
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `table` exclusively until the transaction ends.
    ///
    /// Any refusal or timeout from the store is a `LockAcquisition` error;
    /// there is no retry.
    pub async fn acquire<P: MetadataProvider + ?Sized>(
        &mut self,
        provider: &P,
        table: &TableId,
    ) -> Result<()> {
        debug!("Locking table {}", table);
        provider
            .lock(table)
            .await
            .map_err(|e| SnapshotError::lock(table.to_string(), e.to_string()))?;
        self.acquired.push(table.clone());
        Ok(())
    }

    /// Tables locked so far, in lock order
    pub fn acquired(&self) -> &[TableId] {
        &self.acquired
    }
}
