//! Position marker reads

use crate::common::{MetadataProvider, PositionMarker, Result, SnapshotError};
use tracing::debug;

/// Reads the store's change counter.
///
/// Must only run while every target table is locked; the coordinator
/// guarantees this, the reader does not check it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionMarkerReader;

impl PositionMarkerReader {
    /// Create a reader
    pub fn new() -> Self {
        Self
    }

    /// Read the current position.
    ///
    /// A missing row, a NULL, or a value that is not a non-negative integer is
    /// reported as `PositionUnavailable`.
    pub async fn read<P: MetadataProvider + ?Sized>(&self, provider: &P) -> Result<PositionMarker> {
        let sql = provider.dialect().position_query();
        let rows = provider
            .execute_query(&sql)
            .await
            .map_err(|e| SnapshotError::position_unavailable(e.to_string()))?;

        let value = rows
            .first()
            .and_then(|row| row.get(0))
            .filter(|v| !v.is_null())
            .ok_or_else(|| SnapshotError::position_unavailable("store returned no value"))?;

        let position = value.as_u64().ok_or_else(|| {
            SnapshotError::position_unavailable(format!(
                "not a non-negative integer: {:?}",
                value
            ))
        })?;

        debug!("Read position marker {}", position);
        Ok(PositionMarker::new(position))
    }
}
