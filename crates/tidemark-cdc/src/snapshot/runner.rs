//! Offset-store glue around the coordinator

use super::{SnapshotContext, SnapshotCoordinator, SnapshotResult};
use crate::common::{MetadataProvider, OffsetStore, Result, SchemaHistory, SnapshotConfig};
use std::sync::Arc;
use tracing::info;

/// Runs a snapshot once per source across restarts.
///
/// Loads the committed offset before the run and commits the new one only
/// after a fresh `Completed`. Nothing is committed on `Aborted` or on error,
/// so the next start repeats the whole snapshot.
pub struct SnapshotRunner {
    store: Arc<dyn OffsetStore>,
}

impl SnapshotRunner {
    /// Create a runner committing offsets to `store`
    pub fn new(store: Arc<dyn OffsetStore>) -> Self {
        Self { store }
    }

    /// Run (or skip) the snapshot for `config`'s source.
    pub async fn run<P: MetadataProvider>(
        &self,
        config: SnapshotConfig,
        provider: P,
        history: Arc<dyn SchemaHistory>,
        ctx: &SnapshotContext,
    ) -> Result<SnapshotResult> {
        let previous = self.store.load(&config.logical_name).await?;
        let fresh = previous.is_none();

        let mut coordinator = SnapshotCoordinator::new(config, provider, history, previous)?;
        let result = coordinator.execute(ctx).await?;

        if let (true, SnapshotResult::Completed(offset)) = (fresh, &result) {
            self.store.save(offset).await?;
            info!(
                "Snapshot offset for {} committed at position {}",
                offset.logical_name(),
                offset.position()
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{
        Call, ColumnDefinition, MemoryOffsetStore, MemorySchemaHistory, MockFailure,
        MockMetadataProvider, TableId, TableStructure,
    };
    use crate::snapshot::CancellationMonitor;

    fn provider() -> MockMetadataProvider {
        let t = TableStructure::new(TableId::new("INVENTORY", "ORDERS"))
            .with_column(ColumnDefinition::new("ID", "NUMBER", 1));
        MockMetadataProvider::oracle()
            .with_table(t, "CREATE TABLE ORDERS (ID NUMBER)")
            .with_position(1042)
    }

    fn config() -> SnapshotConfig {
        SnapshotConfig::builder()
            .logical_name("server1")
            .database("ORCLCDB")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_commits_once_then_skips() {
        let store = Arc::new(MemoryOffsetStore::new());
        let runner = SnapshotRunner::new(store.clone());
        let history = Arc::new(MemorySchemaHistory::new());

        let first = runner
            .run(config(), provider(), history.clone(), &SnapshotContext::new())
            .await
            .unwrap();
        assert_eq!(first.offset().map(|o| o.position().value()), Some(1042));
        assert_eq!(store.load("server1").await.unwrap(), first.offset().cloned());

        // second start: a provider with a different position must not be consulted
        let second = runner
            .run(
                config(),
                provider().with_position(2000),
                history.clone(),
                &SnapshotContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_run_commits_nothing() {
        let store = Arc::new(MemoryOffsetStore::new());
        let runner = SnapshotRunner::new(store.clone());
        let p = provider().fail_on(MockFailure::ReadDdl(TableId::new("INVENTORY", "ORDERS")));

        let result = runner
            .run(
                config(),
                p,
                Arc::new(MemorySchemaHistory::new()),
                &SnapshotContext::new(),
            )
            .await;
        assert!(result.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_aborted_run_commits_nothing() {
        let store = Arc::new(MemoryOffsetStore::new());
        let runner = SnapshotRunner::new(store.clone());
        let monitor = CancellationMonitor::new();
        monitor.cancel();

        let p = provider().on_call(|call| assert_ne!(call, &Call::ReadPosition));
        let result = runner
            .run(
                config(),
                p,
                Arc::new(MemorySchemaHistory::new()),
                &SnapshotContext::with_monitor(monitor),
            )
            .await
            .unwrap();
        assert!(result.is_aborted());
        assert!(store.is_empty().await);
    }
}
