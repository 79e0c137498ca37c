//! # Snapshot Coordinator
//!
//! Drives one run of the snapshot protocol:
//!
//! ```text
//! begin tx ─► enter tenant ─► list tables ─► lock all ─► read marker
//!                                                           │
//!            rollback + restore tenant ◄─── capture all ◄───┘
//! ```
//!
//! Tables are processed in lexical [`TableId`] order, one at a time. The
//! cancellation signal is checked before every table in both loops and once
//! between the lock phase and the marker read. Teardown runs after every
//! outcome: completion, abort, or error.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use tidemark_cdc::common::{
//!     ColumnDefinition, MemorySchemaHistory, MockMetadataProvider, SnapshotConfig, TableId,
//!     TableStructure,
//! };
//! use tidemark_cdc::snapshot::{SnapshotContext, SnapshotCoordinator};
//!
//! # tokio_test_block(async {
//! let orders = TableStructure::new(TableId::new("INVENTORY", "ORDERS"))
//!     .with_column(ColumnDefinition::new("ID", "NUMBER", 1));
//! let provider = MockMetadataProvider::oracle()
//!     .with_table(orders, "CREATE TABLE ORDERS (ID NUMBER)")
//!     .with_position(1042);
//!
//! let config = SnapshotConfig::builder()
//!     .logical_name("server1")
//!     .database("ORCLCDB")
//!     .build()
//!     .unwrap();
//! let history = Arc::new(MemorySchemaHistory::new());
//!
//! let mut coordinator = SnapshotCoordinator::new(config, provider, history.clone(), None).unwrap();
//! let result = coordinator.execute(&SnapshotContext::new()).await.unwrap();
//!
//! assert_eq!(result.offset().map(|o| o.position().value()), Some(1042));
//! assert_eq!(history.len(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use super::{
    ConsistencyGate, PositionMarkerReader, SchemaCaptureEngine, SnapshotContext, TenantContext,
    TransactionScope,
};
use crate::common::{
    MetadataProvider, OffsetContext, Result, SchemaChangeEvent, SchemaHistory, SnapshotConfig,
    SnapshotError, TableId, TablePattern,
};
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Outcome of a snapshot run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotResult {
    /// Schema captured (or captured by an earlier run); resume streaming here
    Completed(OffsetContext),
    /// Stopped by the cancellation signal; nothing to resume from
    Aborted,
}

impl SnapshotResult {
    /// Check if the run completed
    pub fn is_completed(&self) -> bool {
        matches!(self, SnapshotResult::Completed(_))
    }

    /// Check if the run was cancelled
    pub fn is_aborted(&self) -> bool {
        matches!(self, SnapshotResult::Aborted)
    }

    /// Resume position, if completed
    pub fn offset(&self) -> Option<&OffsetContext> {
        match self {
            SnapshotResult::Completed(offset) => Some(offset),
            SnapshotResult::Aborted => None,
        }
    }

    /// Take the resume position, if completed
    pub fn into_offset(self) -> Option<OffsetContext> {
        match self {
            SnapshotResult::Completed(offset) => Some(offset),
            SnapshotResult::Aborted => None,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters across all runs of a coordinator.
///
/// Every increment is also exported through the `metrics` facade, labelled
/// with the connector's logical name.
#[derive(Debug, Default)]
pub struct SnapshotStats {
    connector: String,
    tables_locked: AtomicU64,
    tables_captured: AtomicU64,
    events_emitted: AtomicU64,
    runs_completed: AtomicU64,
    runs_skipped: AtomicU64,
    runs_aborted: AtomicU64,
    runs_failed: AtomicU64,
}

impl SnapshotStats {
    /// Create zeroed counters for `connector`
    pub fn new(connector: impl Into<String>) -> Self {
        Self {
            connector: connector.into(),
            ..Default::default()
        }
    }

    /// Count a table locked
    pub fn record_table_locked(&self) {
        self.tables_locked.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "tidemark_cdc_snapshot_tables_locked_total",
            "connector" => self.connector.clone()
        )
        .increment(1);
    }

    /// Count a table whose definition was captured
    pub fn record_table_captured(&self) {
        self.tables_captured.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "tidemark_cdc_snapshot_tables_captured_total",
            "connector" => self.connector.clone()
        )
        .increment(1);
    }

    /// Count a schema change event delivered to history
    pub fn record_event_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "tidemark_cdc_snapshot_schema_events_total",
            "connector" => self.connector.clone()
        )
        .increment(1);
    }

    /// Count a run that completed
    pub fn record_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "tidemark_cdc_snapshot_runs_completed_total",
            "connector" => self.connector.clone()
        )
        .increment(1);
    }

    /// Count a run short-circuited by a previous offset
    pub fn record_skipped(&self) {
        self.runs_skipped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "tidemark_cdc_snapshot_runs_skipped_total",
            "connector" => self.connector.clone()
        )
        .increment(1);
    }

    /// Count a run stopped by cancellation
    pub fn record_aborted(&self) {
        self.runs_aborted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "tidemark_cdc_snapshot_runs_aborted_total",
            "connector" => self.connector.clone()
        )
        .increment(1);
    }

    /// Count a run that ended with an error
    pub fn record_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "tidemark_cdc_snapshot_runs_failed_total",
            "connector" => self.connector.clone()
        )
        .increment(1);
    }

    /// Get a point-in-time copy of the counters
    pub fn snapshot(&self) -> SnapshotStatsSnapshot {
        SnapshotStatsSnapshot {
            tables_locked: self.tables_locked.load(Ordering::Relaxed),
            tables_captured: self.tables_captured.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_skipped: self.runs_skipped.load(Ordering::Relaxed),
            runs_aborted: self.runs_aborted.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot for stats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotStatsSnapshot {
    pub tables_locked: u64,
    pub tables_captured: u64,
    pub events_emitted: u64,
    pub runs_completed: u64,
    pub runs_skipped: u64,
    pub runs_aborted: u64,
    pub runs_failed: u64,
}

// ============================================================================
// Coordinator
// ============================================================================

/// Runs the snapshot protocol against one provider.
pub struct SnapshotCoordinator<P: MetadataProvider> {
    config: SnapshotConfig,
    pattern: TablePattern,
    provider: P,
    history: Arc<dyn SchemaHistory>,
    previous_offset: Option<OffsetContext>,
    stats: Arc<SnapshotStats>,
    /// Transaction begun but teardown not yet attempted
    session_open: bool,
}

impl<P: MetadataProvider> SnapshotCoordinator<P> {
    /// Create a coordinator.
    ///
    /// `previous_offset` is the offset committed by an earlier successful run,
    /// if any; when present, [`execute`](Self::execute) returns it untouched.
    pub fn new(
        config: SnapshotConfig,
        provider: P,
        history: Arc<dyn SchemaHistory>,
        previous_offset: Option<OffsetContext>,
    ) -> Result<Self> {
        config.validate()?;
        if provider.dialect().name() != config.source_kind.as_str() {
            return Err(SnapshotError::config(format!(
                "source kind {} does not match provider dialect {}",
                config.source_kind,
                provider.dialect().name()
            )));
        }
        let pattern = config.pattern()?;
        let stats = Arc::new(SnapshotStats::new(config.logical_name.clone()));

        Ok(Self {
            config,
            pattern,
            provider,
            history,
            previous_offset,
            stats,
            session_open: false,
        })
    }

    /// Source configuration
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Underlying provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get statistics.
    pub fn stats(&self) -> SnapshotStatsSnapshot {
        self.stats.snapshot()
    }

    /// Run the snapshot.
    ///
    /// Returns `Completed` with the resume position, `Aborted` if the
    /// cancellation signal was seen, or the first fatal error. The transaction
    /// is rolled back and the tenant restored before this returns, whatever the
    /// outcome.
    ///
    /// The returned future is not cancel-safe: dropping it before completion
    /// (`tokio::time::timeout`, `select!`) skips teardown and leaves the locks
    /// held. Stop a run through the context's
    /// [`CancellationMonitor`](crate::snapshot::CancellationMonitor) instead.
    /// A session left open by a dropped run is rolled back, and its tenant
    /// reset, before the next run begins.
    pub async fn execute(&mut self, ctx: &SnapshotContext) -> Result<SnapshotResult> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "run",
            source = %self.config.logical_name,
            catalog = %self.config.catalog()
        );
        self.run(ctx).instrument(span).await
    }

    async fn run(&mut self, ctx: &SnapshotContext) -> Result<SnapshotResult> {
        if let Some(offset) = &self.previous_offset {
            info!(
                "Previous offset found at position {}, skipping snapshot",
                offset.position()
            );
            self.stats.record_skipped();
            return Ok(SnapshotResult::Completed(offset.clone()));
        }

        let tx = match self.open_session().await {
            Ok(tx) => tx,
            Err(e) => {
                self.stats.record_failed();
                warn!("Snapshot failed before the transaction opened: {}", e);
                return Err(e);
            }
        };

        let tenant = TenantContext::new(self.config.tenant.as_deref());
        let outcome = match tenant.select(&self.provider).await {
            Ok(()) => self.snapshot_body(ctx).await,
            Err(e) => Err(e),
        };
        let released = teardown(&self.provider, tx, tenant).await;
        self.session_open = false;

        match (outcome, released) {
            (Ok(result), Ok(())) => {
                match &result {
                    SnapshotResult::Completed(offset) => {
                        self.stats.record_completed();
                        info!("Snapshot completed at position {}", offset.position());
                    }
                    SnapshotResult::Aborted => {
                        self.stats.record_aborted();
                        info!("Snapshot aborted");
                    }
                }
                Ok(result)
            }
            (Ok(_), Err(e)) => {
                self.stats.record_failed();
                Err(e)
            }
            (Err(e), Ok(())) => {
                self.stats.record_failed();
                warn!("Snapshot failed: {}", e);
                Err(e)
            }
            (Err(e), Err(teardown_err)) => {
                self.stats.record_failed();
                warn!(
                    "Snapshot failed: {}; teardown also failed: {}",
                    e, teardown_err
                );
                Err(e)
            }
        }
    }

    async fn open_session(&mut self) -> Result<TransactionScope> {
        self.release_abandoned_session().await?;
        let tx = TransactionScope::begin(&self.provider).await?;
        self.session_open = true;
        Ok(tx)
    }

    /// Roll back and leave the tenant of a run whose future was dropped
    async fn release_abandoned_session(&mut self) -> Result<()> {
        if !self.session_open {
            return Ok(());
        }
        warn!("Previous run was dropped before teardown, releasing its session");
        let released = teardown(
            &self.provider,
            TransactionScope::abandoned(),
            TenantContext::new(self.config.tenant.as_deref()),
        )
        .await;
        self.session_open = false;
        released
    }

    async fn snapshot_body(&self, ctx: &SnapshotContext) -> Result<SnapshotResult> {
        let catalog = self.config.catalog();
        let tables: BTreeSet<TableId> = self
            .provider
            .list_tables(catalog, &self.pattern)
            .await
            .map_err(|e| SnapshotError::query(format!("list tables in {}: {}", catalog, e)))?
            .into_iter()
            .collect();
        info!(
            "Snapshotting {} tables in {} matching {}",
            tables.len(),
            catalog,
            self.pattern
        );

        let mut gate = ConsistencyGate::new();
        for table in &tables {
            if self.lock_table(ctx, &mut gate, table).await?.is_break() {
                return Ok(SnapshotResult::Aborted);
            }
        }

        if !ctx.is_running() {
            info!("Stop requested after locking, position not read");
            return Ok(SnapshotResult::Aborted);
        }

        let position = PositionMarkerReader::new().read(&self.provider).await?;
        let offset = OffsetContext::new(&self.config.logical_name, position);
        info!("Consistency boundary at position {}", position);

        let mut engine = SchemaCaptureEngine::new();
        engine.prepare(&self.provider, catalog, &self.pattern).await?;

        for table in &tables {
            if self
                .capture_table(ctx, &engine, &offset, table)
                .await?
                .is_break()
            {
                return Ok(SnapshotResult::Aborted);
            }
        }

        Ok(SnapshotResult::Completed(offset))
    }

    async fn lock_table(
        &self,
        ctx: &SnapshotContext,
        gate: &mut ConsistencyGate,
        table: &TableId,
    ) -> Result<ControlFlow<()>> {
        if !ctx.is_running() {
            info!("Stop requested before locking {}", table);
            return Ok(ControlFlow::Break(()));
        }
        gate.acquire(&self.provider, table).await?;
        self.stats.record_table_locked();
        Ok(ControlFlow::Continue(()))
    }

    async fn capture_table(
        &self,
        ctx: &SnapshotContext,
        engine: &SchemaCaptureEngine,
        offset: &OffsetContext,
        table: &TableId,
    ) -> Result<ControlFlow<()>> {
        if !ctx.is_running() {
            info!("Stop requested before capturing {}", table);
            return Ok(ControlFlow::Break(()));
        }

        let (ddl, structure) = engine.capture(&self.provider, table).await?;
        self.stats.record_table_captured();

        let event = SchemaChangeEvent::snapshot_create(
            self.provider.dialect().name(),
            offset,
            self.config.catalog(),
            ddl,
            structure,
        );
        self.history.apply_schema_change(event).await?;
        self.stats.record_event_emitted();
        debug!("Emitted schema change for {}", table);
        Ok(ControlFlow::Continue(()))
    }
}

/// Roll back, then restore the tenant even if rollback failed.
async fn teardown<P: MetadataProvider + ?Sized>(
    provider: &P,
    tx: TransactionScope,
    tenant: TenantContext,
) -> Result<()> {
    let rollback = tx.rollback(provider).await;
    let restore = tenant.restore(provider).await;
    match (rollback, restore) {
        (Err(e), Err(restore_err)) => {
            warn!("Tenant restore failed after rollback failure: {}", restore_err);
            Err(e)
        }
        (rollback, restore) => rollback.and(restore),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{
        Call, ColumnDefinition, MemorySchemaHistory, MockFailure, MockMetadataProvider,
        PositionMarker, SourceKind, TableStructure,
    };

    fn table(name: &str) -> TableStructure {
        TableStructure::new(TableId::new("INVENTORY", name))
            .with_column(ColumnDefinition::new("ID", "NUMBER", 1))
    }

    fn config() -> SnapshotConfig {
        SnapshotConfig::builder()
            .logical_name("server1")
            .database("ORCLCDB")
            .build()
            .unwrap()
    }

    #[test]
    fn test_result_accessors() {
        let offset = OffsetContext::new("server1", PositionMarker::new(3));
        let done = SnapshotResult::Completed(offset.clone());
        assert!(done.is_completed());
        assert_eq!(done.offset(), Some(&offset));
        assert_eq!(done.into_offset(), Some(offset));
        assert!(SnapshotResult::Aborted.is_aborted());
        assert_eq!(SnapshotResult::Aborted.offset(), None);
    }

    #[test]
    fn test_dialect_mismatch_rejected() {
        let provider = MockMetadataProvider::new(SourceKind::Postgres);
        let result = SnapshotCoordinator::new(
            config(),
            provider,
            Arc::new(MemorySchemaHistory::new()),
            None,
        );
        assert!(matches!(result, Err(SnapshotError::Config(_))));
    }

    #[tokio::test]
    async fn test_stats_after_completed_run() {
        let provider = MockMetadataProvider::oracle()
            .with_table(table("A"), "ddl a")
            .with_table(table("B"), "ddl b");
        let history = Arc::new(MemorySchemaHistory::new());
        let mut c = SnapshotCoordinator::new(config(), provider, history, None).unwrap();

        c.execute(&SnapshotContext::new()).await.unwrap();
        let stats = c.stats();
        assert_eq!(stats.tables_locked, 2);
        assert_eq!(stats.tables_captured, 2);
        assert_eq!(stats.events_emitted, 2);
        assert_eq!(stats.runs_completed, 1);
        assert_eq!(stats.runs_failed, 0);
    }

    #[tokio::test]
    async fn test_tenant_switch_failure_tears_down() {
        let config = SnapshotConfig::builder()
            .logical_name("server1")
            .database("ORCLCDB")
            .tenant("ORCLPDB1")
            .build()
            .unwrap();
        let provider = MockMetadataProvider::oracle()
            .with_table(table("A"), "ddl")
            .fail_on(MockFailure::SelectTenant);
        let mut c = SnapshotCoordinator::new(
            config,
            provider,
            Arc::new(MemorySchemaHistory::new()),
            None,
        )
        .unwrap();

        assert!(c.execute(&SnapshotContext::new()).await.is_err());
        let p = c.provider();
        assert_eq!(
            p.calls(),
            vec![
                Call::BeginTransaction,
                Call::SelectTenant("ORCLPDB1".into()),
                Call::Rollback,
                Call::ResetTenant,
            ]
        );
        assert_eq!(p.count(&Call::ResetTenant), 1);
        assert!(p.locked_tables().is_empty());
        assert_eq!(c.stats().runs_failed, 1);
    }

    #[tokio::test]
    async fn test_begin_failure_counts_as_failed_run() {
        let provider = MockMetadataProvider::oracle()
            .with_table(table("A"), "ddl")
            .fail_on(MockFailure::BeginTransaction);
        let mut c = SnapshotCoordinator::new(
            config(),
            provider,
            Arc::new(MemorySchemaHistory::new()),
            None,
        )
        .unwrap();

        let err = c.execute(&SnapshotContext::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "transaction_error");
        assert_eq!(c.provider().calls(), vec![Call::BeginTransaction]);
        assert_eq!(c.stats().runs_failed, 1);
    }

    #[tokio::test]
    async fn test_rollback_failure_after_success_is_propagated() {
        let provider = MockMetadataProvider::oracle()
            .with_table(table("A"), "ddl")
            .fail_on(MockFailure::Rollback);
        let history = Arc::new(MemorySchemaHistory::new());
        let mut c = SnapshotCoordinator::new(config(), provider, history.clone(), None).unwrap();

        let err = c.execute(&SnapshotContext::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "transaction_error");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_body_error_wins_over_teardown_error() {
        let provider = MockMetadataProvider::oracle()
            .with_table(table("A"), "ddl")
            .fail_on(MockFailure::ReadPosition)
            .fail_on(MockFailure::Rollback);
        let mut c = SnapshotCoordinator::new(
            config(),
            provider,
            Arc::new(MemorySchemaHistory::new()),
            None,
        )
        .unwrap();

        let err = c.execute(&SnapshotContext::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "position_unavailable");
    }

    #[tokio::test]
    async fn test_list_failure_is_query_error() {
        let provider = MockMetadataProvider::oracle().fail_on(MockFailure::ListTables);
        let mut c = SnapshotCoordinator::new(
            config(),
            provider,
            Arc::new(MemorySchemaHistory::new()),
            None,
        )
        .unwrap();

        let err = c.execute(&SnapshotContext::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "query_error");
        assert_eq!(c.provider().count(&Call::Rollback), 1);
    }

    #[tokio::test]
    async fn test_empty_catalog_completes() {
        let provider = MockMetadataProvider::oracle().with_position(55);
        let mut c = SnapshotCoordinator::new(
            config(),
            provider,
            Arc::new(MemorySchemaHistory::new()),
            None,
        )
        .unwrap();

        let result = c.execute(&SnapshotContext::new()).await.unwrap();
        assert_eq!(result.offset().map(|o| o.position().value()), Some(55));
    }
}
