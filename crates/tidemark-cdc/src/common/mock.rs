//! In-memory metadata provider for tests
//!
//! [`MockMetadataProvider`] serves table definitions from memory, records
//! every provider call in order, and can be scripted to fail at any step.
//! The call trace is what protocol-level tests assert against.
//!
//! ```rust
//! use tidemark_cdc::common::{ColumnDefinition, MockMetadataProvider, TableId, TableStructure};
//!
//! let orders = TableStructure::new(TableId::new("INVENTORY", "ORDERS"))
//!     .with_column(ColumnDefinition::new("ID", "NUMBER", 1));
//!
//! let provider = MockMetadataProvider::oracle()
//!     .with_table(orders, "CREATE TABLE ORDERS (ID NUMBER)")
//!     .with_position(1042);
//!
//! assert!(provider.calls().is_empty());
//! ```

use crate::common::{
    dialect_for, MetadataProvider, Result, Row, SnapshotDialect, SnapshotError, SourceKind,
    TableId, TablePattern, TableStructure, Tables, Value,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    BeginTransaction,
    Rollback,
    SelectTenant(String),
    ResetTenant,
    ListTables { catalog: String, pattern: String },
    ReadSchema { catalog: String, pattern: String },
    Lock(TableId),
    ReadPosition,
    ReadDdl(TableId),
    Query(String),
    Execute(String),
}

/// A provider step that can be scripted to fail
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MockFailure {
    BeginTransaction,
    Rollback,
    SelectTenant,
    ResetTenant,
    ListTables,
    ReadSchema,
    Lock(TableId),
    ReadPosition,
    ReadDdl(TableId),
}

type CallHook = Arc<dyn Fn(&Call) + Send + Sync>;

#[derive(Debug, Clone)]
struct MockTable {
    id: TableId,
    structure: Option<TableStructure>,
    ddl: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    in_transaction: bool,
    tenant: Option<String>,
}

/// Scriptable in-memory [`MetadataProvider`]
pub struct MockMetadataProvider {
    dialect: Box<dyn SnapshotDialect>,
    tables: Vec<MockTable>,
    position: Option<Value>,
    failures: HashSet<MockFailure>,
    hook: Option<CallHook>,
    lock_stall: Mutex<Option<Duration>>,
    state: Mutex<MockState>,
}

impl MockMetadataProvider {
    /// Create an empty provider speaking the given dialect
    pub fn new(kind: SourceKind) -> Self {
        Self {
            dialect: dialect_for(kind),
            tables: Vec::new(),
            position: Some(Value::Int(1)),
            failures: HashSet::new(),
            hook: None,
            lock_stall: Mutex::new(None),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Create an empty Oracle provider
    pub fn oracle() -> Self {
        Self::new(SourceKind::Oracle)
    }

    /// Register a table with its structure and DDL.
    ///
    /// Tables are listed in registration order.
    pub fn with_table(mut self, structure: TableStructure, ddl: impl Into<String>) -> Self {
        self.upsert(MockTable {
            id: structure.id.clone(),
            structure: Some(structure),
            ddl: Some(ddl.into()),
        });
        self
    }

    /// Register a table whose DDL query returns no rows
    pub fn with_table_without_ddl(mut self, structure: TableStructure) -> Self {
        self.upsert(MockTable {
            id: structure.id.clone(),
            structure: Some(structure),
            ddl: None,
        });
        self
    }

    /// Register a table that is listed and has DDL but no structural model
    pub fn with_table_without_structure(mut self, id: TableId, ddl: impl Into<String>) -> Self {
        self.upsert(MockTable {
            id,
            structure: None,
            ddl: Some(ddl.into()),
        });
        self
    }

    /// Set the change counter returned by the position query
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = Some(Value::Int(position));
        self
    }

    /// Set the raw position value; `None` makes the query return no rows
    pub fn with_position_value(mut self, value: Option<Value>) -> Self {
        self.position = value;
        self
    }

    /// Make a step fail
    pub fn fail_on(mut self, failure: MockFailure) -> Self {
        self.failures.insert(failure);
        self
    }

    /// Run a callback after each recorded call
    pub fn on_call<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Call) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Make the first lock call hang for `delay` after it is recorded
    pub fn with_stalled_lock(self, delay: Duration) -> Self {
        *self.lock_stall.lock() = Some(delay);
        self
    }

    fn upsert(&mut self, table: MockTable) {
        self.tables.retain(|t| t.id != table.id);
        self.tables.push(table);
    }

    // ------------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------------

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Number of recorded calls equal to `call`
    pub fn count(&self, call: &Call) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    /// Tables locked, in lock order
    pub fn locked_tables(&self) -> Vec<TableId> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Lock(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Tables whose DDL was read, in read order
    pub fn captured_tables(&self) -> Vec<TableId> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::ReadDdl(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Index of the first recorded call matching `pred`
    pub fn position_of<F: Fn(&Call) -> bool>(&self, pred: F) -> Option<usize> {
        self.state.lock().calls.iter().position(pred)
    }

    /// Index of the last recorded call matching `pred`
    pub fn last_position_of<F: Fn(&Call) -> bool>(&self, pred: F) -> Option<usize> {
        self.state.lock().calls.iter().rposition(pred)
    }

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.state.lock().in_transaction
    }

    /// Tenant the session is currently in
    pub fn current_tenant(&self) -> Option<String> {
        self.state.lock().tenant.clone()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call.clone());
        if let Some(hook) = &self.hook {
            hook(&call);
        }
    }

    fn check(&self, failure: MockFailure) -> Result<()> {
        if self.failures.contains(&failure) {
            return Err(SnapshotError::query(format!(
                "injected failure: {:?}",
                failure
            )));
        }
        Ok(())
    }

    fn table(&self, id: &TableId) -> Option<&MockTable> {
        self.tables.iter().find(|t| &t.id == id)
    }
}

impl Default for MockMetadataProvider {
    fn default() -> Self {
        Self::oracle()
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    fn dialect(&self) -> &dyn SnapshotDialect {
        self.dialect.as_ref()
    }

    async fn begin_transaction(&self) -> Result<()> {
        self.record(Call::BeginTransaction);
        self.check(MockFailure::BeginTransaction)?;
        self.state.lock().in_transaction = true;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.record(Call::Rollback);
        self.check(MockFailure::Rollback)?;
        self.state.lock().in_transaction = false;
        Ok(())
    }

    async fn select_tenant(&self, tenant: &str) -> Result<()> {
        self.record(Call::SelectTenant(tenant.to_string()));
        self.check(MockFailure::SelectTenant)?;
        self.state.lock().tenant = Some(tenant.to_string());
        Ok(())
    }

    async fn reset_tenant(&self) -> Result<()> {
        self.record(Call::ResetTenant);
        self.check(MockFailure::ResetTenant)?;
        self.state.lock().tenant = None;
        Ok(())
    }

    async fn list_tables(&self, catalog: &str, pattern: &TablePattern) -> Result<Vec<TableId>> {
        self.record(Call::ListTables {
            catalog: catalog.to_string(),
            pattern: pattern.as_sql().to_string(),
        });
        self.check(MockFailure::ListTables)?;
        Ok(self
            .tables
            .iter()
            .filter(|t| pattern.matches(&t.id.table))
            .map(|t| t.id.clone())
            .collect())
    }

    async fn read_schema(&self, catalog: &str, pattern: &TablePattern) -> Result<Tables> {
        self.record(Call::ReadSchema {
            catalog: catalog.to_string(),
            pattern: pattern.as_sql().to_string(),
        });
        self.check(MockFailure::ReadSchema)?;
        Ok(self
            .tables
            .iter()
            .filter(|t| pattern.matches(&t.id.table))
            .filter_map(|t| t.structure.clone())
            .collect())
    }

    async fn execute_query(&self, sql: &str) -> Result<Vec<Row>> {
        if sql == self.dialect.position_query() {
            self.record(Call::ReadPosition);
            self.check(MockFailure::ReadPosition)?;
            return Ok(self
                .position
                .clone()
                .map(|v| vec![Row::scalar("POSITION", v)])
                .unwrap_or_default());
        }

        if let Some(table) = self
            .tables
            .iter()
            .find(|t| self.dialect.table_ddl_query(&t.id) == sql)
        {
            self.record(Call::ReadDdl(table.id.clone()));
            self.check(MockFailure::ReadDdl(table.id.clone()))?;
            return Ok(table
                .ddl
                .clone()
                .map(|ddl| vec![Row::scalar("DDL", ddl)])
                .unwrap_or_default());
        }

        self.record(Call::Query(sql.to_string()));
        Ok(Vec::new())
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.record(Call::Execute(sql.to_string()));
        Ok(())
    }

    async fn lock(&self, table: &TableId) -> Result<()> {
        self.record(Call::Lock(table.clone()));
        let stall = self.lock_stall.lock().take();
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        self.check(MockFailure::Lock(table.clone()))?;
        if self.table(table).is_none() {
            return Err(SnapshotError::query(format!("table {} does not exist", table)));
        }
        Ok(())
    }
}
