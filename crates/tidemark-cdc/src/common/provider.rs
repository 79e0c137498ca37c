//! Metadata provider seam
//!
//! The single boundary between the snapshot core and a concrete data-store
//! driver. One implementation exists per supported store; the snapshot core
//! only builds query text through the provider's [`SnapshotDialect`].

use crate::common::{Result, Row, SnapshotDialect, SnapshotError, TableId, TablePattern, Tables};
use async_trait::async_trait;

/// Connection-scoped access to a store's catalog and session.
///
/// A provider wraps exactly one connection. The snapshot phase owns it
/// exclusively for a whole run, so implementations need not guard against
/// interleaved transactions.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// SQL dialect of the underlying store
    fn dialect(&self) -> &dyn SnapshotDialect;

    /// Disable auto-commit and open a transaction
    async fn begin_transaction(&self) -> Result<()>;

    /// Roll back the open transaction, releasing every lock it holds
    async fn rollback(&self) -> Result<()>;

    /// Switch the session into a tenant (pluggable database)
    async fn select_tenant(&self, tenant: &str) -> Result<()> {
        match self.dialect().select_tenant_statement(tenant) {
            Some(sql) => self.execute(&sql).await,
            None => Err(SnapshotError::config(format!(
                "{} does not support tenant selection",
                self.dialect().name()
            ))),
        }
    }

    /// Switch the session back to the root container
    async fn reset_tenant(&self) -> Result<()> {
        match self.dialect().reset_tenant_statement() {
            Some(sql) => self.execute(&sql).await,
            None => Ok(()),
        }
    }

    /// Tables in `catalog` whose name matches `pattern`
    async fn list_tables(&self, catalog: &str, pattern: &TablePattern) -> Result<Vec<TableId>>;

    /// Structural model of every table in `catalog` matching `pattern`
    async fn read_schema(&self, catalog: &str, pattern: &TablePattern) -> Result<Tables>;

    /// Execute a query that returns rows
    async fn execute_query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Execute a statement that returns no rows
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Take an exclusive, write-blocking lock held until the transaction ends
    async fn lock(&self, table: &TableId) -> Result<()> {
        let sql = self.dialect().lock_statement(table);
        self.execute(&sql).await
    }
}

#[async_trait]
impl<P: MetadataProvider + ?Sized> MetadataProvider for Box<P> {
    fn dialect(&self) -> &dyn SnapshotDialect {
        (**self).dialect()
    }

    async fn begin_transaction(&self) -> Result<()> {
        (**self).begin_transaction().await
    }

    async fn rollback(&self) -> Result<()> {
        (**self).rollback().await
    }

    async fn select_tenant(&self, tenant: &str) -> Result<()> {
        (**self).select_tenant(tenant).await
    }

    async fn reset_tenant(&self) -> Result<()> {
        (**self).reset_tenant().await
    }

    async fn list_tables(&self, catalog: &str, pattern: &TablePattern) -> Result<Vec<TableId>> {
        (**self).list_tables(catalog, pattern).await
    }

    async fn read_schema(&self, catalog: &str, pattern: &TablePattern) -> Result<Tables> {
        (**self).read_schema(catalog, pattern).await
    }

    async fn execute_query(&self, sql: &str) -> Result<Vec<Row>> {
        (**self).execute_query(sql).await
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        (**self).execute(sql).await
    }

    async fn lock(&self, table: &TableId) -> Result<()> {
        (**self).lock(table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{OracleDialect, PostgresDialect};
    use parking_lot::Mutex;

    /// Provider that only records executed statements
    struct Recording<D> {
        dialect: D,
        executed: Mutex<Vec<String>>,
    }

    impl<D> Recording<D> {
        fn new(dialect: D) -> Self {
            Self {
                dialect,
                executed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl<D: SnapshotDialect> MetadataProvider for Recording<D> {
        fn dialect(&self) -> &dyn SnapshotDialect {
            &self.dialect
        }
        async fn begin_transaction(&self) -> Result<()> {
            Ok(())
        }
        async fn rollback(&self) -> Result<()> {
            Ok(())
        }
        async fn list_tables(&self, _: &str, _: &TablePattern) -> Result<Vec<TableId>> {
            Ok(Vec::new())
        }
        async fn read_schema(&self, _: &str, _: &TablePattern) -> Result<Tables> {
            Ok(Tables::new())
        }
        async fn execute_query(&self, _: &str) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }
        async fn execute(&self, sql: &str) -> Result<()> {
            self.executed.lock().push(sql.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_lock_uses_dialect() {
        let p = Recording::new(OracleDialect);
        p.lock(&TableId::new("INVENTORY", "ORDERS")).await.unwrap();
        assert_eq!(
            p.executed.lock().as_slice(),
            ["LOCK TABLE \"INVENTORY\".\"ORDERS\" IN EXCLUSIVE MODE"]
        );
    }

    #[tokio::test]
    async fn test_default_tenant_switching() {
        let p = Recording::new(OracleDialect);
        p.select_tenant("ORCLPDB1").await.unwrap();
        p.reset_tenant().await.unwrap();
        assert_eq!(
            p.executed.lock().as_slice(),
            [
                "ALTER SESSION SET CONTAINER = \"ORCLPDB1\"",
                "ALTER SESSION SET CONTAINER = CDB$ROOT"
            ]
        );
    }

    #[tokio::test]
    async fn test_tenant_unsupported() {
        let p: Box<dyn MetadataProvider> = Box::new(Recording::new(PostgresDialect));
        let err = p.select_tenant("tenant_a").await.unwrap_err();
        assert_eq!(err.error_code(), "config_error");
        p.reset_tenant().await.unwrap();
    }
}
