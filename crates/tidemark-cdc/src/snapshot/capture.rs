//! Table definition capture
//!
//! Capture runs in two steps. [`SchemaCaptureEngine::prepare`] reads the
//! structural model of every matching table in one pass; then
//! [`SchemaCaptureEngine::capture`] fetches each table's DDL text and pairs it
//! with the model read earlier.

use crate::common::{
    MetadataProvider, Result, SnapshotError, TableId, TablePattern, TableStructure, Tables,
};
use tracing::debug;

/// Extracts DDL and structural models for locked tables.
#[derive(Debug, Default)]
pub struct SchemaCaptureEngine {
    tables: Option<Tables>,
}

impl SchemaCaptureEngine {
    /// Create an engine; call `prepare` before capturing
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the structural model of all tables in `catalog` matching `pattern`.
    pub async fn prepare<P: MetadataProvider + ?Sized>(
        &mut self,
        provider: &P,
        catalog: &str,
        pattern: &TablePattern,
    ) -> Result<()> {
        let tables = provider
            .read_schema(catalog, pattern)
            .await
            .map_err(|e| SnapshotError::metadata(catalog, e.to_string()))?;
        debug!("Read structure of {} tables in {}", tables.len(), catalog);
        self.tables = Some(tables);
        Ok(())
    }

    /// Fetch `table`'s DDL and its structural model.
    ///
    /// Fails with `MetadataUnavailable` when the store returns no DDL, or the
    /// table has no usable model.
    pub async fn capture<P: MetadataProvider + ?Sized>(
        &self,
        provider: &P,
        table: &TableId,
    ) -> Result<(String, TableStructure)> {
        let tables = self
            .tables
            .as_ref()
            .ok_or_else(|| SnapshotError::metadata(table.to_string(), "schema was not read"))?;

        let sql = provider.dialect().table_ddl_query(table);
        let rows = provider
            .execute_query(&sql)
            .await
            .map_err(|e| SnapshotError::metadata(table.to_string(), e.to_string()))?;

        let ddl = rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|ddl| !ddl.is_empty())
            .ok_or_else(|| SnapshotError::metadata(table.to_string(), "store returned no DDL"))?
            .to_string();

        let structure = tables
            .for_table(table)
            .ok_or_else(|| SnapshotError::metadata(table.to_string(), "no structural model"))?;
        if !structure.is_well_formed() {
            return Err(SnapshotError::metadata(
                table.to_string(),
                "structural model has no columns or an unknown key column",
            ));
        }

        debug!("Captured definition of {}", table);
        Ok((ddl, structure.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Call, ColumnDefinition, MockFailure, MockMetadataProvider};

    fn orders() -> TableStructure {
        TableStructure::new(TableId::new("INVENTORY", "ORDERS"))
            .with_column(ColumnDefinition::new("ID", "NUMBER(10)", 1).with_nullable(false))
            .with_primary_key(["ID"])
    }

    async fn prepared(p: &MockMetadataProvider) -> SchemaCaptureEngine {
        let mut engine = SchemaCaptureEngine::new();
        engine
            .prepare(p, "ORCLPDB1", &TablePattern::any())
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn test_capture() {
        let p = MockMetadataProvider::oracle()
            .with_table(orders(), "  CREATE TABLE ORDERS (ID NUMBER(10))\n");
        let engine = prepared(&p).await;

        let id = TableId::new("INVENTORY", "ORDERS");
        let (ddl, structure) = engine.capture(&p, &id).await.unwrap();
        assert_eq!(ddl, "CREATE TABLE ORDERS (ID NUMBER(10))");
        assert_eq!(structure, orders());
        assert_eq!(
            p.calls(),
            vec![
                Call::ReadSchema {
                    catalog: "ORCLPDB1".into(),
                    pattern: "%".into()
                },
                Call::ReadDdl(id)
            ]
        );
    }

    #[tokio::test]
    async fn test_capture_without_prepare() {
        let p = MockMetadataProvider::oracle().with_table(orders(), "ddl");
        let err = SchemaCaptureEngine::new()
            .capture(&p, &TableId::new("INVENTORY", "ORDERS"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "metadata_unavailable");
        assert!(p.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_ddl() {
        let p = MockMetadataProvider::oracle().with_table_without_ddl(orders());
        let engine = prepared(&p).await;
        let err = engine
            .capture(&p, &TableId::new("INVENTORY", "ORDERS"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no DDL"));
    }

    #[tokio::test]
    async fn test_blank_ddl() {
        let p = MockMetadataProvider::oracle().with_table(orders(), "   ");
        let engine = prepared(&p).await;
        let err = engine
            .capture(&p, &TableId::new("INVENTORY", "ORDERS"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "metadata_unavailable");
    }

    #[tokio::test]
    async fn test_missing_structure() {
        let id = TableId::new("INVENTORY", "ORDERS");
        let p = MockMetadataProvider::oracle().with_table_without_structure(id.clone(), "ddl");
        let engine = prepared(&p).await;
        let err = engine.capture(&p, &id).await.unwrap_err();
        assert!(err.to_string().contains("no structural model"));
    }

    #[tokio::test]
    async fn test_malformed_structure() {
        let broken = TableStructure::new(TableId::new("INVENTORY", "ORDERS"))
            .with_column(ColumnDefinition::new("ID", "NUMBER", 1))
            .with_primary_key(["MISSING"]);
        let p = MockMetadataProvider::oracle().with_table(broken, "ddl");
        let engine = prepared(&p).await;
        let err = engine
            .capture(&p, &TableId::new("INVENTORY", "ORDERS"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "metadata_unavailable");
    }

    #[tokio::test]
    async fn test_ddl_query_failure() {
        let id = TableId::new("INVENTORY", "ORDERS");
        let p = MockMetadataProvider::oracle()
            .with_table(orders(), "ddl")
            .fail_on(MockFailure::ReadDdl(id.clone()));
        let engine = prepared(&p).await;
        let err = engine.capture(&p, &id).await.unwrap_err();
        assert!(matches!(err, SnapshotError::MetadataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_read_schema_failure() {
        let p = MockMetadataProvider::oracle().fail_on(MockFailure::ReadSchema);
        let err = SchemaCaptureEngine::new()
            .prepare(&p, "ORCLPDB1", &TablePattern::any())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "metadata_unavailable");
    }
}
