//! Shared fixtures for snapshot protocol tests

#![allow(dead_code)]

use std::sync::{Arc, Once};
use tidemark_cdc::common::{
    ColumnDefinition, MemorySchemaHistory, MockMetadataProvider, OffsetContext, SnapshotConfig,
    TableId, TableStructure,
};
use tidemark_cdc::snapshot::SnapshotCoordinator;

static INIT: Once = Once::new();

/// Initialize test logging once per test binary
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("tidemark_cdc=debug".parse().unwrap()),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const SOURCE: &str = "server1";
pub const TENANT: &str = "ORCLPDB1";

pub fn t1() -> TableId {
    TableId::new("DEBEZIUM", "T1")
}

pub fn t2() -> TableId {
    TableId::new("DEBEZIUM", "T2")
}

/// Two-column table with a primary key on ID
pub fn structure(id: TableId) -> TableStructure {
    TableStructure::new(id)
        .with_column(ColumnDefinition::new("ID", "NUMBER(10)", 1).with_nullable(false))
        .with_column(ColumnDefinition::new("NAME", "VARCHAR2(255)", 2).with_length(255))
        .with_primary_key(["ID"])
}

pub fn ddl(id: &TableId) -> String {
    format!(
        "CREATE TABLE \"{}\".\"{}\" (\"ID\" NUMBER(10) NOT NULL, \"NAME\" VARCHAR2(255), PRIMARY KEY (\"ID\"))",
        id.schema, id.table
    )
}

/// Oracle provider serving T1 and T2
pub fn two_table_provider(position: i64) -> MockMetadataProvider {
    MockMetadataProvider::oracle()
        .with_table(structure(t1()), ddl(&t1()))
        .with_table(structure(t2()), ddl(&t2()))
        .with_position(position)
}

pub fn config() -> SnapshotConfig {
    SnapshotConfig::builder()
        .logical_name(SOURCE)
        .database("ORCLCDB")
        .build()
        .unwrap()
}

pub fn tenant_config() -> SnapshotConfig {
    SnapshotConfig::builder()
        .logical_name(SOURCE)
        .database("ORCLCDB")
        .tenant(TENANT)
        .build()
        .unwrap()
}

pub fn coordinator(
    config: SnapshotConfig,
    provider: MockMetadataProvider,
    previous: Option<OffsetContext>,
) -> (
    SnapshotCoordinator<MockMetadataProvider>,
    Arc<MemorySchemaHistory>,
) {
    let history = Arc::new(MemorySchemaHistory::new());
    let coordinator =
        SnapshotCoordinator::new(config, provider, history.clone(), previous).unwrap();
    (coordinator, history)
}
