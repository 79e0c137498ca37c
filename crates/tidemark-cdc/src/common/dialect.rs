//! Store-specific SQL for the snapshot protocol
//!
//! The snapshot core never writes store syntax itself. Each supported store
//! contributes a [`SnapshotDialect`] that renders the handful of statements the
//! protocol needs; the dialect is chosen once, at construction time, from
//! [`SourceKind`].

use crate::common::TableId;
use serde::{Deserialize, Serialize};

/// Supported source stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Oracle (SCN position, pluggable databases as tenants)
    #[default]
    Oracle,
    /// PostgreSQL (WAL LSN position, no tenants)
    Postgres,
}

impl SourceKind {
    /// Source type name carried on events
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Oracle => "oracle",
            SourceKind::Postgres => "postgres",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statements a store must provide for a consistent schema snapshot.
pub trait SnapshotDialect: Send + Sync {
    /// Source type name (e.g., "oracle")
    fn name(&self) -> &'static str;

    /// Exclusive, write-blocking lock held until the transaction ends
    fn lock_statement(&self, table: &TableId) -> String;

    /// Query returning the store's current change counter as a single integer
    fn position_query(&self) -> String;

    /// Query returning the table's DDL as a single text value
    fn table_ddl_query(&self, table: &TableId) -> String;

    /// Whether the store has selectable sub-databases
    fn supports_tenants(&self) -> bool {
        false
    }

    /// Statement switching the session into a tenant
    fn select_tenant_statement(&self, _tenant: &str) -> Option<String> {
        None
    }

    /// Statement switching the session back to the root container
    fn reset_tenant_statement(&self) -> Option<String> {
        None
    }
}

/// Select the dialect for a source kind.
pub fn dialect_for(kind: SourceKind) -> Box<dyn SnapshotDialect> {
    match kind {
        SourceKind::Oracle => Box::new(OracleDialect),
        SourceKind::Postgres => Box::new(PostgresDialect),
    }
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn qualified(table: &TableId) -> String {
    format!("{}.{}", quote_ident(&table.schema), quote_ident(&table.table))
}

// ============================================================================
// Oracle
// ============================================================================

/// Oracle dialect.
///
/// Position is the system change number from `DBMS_FLASHBACK`; DDL comes from
/// `DBMS_METADATA`. Tenants are pluggable databases selected with
/// `ALTER SESSION SET CONTAINER`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl SnapshotDialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn lock_statement(&self, table: &TableId) -> String {
        format!("LOCK TABLE {} IN EXCLUSIVE MODE", qualified(table))
    }

    fn position_query(&self) -> String {
        "SELECT DBMS_FLASHBACK.GET_SYSTEM_CHANGE_NUMBER FROM DUAL".to_string()
    }

    fn table_ddl_query(&self, table: &TableId) -> String {
        format!(
            "SELECT DBMS_METADATA.GET_DDL('TABLE', {}, {}) FROM DUAL",
            quote_literal(&table.table),
            quote_literal(&table.schema)
        )
    }

    fn supports_tenants(&self) -> bool {
        true
    }

    fn select_tenant_statement(&self, tenant: &str) -> Option<String> {
        Some(format!(
            "ALTER SESSION SET CONTAINER = {}",
            quote_ident(tenant)
        ))
    }

    fn reset_tenant_statement(&self) -> Option<String> {
        Some("ALTER SESSION SET CONTAINER = CDB$ROOT".to_string())
    }
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// PostgreSQL dialect.
///
/// Position is the current WAL LSN as a byte offset. PostgreSQL has no DDL
/// export function, so the `CREATE TABLE` text is rebuilt from
/// `information_schema`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SnapshotDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn lock_statement(&self, table: &TableId) -> String {
        format!("LOCK TABLE {} IN EXCLUSIVE MODE", qualified(table))
    }

    fn position_query(&self) -> String {
        "SELECT (pg_current_wal_lsn() - '0/0'::pg_lsn)::bigint".to_string()
    }

    fn table_ddl_query(&self, table: &TableId) -> String {
        format!(
            r#"SELECT 'CREATE TABLE ' || quote_ident(c.table_schema) || '.' || quote_ident(c.table_name)
    || ' (' || string_agg(
        quote_ident(c.column_name) || ' ' || c.data_type
        || CASE WHEN c.character_maximum_length IS NOT NULL
                THEN '(' || c.character_maximum_length || ')' ELSE '' END
        || CASE WHEN c.is_nullable = 'NO' THEN ' NOT NULL' ELSE '' END
        || COALESCE(' DEFAULT ' || c.column_default, ''),
        ', ' ORDER BY c.ordinal_position)
    || ')'
FROM information_schema.columns c
WHERE c.table_schema = {} AND c.table_name = {}
GROUP BY c.table_schema, c.table_name"#,
            quote_literal(&table.schema),
            quote_literal(&table.table)
        )
    }
}
