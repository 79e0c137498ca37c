//! Snapshot configuration
//!
//! ```rust
//! use tidemark_cdc::common::{SnapshotConfig, SourceKind};
//!
//! let config = SnapshotConfig::builder()
//!     .logical_name("server1")
//!     .database("ORCLCDB")
//!     .tenant("ORCLPDB1")
//!     .table_pattern("%DEBEZIUM%")
//!     .source_kind(SourceKind::Oracle)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.catalog(), "ORCLPDB1");
//! ```

use crate::common::{dialect_for, Result, SnapshotError, SourceKind, TablePattern};
use serde::{Deserialize, Serialize};

fn default_table_pattern() -> String {
    "%".to_string()
}

/// Configuration of one snapshot source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Logical source name; partition key of the produced offset
    pub logical_name: String,
    /// Database (catalog) name
    pub database: String,
    /// Optional tenant (pluggable database) to enter for the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Table inclusion pattern in SQL `LIKE` syntax
    #[serde(default = "default_table_pattern")]
    pub table_pattern: String,
    /// Store type, selects the SQL dialect
    #[serde(default)]
    pub source_kind: SourceKind,
}

impl SnapshotConfig {
    /// Create a new configuration builder
    pub fn builder() -> SnapshotConfigBuilder {
        SnapshotConfigBuilder::default()
    }

    /// Working catalog: the tenant if one is configured, else the database.
    pub fn catalog(&self) -> &str {
        self.tenant.as_deref().unwrap_or(&self.database)
    }

    /// Compile the table inclusion pattern
    pub fn pattern(&self) -> Result<TablePattern> {
        TablePattern::new(&self.table_pattern)
            .map_err(|e| SnapshotError::config(format!("table_pattern: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.logical_name.trim().is_empty() {
            return Err(SnapshotError::config("Logical name is required"));
        }
        if self.database.trim().is_empty() {
            return Err(SnapshotError::config("Database name is required"));
        }
        self.pattern()?;

        if let Some(tenant) = &self.tenant {
            if tenant.trim().is_empty() {
                return Err(SnapshotError::config("Tenant name must not be blank"));
            }
            if !dialect_for(self.source_kind).supports_tenants() {
                return Err(SnapshotError::config(format!(
                    "{} sources do not support tenant selection",
                    self.source_kind
                )));
            }
        }
        Ok(())
    }
}

/// Builder for SnapshotConfig
#[derive(Default)]
pub struct SnapshotConfigBuilder {
    logical_name: Option<String>,
    database: Option<String>,
    tenant: Option<String>,
    table_pattern: Option<String>,
    source_kind: SourceKind,
}

impl SnapshotConfigBuilder {
    /// Set the logical source name
    pub fn logical_name(mut self, s: impl Into<String>) -> Self {
        self.logical_name = Some(s.into());
        self
    }

    /// Set the database name
    pub fn database(mut self, s: impl Into<String>) -> Self {
        self.database = Some(s.into());
        self
    }

    /// Set the tenant to enter for the run
    pub fn tenant(mut self, s: impl Into<String>) -> Self {
        self.tenant = Some(s.into());
        self
    }

    /// Set the table inclusion pattern
    pub fn table_pattern(mut self, s: impl Into<String>) -> Self {
        self.table_pattern = Some(s.into());
        self
    }

    /// Set the source kind
    pub fn source_kind(mut self, kind: SourceKind) -> Self {
        self.source_kind = kind;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SnapshotConfig> {
        let config = SnapshotConfig {
            logical_name: self
                .logical_name
                .ok_or_else(|| SnapshotError::config("Logical name is required"))?,
            database: self
                .database
                .ok_or_else(|| SnapshotError::config("Database name is required"))?,
            tenant: self.tenant,
            table_pattern: self.table_pattern.unwrap_or_else(default_table_pattern),
            source_kind: self.source_kind,
        };
        config.validate()?;
        Ok(config)
    }
}
