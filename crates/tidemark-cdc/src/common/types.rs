//! Value, row and table model types
//!
//! - [`Value`]/[`Row`]: driver-neutral query results returned by a
//!   [`MetadataProvider`](crate::common::MetadataProvider)
//! - [`TableId`]: lock and metadata lookup key
//! - [`TableStructure`]: logical column/constraint model of a table

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Query results
// ============================================================================

/// A single column value returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// Any integral type
    Int(i64),
    /// Any floating point type
    Float(f64),
    /// Character data (VARCHAR, CLOB, TEXT, ...)
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
}

impl Value {
    /// Check for NULL
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Interpret as a signed integer.
    ///
    /// Numeric text (e.g. `NUMBER` columns rendered as strings) is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if is_integral_in(*f, i64::MIN as f64, i64::MAX as f64) => {
                Some(*f as i64)
            }
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret as an unsigned integer.
    ///
    /// Negative numbers, fractional or non-finite floats, and values beyond
    /// `u64::MAX` yield `None`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(n) => u64::try_from(*n).ok(),
            Value::Float(f) if is_integral_in(*f, 0.0, u64::MAX as f64) => Some(*f as u64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Borrow as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// `f` is a whole number in `[min, max)`; the bound is exclusive because
/// `MAX as f64` rounds up past the integer range.
fn is_integral_in(f: f64, min: f64, max: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= min && f < max
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A result row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Single-column row, used for scalar query results
    pub fn scalar(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(vec![column.into()], vec![value.into()])
    }

    /// Number of columns
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get value by column index
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Get value by column name (case-insensitive)
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

// ============================================================================
// Table identifiers
// ============================================================================

/// (schema, table) pair identifying a table within one data store.
///
/// Ordering is lexical by schema, then table; snapshot phases iterate tables
/// in this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    /// Schema (owner) name
    pub schema: String,
    /// Table name
    pub table: String,
}

impl TableId {
    /// Create a table identifier
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parse `schema.table`
    pub fn parse(qualified: &str) -> Option<Self> {
        let (schema, table) = qualified.split_once('.')?;
        if schema.is_empty() || table.is_empty() {
            return None;
        }
        Some(Self::new(schema, table))
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

// ============================================================================
// Structural model
// ============================================================================

/// Column definition within a [`TableStructure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// Database-native type (e.g., "VARCHAR2(255)", "integer")
    pub type_name: String,
    /// Column position (1-indexed)
    pub position: u32,
    /// Is nullable
    pub nullable: bool,
    /// Maximum length for character/binary types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// Scale for numeric types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Default value expression (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, position: u32) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            position,
            nullable: true,
            length: None,
            scale: None,
            default_value: None,
        }
    }

    /// Set nullable.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set length.
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Set scale.
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Set default value.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }
}

/// Logical structure of a table, independent of any wire encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStructure {
    /// Table identity
    pub id: TableId,
    /// Columns in ordinal order
    pub columns: Vec<ColumnDefinition>,
    /// Primary key column names, in key order
    pub primary_key: Vec<String>,
    /// Table comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TableStructure {
    /// Create an empty structure
    pub fn new(id: TableId) -> Self {
        Self {
            id,
            columns: Vec::new(),
            primary_key: Vec::new(),
            comment: None,
        }
    }

    /// Add a column, keeping ordinal order.
    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self.columns.sort_by_key(|c| c.position);
        self
    }

    /// Set primary key columns.
    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Get column by name (case-insensitive)
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Column names in ordinal order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Check that the model is usable for schema tracking.
    ///
    /// A table needs at least one column and every key column must exist.
    pub fn is_well_formed(&self) -> bool {
        !self.columns.is_empty() && self.primary_key.iter().all(|k| self.column(k).is_some())
    }
}

/// Structures read for a catalog, keyed by [`TableId`].
#[derive(Debug, Clone, Default)]
pub struct Tables {
    tables: BTreeMap<TableId, TableStructure>,
}

impl Tables {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a structure
    pub fn insert(&mut self, structure: TableStructure) {
        self.tables.insert(structure.id.clone(), structure);
    }

    /// Look up a structure
    pub fn for_table(&self, id: &TableId) -> Option<&TableStructure> {
        self.tables.get(id)
    }

    /// Number of tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table identifiers in lexical order
    pub fn table_ids(&self) -> impl Iterator<Item = &TableId> {
        self.tables.keys()
    }
}

impl FromIterator<TableStructure> for Tables {
    fn from_iter<I: IntoIterator<Item = TableStructure>>(iter: I) -> Self {
        let mut tables = Tables::new();
        for t in iter {
            tables.insert(t);
        }
        tables
    }
}
