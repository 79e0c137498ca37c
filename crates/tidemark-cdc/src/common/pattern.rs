//! # Table Name Patterns
//!
//! Table inclusion filters use SQL `LIKE` syntax so that providers can push the
//! pattern straight down into a catalog query:
//!
//! - `%` matches zero or more characters
//! - `_` matches exactly one character
//! - `\` escapes the next character
//!
//! Providers that filter client-side use [`TablePattern::matches`], which
//! compiles the same pattern to an anchored, case-insensitive regex.
//!
//! ```rust
//! use tidemark_cdc::common::TablePattern;
//!
//! let pattern = TablePattern::new("%DEBEZIUM%").unwrap();
//! assert!(pattern.matches("MY_DEBEZIUM_TABLE"));
//! assert!(!pattern.matches("ORDERS"));
//! ```

use regex::Regex;

/// Error type for pattern operations
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid table pattern: {0}")]
    InvalidRegex(#[from] regex::Error),
    #[error("Empty pattern")]
    EmptyPattern,
}

/// A compiled SQL `LIKE` pattern over table names
#[derive(Debug, Clone)]
pub struct TablePattern {
    /// Original pattern, passed to stores verbatim
    pattern: String,
    /// Compiled regex (case-insensitive)
    regex: Regex,
    /// `%` alone matches everything
    is_wildcard: bool,
}

impl TablePattern {
    /// Compile a `LIKE` pattern
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let regex = regex::RegexBuilder::new(&like_to_regex(pattern))
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            is_wildcard: pattern.chars().all(|c| c == '%'),
        })
    }

    /// Pattern matching every table
    pub fn any() -> Self {
        Self {
            pattern: "%".to_string(),
            regex: Regex::new("^.*$").expect("static regex"),
            is_wildcard: true,
        }
    }

    /// Check if a table name matches
    #[inline]
    pub fn matches(&self, table: &str) -> bool {
        self.is_wildcard || self.regex.is_match(table)
    }

    /// The pattern in SQL `LIKE` syntax
    pub fn as_sql(&self) -> &str {
        &self.pattern
    }

    /// Check if this pattern matches everything
    pub fn is_wildcard(&self) -> bool {
        self.is_wildcard
    }
}

impl Default for TablePattern {
    fn default() -> Self {
        Self::any()
    }
}

impl std::fmt::Display for TablePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Convert a `LIKE` pattern to an anchored regex
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_to_regex() {
        assert_eq!(like_to_regex("%"), "^.*$");
        assert_eq!(like_to_regex("A_B"), "^A.B$");
        assert_eq!(like_to_regex("a.b%"), r"^a\.b.*$");
        assert_eq!(like_to_regex(r"A\_B"), "^A_B$");
    }

    #[test]
    fn test_contains_pattern() {
        let p = TablePattern::new("%DEBEZIUM%").unwrap();
        assert!(p.matches("DEBEZIUM"));
        assert!(p.matches("customers_debezium_v2"));
        assert!(!p.matches("CUSTOMERS"));
    }

    #[test]
    fn test_single_char_wildcard() {
        let p = TablePattern::new("ORDERS_20__").unwrap();
        assert!(p.matches("ORDERS_2024"));
        assert!(!p.matches("ORDERS_202"));
        assert!(!p.matches("ORDERS_20245"));
    }

    #[test]
    fn test_escaped_underscore() {
        let p = TablePattern::new(r"T\_1").unwrap();
        assert!(p.matches("T_1"));
        assert!(!p.matches("TX1"));
    }

    #[test]
    fn test_wildcard() {
        assert!(TablePattern::any().is_wildcard());
        assert!(TablePattern::new("%%").unwrap().is_wildcard());
        assert!(TablePattern::any().matches("anything"));
        assert!(!TablePattern::new("A%").unwrap().is_wildcard());
    }

    #[test]
    fn test_empty_pattern() {
        assert!(matches!(
            TablePattern::new(""),
            Err(PatternError::EmptyPattern)
        ));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = TablePattern::new("a+b").unwrap();
        assert!(p.matches("a+b"));
        assert!(!p.matches("aab"));
        assert_eq!(p.as_sql(), "a+b");
    }
}
