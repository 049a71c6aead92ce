//! Series keys and table naming shared by all table clients
//!
//! A series is identified by its qualified metric name plus the canonical
//! encoding of its tags. Tags are a [`BTreeMap`](std::collections::BTreeMap),
//! so the JSON encoding is always key-sorted and two tag sets that only
//! differ in insertion order encode to the same string.

use std::sync::LazyLock;

use regex::Regex;

use super::error::{StorageError, StorageResult};
use crate::entity::Tags;

static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("table name pattern is valid")
});

/// A staged point waiting for the next flush
#[derive(Debug, Clone, PartialEq)]
pub struct PointRow {
    pub metric: String,
    pub tags: Tags,
    pub timestamp: i64,
    pub value: f64,
}

/// Reject table names that are not plain identifiers
///
/// Table names end up quoted in SQL statements, so only
/// `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub fn validate_table_name(name: &str) -> StorageResult<()> {
    if TABLE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(StorageError::InvalidConfig(format!(
            "invalid table name '{}': expected [A-Za-z_][A-Za-z0-9_]*",
            name
        )))
    }
}

/// Only finite values may be staged
///
/// SQLite stores NaN as NULL, which the `value` column rejects at flush time.
pub fn check_value(metric: &str, timestamp: i64, value: f64) -> StorageResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StorageError::WriteFailed(format!(
            "non-finite value {} for {}@{}",
            value, metric, timestamp
        )))
    }
}

/// Canonical string form of a tag set
pub fn encode_tags(tags: &Tags) -> StorageResult<String> {
    Ok(serde_json::to_string(tags)?)
}

pub fn decode_tags(encoded: &str) -> StorageResult<Tags> {
    serde_json::from_str(encoded).map_err(|e| {
        StorageError::SerializationError(format!("failed to decode tags '{}': {}", encoded, e))
    })
}

/// Whether a series with `series_tags` is selected by the query `filter`
pub fn tags_match(series_tags: &Tags, filter: &Tags) -> bool {
    filter
        .iter()
        .all(|(key, value)| series_tags.get(key) == Some(value))
}
