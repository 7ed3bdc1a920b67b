//! SQLite helper utilities for type conversion
//!
//! SQLite has no native UUID or array types. Ids are stored as TEXT and
//! lists (genres, an author's book ids) as JSON arrays in TEXT columns.

use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

// ============================================================================
// Id Helpers
// ============================================================================

/// Generate a new record id
#[inline]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// Array/Vec Helpers (stored as JSON strings in SQLite)
// ============================================================================

/// Serialize a Vec to a JSON string for SQLite storage
#[inline]
pub fn vec_to_json<T: Serialize>(v: &[T]) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string())
}

/// Deserialize a JSON string from SQLite to a Vec
#[inline]
pub fn json_to_vec<T: DeserializeOwned>(s: &str) -> Vec<T> {
    serde_json::from_str(s).unwrap_or_default()
}

// ============================================================================
// Timestamp Helpers (stored as ISO8601 TEXT in SQLite)
// ============================================================================

/// Get current UTC timestamp as ISO8601 string for SQLite
#[inline]
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============================================================================
// Query Building Helpers
// ============================================================================

/// Build a SQL fragment to check if any value from a list exists in a JSON array column
pub fn json_array_overlaps_sql(column: &str, placeholder_count: usize) -> String {
    if placeholder_count == 0 {
        return "1=0".to_string(); // Always false for empty list
    }

    let placeholders: Vec<&str> = (0..placeholder_count).map(|_| "?").collect();
    format!(
        "EXISTS (SELECT 1 FROM json_each({}) WHERE value IN ({}))",
        column,
        placeholders.join(", ")
    )
}

/// Build a `?, ?, ?` placeholder list for an `IN (...)` clause
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
