//! Checksums for protected tables
//!
//! A table is hashed through its canonical JSON form, so two executions that
//! produced the same table (inline or from a worker) carry the same checksum.

use crate::domain::errors::SafeDataError;
use crate::domain::table::DatasetTable;
use crate::domain::Result;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 of a table's canonical JSON, hex-encoded
///
/// # Examples
///
/// ```
/// use safedata::core::verification::checksum::table_checksum;
/// use safedata::domain::{Column, DatasetTable};
///
/// let table = DatasetTable::new(vec![Column::numeric("age", [34, 51]).unwrap()]).unwrap();
/// let checksum = table_checksum(&table).unwrap();
/// assert_eq!(checksum.len(), 64);
/// ```
pub fn table_checksum(table: &DatasetTable) -> Result<String> {
    let value = serde_json::to_value(table)?;
    calculate_checksum(&value)
}

/// SHA-256 of any JSON value with object keys sorted
pub fn calculate_checksum(data: &Value) -> Result<String> {
    let normalized = normalize_json(data);
    let data_str = serde_json::to_string(&normalized)
        .map_err(|e| SafeDataError::Serialization(e.to_string()))?;
    Ok(calculate_checksum_bytes(data_str.as_bytes()))
}

fn normalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), normalize_json(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(normalize_json).collect()),
        _ => value.clone(),
    }
}

/// SHA-256 of raw bytes, hex-encoded
pub fn calculate_checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Column;
    use serde_json::json;

    fn table(values: [i32; 3]) -> DatasetTable {
        DatasetTable::new(vec![
            Column::numeric("age", values).unwrap(),
            Column::categorical("zip", ["a", "b", "c"]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_table_checksum_deterministic() {
        assert_eq!(
            table_checksum(&table([1, 2, 3])).unwrap(),
            table_checksum(&table([1, 2, 3])).unwrap()
        );
    }

    #[test]
    fn test_table_checksum_detects_changes() {
        assert_ne!(
            table_checksum(&table([1, 2, 3])).unwrap(),
            table_checksum(&table([1, 2, 4])).unwrap()
        );
    }

    #[test]
    fn test_key_order_independence() {
        let a = json!({"a": 1, "b": 2, "c": 3});
        let b = json!({"c": 3, "a": 1, "b": 2});
        assert_eq!(calculate_checksum(&a).unwrap(), calculate_checksum(&b).unwrap());
    }

    #[test]
    fn test_checksum_bytes_is_hex() {
        let checksum = calculate_checksum_bytes(b"Hello, World!");
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
