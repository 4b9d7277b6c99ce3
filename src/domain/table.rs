//! In-memory columnar dataset table
//!
//! A [`DatasetTable`] is an ordered list of named, typed columns of equal
//! length. Tables are never mutated in place: every transformation builds a
//! new table, so a source table can be shared read-only between runs.

use crate::domain::errors::SafeDataError;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing value
    Null,
    /// Finite number
    Number(f64),
    /// Text (categorical value or generalized label)
    Text(String),
}

/// Grouping key used for null cells; cannot collide with a real label
const NULL_KEY: &str = "\u{0}null";

impl Value {
    /// Numeric content, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text content, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical text form used for grouping and equality across tables
    ///
    /// Numbers and text compare by their rendered form, so the auxiliary
    /// value `5` links to a released label `"5"`.
    pub fn key(&self) -> String {
        match self {
            Value::Null => NULL_KEY.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
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

/// Render a number without a trailing `.0` for integral values
pub fn format_number(n: f64) -> String {
    // -0 and 0 must group together
    let n = if n == 0.0 { 0.0 } else { n };
    format!("{n}")
}

/// Column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    values: Vec<Value>,
}

impl Column {
    /// Create a column, checking that numeric columns hold only finite numbers or nulls
    pub fn new(name: impl Into<String>, kind: ColumnKind, values: Vec<Value>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SafeDataError::Configuration(
                "Column name cannot be empty".to_string(),
            ));
        }
        if kind == ColumnKind::Numeric {
            for (row, value) in values.iter().enumerate() {
                match value {
                    Value::Null => {}
                    Value::Number(n) if n.is_finite() => {}
                    other => {
                        return Err(SafeDataError::Configuration(format!(
                            "Numeric column '{name}' has non-numeric value '{other}' at row {row}"
                        )))
                    }
                }
            }
        }
        Ok(Self { name, kind, values })
    }

    /// Numeric column from optional numbers
    pub fn numeric<I>(name: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::new(
            name,
            ColumnKind::Numeric,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Categorical column; numbers are kept as given and grouped by their rendered form
    pub fn categorical<I>(name: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::new(
            name,
            ColumnKind::Categorical,
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Non-null numeric values
    pub fn numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(Value::as_f64)
    }
}

/// Serialized table shape, validated into a [`DatasetTable`]
#[derive(Deserialize)]
struct RawTable {
    columns: Vec<Column>,
}

impl TryFrom<RawTable> for DatasetTable {
    type Error = SafeDataError;

    fn try_from(raw: RawTable) -> Result<Self> {
        // Re-run column validation: serde bypasses Column::new
        let columns = raw
            .columns
            .into_iter()
            .map(|c| Column::new(c.name, c.kind, c.values))
            .collect::<Result<Vec<_>>>()?;
        DatasetTable::new(columns)
    }
}

/// Columnar microdata table
///
/// # Examples
///
/// ```
/// use safedata::domain::table::{Column, DatasetTable, Value};
///
/// let table = DatasetTable::new(vec![
///     Column::numeric("age", [34, 51]).unwrap(),
///     Column::categorical("zip", ["02134", "02139"]).unwrap(),
/// ])
/// .unwrap();
///
/// assert_eq!(table.row_count(), 2);
/// assert_eq!(table.value(1, "zip"), Some(&Value::from("02139")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct DatasetTable {
    columns: Vec<Column>,
}

impl DatasetTable {
    /// Create a table, checking equal row counts and unique column names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SafeDataError::Configuration(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
        }

        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(SafeDataError::SchemaMismatch(format!(
                    "Column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    expected
                )));
            }
        }

        Ok(Self { columns })
    }

    /// Build a table from row-major data
    pub fn from_rows(schema: &[(&str, ColumnKind)], rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut buffers: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); schema.len()];
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != schema.len() {
                return Err(SafeDataError::SchemaMismatch(format!(
                    "Row {index} has {} values, expected {}",
                    row.len(),
                    schema.len()
                )));
            }
            for (buffer, value) in buffers.iter_mut().zip(row) {
                buffer.push(value);
            }
        }

        let columns = schema
            .iter()
            .zip(buffers)
            .map(|((name, kind), values)| Column::new(*name, *kind, values))
            .collect::<Result<Vec<_>>>()?;
        Self::new(columns)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Column names and kinds in table order
    pub fn schema(&self) -> Vec<(String, ColumnKind)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.kind))
            .collect()
    }

    /// Single cell
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Ordered `(column, value)` view of one row
    pub fn row(&self, index: usize) -> Option<Vec<(&str, &Value)>> {
        if index >= self.row_count() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.as_str(), &c.values[index]))
                .collect(),
        )
    }

    /// Copy of this table with one column replaced by name
    ///
    /// The replacement may change the column kind (a generalized numeric
    /// column becomes categorical) but not its name or length.
    pub fn with_column(&self, column: Column) -> Result<Self> {
        let index = self.column_index(&column.name).ok_or_else(|| {
            SafeDataError::SchemaMismatch(format!("Unknown column '{}'", column.name))
        })?;
        if column.len() != self.row_count() {
            return Err(SafeDataError::SchemaMismatch(format!(
                "Replacement column '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                self.row_count()
            )));
        }
        let mut columns = self.columns.clone();
        columns[index] = column;
        Ok(Self { columns })
    }

    /// Copy of this table with several columns replaced
    pub fn with_columns(&self, replacements: Vec<Column>) -> Result<Self> {
        replacements
            .into_iter()
            .try_fold(self.clone(), |table, column| table.with_column(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DatasetTable {
        DatasetTable::new(vec![
            Column::numeric("age", [25, 30, 25]).unwrap(),
            Column::categorical("zip", ["12345", "67890", "12345"]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_table_shape() {
        let table = sample();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.column_names(), vec!["age", "zip"]);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_unequal_columns_rejected() {
        let result = DatasetTable::new(vec![
            Column::numeric("age", [25, 30]).unwrap(),
            Column::categorical("zip", ["12345"]).unwrap(),
        ]);
        assert!(matches!(result, Err(SafeDataError::SchemaMismatch(_))));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let result = DatasetTable::new(vec![
            Column::numeric("age", [25]).unwrap(),
            Column::numeric("age", [30]).unwrap(),
        ]);
        assert!(matches!(result, Err(SafeDataError::Configuration(_))));
    }

    #[test]
    fn test_numeric_column_rejects_text() {
        let result = Column::new(
            "age",
            ColumnKind::Numeric,
            vec![Value::from(1.0), Value::from("x")],
        );
        assert!(result.is_err());
        assert!(Column::numeric("age", [f64::NAN]).is_err());
    }

    #[test]
    fn test_row_view_is_ordered() {
        let table = sample();
        let row = table.row(1).unwrap();
        assert_eq!(row[0], ("age", &Value::Number(30.0)));
        assert_eq!(row[1], ("zip", &Value::from("67890")));
        assert!(table.row(3).is_none());
    }

    #[test]
    fn test_with_column_copies() {
        let table = sample();
        let replaced = table
            .with_column(Column::categorical("age", ["*", "*", "*"]).unwrap())
            .unwrap();
        assert_eq!(replaced.value(0, "age"), Some(&Value::from("*")));
        // Original untouched
        assert_eq!(table.value(0, "age"), Some(&Value::Number(25.0)));
        assert_eq!(replaced.column("age").unwrap().kind(), ColumnKind::Categorical);
    }

    #[test]
    fn test_from_rows() {
        let table = DatasetTable::from_rows(
            &[("age", ColumnKind::Numeric), ("sex", ColumnKind::Categorical)],
            vec![
                vec![Value::from(40), Value::from("F")],
                vec![Value::Null, Value::from("M")],
            ],
        )
        .unwrap();
        assert_eq!(table.row_count(), 2);
        assert!(table.value(1, "age").unwrap().is_null());
    }

    #[test]
    fn test_value_keys() {
        assert_eq!(Value::from(50.0).key(), "50");
        assert_eq!(Value::from(0.5).key(), "0.5");
        assert_eq!(Value::from(-0.0).key(), Value::from(0.0).key());
        assert_eq!(Value::from(5).key(), Value::from("5").key());
        assert_ne!(Value::Null.key(), Value::from("null").key());
    }

    #[test]
    fn test_json_roundtrip_validates() {
        let table = sample();
        let json = serde_json::to_string(&table).unwrap();
        let back: DatasetTable = serde_json::from_str(&json).unwrap();
        assert_eq!(table, back);

        let bad = r#"{"columns":[{"name":"a","kind":"numeric","values":[1,2]},{"name":"b","kind":"categorical","values":["x"]}]}"#;
        assert!(serde_json::from_str::<DatasetTable>(bad).is_err());
    }
}
