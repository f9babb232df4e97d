// In-memory tabular dataset
//
// A Table is a named, ordered set of typed columns with positionally aligned rows.
// Column types are inferred once at load time and the table is treated as immutable
// afterwards; a re-upload replaces it wholesale.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Parse a raw text cell the way a delimited-file reader would
    pub fn from_raw(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(v) = trimmed.parse::<i64>() {
            return Value::Int(v);
        }
        if trimmed.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(v) = trimmed.parse::<f64>() {
                return Value::Float(v);
            }
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Equality that treats two NaN floats as the same cell
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// Key used for join lookups; floats with integral values collapse onto ints
    pub(crate) fn join_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Float(v) if v.is_nan() => None,
            Value::Float(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Some(format!("n:{}", *v as i64)),
            Value::Int(v) => Some(format!("n:{}", v)),
            Value::Float(v) => Some(format!("f:{}", v)),
            Value::Bool(v) => Some(format!("b:{}", v)),
            Value::Text(s) => Some(format!("t:{}", s)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Inferred scalar type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Null,
    Boolean,
    Integer,
    Float,
    Text,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Infer the narrowest type holding every non-null cell
    pub fn infer(values: &[Value]) -> ColumnType {
        let mut ty = ColumnType::Null;
        for value in values {
            let cell = match value {
                Value::Null => continue,
                Value::Float(v) if v.is_nan() => continue,
                Value::Bool(_) => ColumnType::Boolean,
                Value::Int(_) => ColumnType::Integer,
                Value::Float(_) => ColumnType::Float,
                Value::Text(_) => return ColumnType::Text,
            };
            ty = match (ty, cell) {
                (ColumnType::Null, c) => c,
                (a, b) if a == b => a,
                (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                    ColumnType::Float
                }
                _ => return ColumnType::Text,
            };
        }
        ty
    }

    /// Coerce a cell to this column type
    fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Float, Value::Int(v)) => Value::Float(v as f64),
            (ColumnType::Text, Value::Text(s)) => Value::Text(s),
            (ColumnType::Text, other) => Value::Text(other.to_string()),
            (_, other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

/// Named, column-typed, row-ordered dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from untyped rows, inferring each column's type.
    ///
    /// Short rows are padded with nulls, long rows truncated, and duplicate
    /// header names are suffixed with `.1`, `.2`, ...
    pub fn from_rows(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let headers = dedupe_headers(headers);
        let width = headers.len();

        let mut rows: Vec<Vec<Value>> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();

        let mut columns = Vec::with_capacity(width);
        for (idx, header) in headers.into_iter().enumerate() {
            let cells: Vec<Value> = rows.iter().map(|r| r[idx].clone()).collect();
            let column_type = ColumnType::infer(&cells);
            for row in rows.iter_mut() {
                let cell = std::mem::replace(&mut row[idx], Value::Null);
                row[idx] = column_type.coerce(cell);
            }
            columns.push(Column { name: header, column_type });
        }

        Self { name: name.into(), columns, rows }
    }

    /// Build a table from raw text cells (delimited files).
    ///
    /// Columns that end up text-typed keep their original cell text rather than
    /// a re-rendering of the parsed value.
    pub fn from_text_rows(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let parsed: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| row.iter().map(|cell| Value::from_raw(cell)).collect())
            .collect();
        let mut table = Self::from_rows(name, headers, parsed);

        for (idx, column) in table.columns.iter().enumerate() {
            if column.column_type != ColumnType::Text {
                continue;
            }
            for (row, raw) in table.rows.iter_mut().zip(rows.iter()) {
                if let Some(cell) = raw.get(idx) {
                    if !cell.trim().is_empty() {
                        row[idx] = Value::Text(cell.clone());
                    }
                }
            }
        }
        table
    }

    /// Single-row, single-column table carrying a message under `Result`
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            name: "Result".to_string(),
            columns: vec![Column {
                name: "Result".to_string(),
                column_type: ColumnType::Text,
            }],
            rows: vec![vec![Value::Text(text.into())]],
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Copy of the rows at `indices`, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: indices.iter().filter_map(|&i| self.rows.get(i).cloned()).collect(),
        }
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Same column names, in the same order, and the same cells
    pub fn same_content(&self, other: &Table) -> bool {
        self.column_names() == other.column_names()
            && self.rows.len() == other.rows.len()
            && self
                .rows
                .iter()
                .zip(other.rows.iter())
                .all(|(a, b)| a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_as(y)))
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = serde_json::Map::new();
                for (column, cell) in self.columns.iter().zip(row.iter()) {
                    record.insert(column.name.clone(), serde_json::Value::from(cell));
                }
                serde_json::Value::Object(record)
            })
            .collect()
    }
}

fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(idx, header)| {
            let base = if header.trim().is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                header
            };
            let mut candidate = base.clone();
            let mut suffix = 1;
            while seen.contains(&candidate) {
                candidate = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_raw() {
        assert_eq!(Value::from_raw(""), Value::Null);
        assert_eq!(Value::from_raw(" 42 "), Value::Int(42));
        assert_eq!(Value::from_raw("3.5"), Value::Float(3.5));
        assert_eq!(Value::from_raw("TRUE"), Value::Bool(true));
        assert_eq!(Value::from_raw("inf"), Value::Text("inf".to_string()));
        assert_eq!(Value::from_raw("Alice"), Value::Text("Alice".to_string()));
    }

    #[test]
    fn test_column_type_inference() {
        assert_eq!(ColumnType::infer(&[Value::Null, Value::Null]), ColumnType::Null);
        assert_eq!(ColumnType::infer(&[Value::Int(1), Value::Null]), ColumnType::Integer);
        assert_eq!(ColumnType::infer(&[Value::Int(1), Value::Float(2.5)]), ColumnType::Float);
        assert_eq!(ColumnType::infer(&[Value::Int(1), Value::Bool(true)]), ColumnType::Text);
        assert_eq!(
            ColumnType::infer(&[Value::Int(1), Value::Text("x".to_string())]),
            ColumnType::Text
        );
    }

    #[test]
    fn test_from_text_rows_keeps_raw_text() {
        let table = Table::from_text_rows(
            "t",
            vec!["code".to_string(), "qty".to_string()],
            vec![
                vec!["007".to_string(), "1".to_string()],
                vec!["abc".to_string(), "2.5".to_string()],
            ],
        );
        assert_eq!(table.columns[0].column_type, ColumnType::Text);
        assert_eq!(table.rows[0][0], Value::Text("007".to_string()));
        assert_eq!(table.columns[1].column_type, ColumnType::Float);
        assert_eq!(table.rows[0][1], Value::Float(1.0));
    }

    #[test]
    fn test_duplicate_headers_and_padding() {
        let table = Table::from_rows(
            "t",
            vec!["a".to_string(), "a".to_string(), "".to_string()],
            vec![vec![Value::Int(1)]],
        );
        assert_eq!(table.column_names(), vec!["a", "a.1", "Unnamed: 2"]);
        assert_eq!(table.rows[0], vec![Value::Int(1), Value::Null, Value::Null]);
    }

    #[test]
    fn test_same_content_ignores_name_and_treats_nan_equal() {
        let a = Table::from_rows("a", vec!["x".to_string()], vec![vec![Value::Float(f64::NAN)]]);
        let b = Table::from_rows("b", vec!["x".to_string()], vec![vec![Value::Float(f64::NAN)]]);
        assert!(a.same_content(&b));
        assert!(!a.same_content(&Table::message("x")));
    }

    #[test]
    fn test_message_table_shape() {
        let table = Table::message("hello");
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column_names(), vec!["Result"]);
    }

    #[test]
    fn test_to_records() {
        let table = Table::from_rows(
            "t",
            vec!["id".to_string(), "name".to_string()],
            vec![vec![Value::Int(1), Value::Text("Alice".to_string())]],
        );
        let records = table.to_records();
        assert_eq!(records[0]["id"], 1);
        assert_eq!(records[0]["name"], "Alice");
    }
}
