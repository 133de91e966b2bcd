//! In-memory tabular data passed between sources and the database session.
use crate::core::{Result, TabloadError};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts a JSON cell. Nested arrays and objects are kept as JSON text.
    fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Real).unwrap_or(Value::Null),
            },
            JsonValue::String(s) => Value::Text(s),
            nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => Value::Text(nested.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(t) => write!(f, "{}", t),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An ordered set of named columns and the rows under them.
///
/// Every row holds exactly one value per column; constructors enforce this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Builds a dataset, rejecting rows whose width differs from the header.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(TabloadError::Dataset(format!(
                "row {} has {} values but there are {} columns",
                index,
                row.len(),
                columns.len()
            )));
        }
        Ok(Dataset { columns, rows })
    }

    /// A dataset with columns and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Dataset {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns the values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let index = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Projects the dataset onto `names`, in that order.
    ///
    /// Unknown names fail with `TabloadError::Column`. Row order is kept.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Dataset> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Dataset {
            columns: names.iter().map(|n| n.as_ref().to_string()).collect(),
            rows,
        })
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }

    /// Shapes a decoded JSON document into a dataset.
    ///
    /// Accepted layouts:
    /// - an array of objects (records); columns in first-seen key order,
    ///   absent keys become `Null`
    /// - an object of equally long arrays (one column per key)
    /// - an array of arrays; columns are named by position
    pub fn from_json(document: JsonValue) -> Result<Dataset> {
        match document {
            JsonValue::Array(items) => Self::from_json_array(items),
            JsonValue::Object(map) => Self::from_json_columns(map),
            other => Err(TabloadError::Dataset(format!(
                "expected a JSON array or object, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn from_json_array(items: Vec<JsonValue>) -> Result<Dataset> {
        if items.iter().all(JsonValue::is_object) {
            let mut columns: Vec<String> = Vec::new();
            for item in &items {
                if let JsonValue::Object(map) = item {
                    for key in map.keys() {
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
            }

            let rows = items
                .into_iter()
                .map(|item| {
                    let mut map = match item {
                        JsonValue::Object(map) => map,
                        _ => Map::new(),
                    };
                    columns
                        .iter()
                        .map(|c| map.remove(c).map(Value::from_json).unwrap_or(Value::Null))
                        .collect()
                })
                .collect();
            return Dataset::new(columns, rows);
        }

        if items.iter().all(JsonValue::is_array) {
            let width = items
                .iter()
                .filter_map(JsonValue::as_array)
                .map(Vec::len)
                .max()
                .unwrap_or(0);
            let columns = (0..width).map(|i| i.to_string()).collect();
            let rows = items
                .into_iter()
                .map(|item| {
                    let mut values: Vec<Value> = match item {
                        JsonValue::Array(values) => values.into_iter().map(Value::from_json).collect(),
                        _ => Vec::new(),
                    };
                    values.resize(width, Value::Null);
                    values
                })
                .collect();
            return Dataset::new(columns, rows);
        }

        Err(TabloadError::Dataset(
            "a JSON array must hold only objects or only arrays".to_string(),
        ))
    }

    fn from_json_columns(map: Map<String, JsonValue>) -> Result<Dataset> {
        let mut columns = Vec::with_capacity(map.len());
        let mut values: Vec<Vec<JsonValue>> = Vec::with_capacity(map.len());
        for (key, value) in map {
            match value {
                JsonValue::Array(cells) => {
                    columns.push(key);
                    values.push(cells);
                }
                other => {
                    return Err(TabloadError::Dataset(format!(
                        "column '{}' holds a {} instead of an array",
                        key,
                        json_kind(&other)
                    )))
                }
            }
        }

        let height = values.first().map(Vec::len).unwrap_or(0);
        if let Some(pos) = values.iter().position(|cells| cells.len() != height) {
            return Err(TabloadError::Dataset(format!(
                "column '{}' has {} values, expected {}",
                columns[pos],
                values[pos].len(),
                height
            )));
        }

        let mut rows: Vec<Vec<Value>> = (0..height)
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        for cells in values {
            for (row, cell) in rows.iter_mut().zip(cells) {
                row.push(Value::from_json(cell));
            }
        }
        Dataset::new(columns, rows)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            TabloadError::Column(format!(
                "column '{}' not found (available: {})",
                name,
                self.columns.join(", ")
            ))
        })
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Dataset {
        Dataset::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
                vec![Value::Integer(4), Value::Integer(5), Value::Integer(6)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let result = Dataset::new(vec!["a".into()], vec![vec![Value::Integer(1), Value::Integer(2)]]);
        assert!(matches!(result, Err(TabloadError::Dataset(_))));
    }

    #[test]
    fn test_select_reorders_columns() {
        let projected = sample().select(&["c", "a"]).unwrap();
        assert_eq!(projected.columns(), &["c", "a"]);
        assert_eq!(projected.rows()[0], vec![Value::Integer(3), Value::Integer(1)]);
        assert_eq!(projected.rows()[1], vec![Value::Integer(6), Value::Integer(4)]);
    }

    #[test]
    fn test_select_missing_column() {
        match sample().select(&["a", "zzz"]) {
            Err(TabloadError::Column(msg)) => assert!(msg.contains("zzz")),
            other => panic!("Expected Column error, got {:?}", other),
        }
    }

    #[test]
    fn test_column_values() {
        let data = sample();
        let b = data.column("b").unwrap();
        assert_eq!(b, vec![&Value::Integer(2), &Value::Integer(5)]);
    }

    #[test]
    fn test_from_json_records() {
        let data = Dataset::from_json(json!([
            {"date": "2020-03-01", "cases": 2},
            {"date": "2020-03-02", "cases": 3.5, "deaths": 0}
        ]))
        .unwrap();

        assert_eq!(data.columns(), &["date", "cases", "deaths"]);
        assert_eq!(data.len(), 2);
        assert_eq!(data.rows()[0][2], Value::Null);
        assert_eq!(data.rows()[1][1], Value::Real(3.5));
    }

    #[test]
    fn test_from_json_columns() {
        let data = Dataset::from_json(json!({
            "code": ["BR", "AR"],
            "population": [211, 45]
        }))
        .unwrap();

        assert_eq!(data.columns(), &["code", "population"]);
        assert_eq!(data.rows()[1], vec![Value::from("AR"), Value::Integer(45)]);
    }

    #[test]
    fn test_from_json_columns_length_mismatch() {
        let result = Dataset::from_json(json!({"a": [1, 2], "b": [1]}));
        assert!(matches!(result, Err(TabloadError::Dataset(_))));
    }

    #[test]
    fn test_from_json_scalars_rejected() {
        assert!(Dataset::from_json(json!({"a": 1, "b": 2})).is_err());
        assert!(Dataset::from_json(json!(42)).is_err());
        assert!(Dataset::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_from_json_array_of_arrays() {
        let data = Dataset::from_json(json!([[1, "x"], [2]])).unwrap();
        assert_eq!(data.columns(), &["0", "1"]);
        assert_eq!(data.rows()[1], vec![Value::Integer(2), Value::Null]);
    }

    #[test]
    fn test_nested_json_kept_as_text() {
        let data = Dataset::from_json(json!([{"meta": {"k": 1}}])).unwrap();
        assert_eq!(data.rows()[0][0], Value::Text("{\"k\":1}".to_string()));
    }
}
