//! CSV file source.
//!
//! The header row names the columns. Cells are typed per column: a column
//! becomes integers, reals or booleans only if every non-null cell parses as
//! that type, otherwise it stays text.
use crate::core::Result;
use crate::dataset::{Dataset, Value};
use ::csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Cell contents read as NULL
pub const DEFAULT_NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NULL", "null", "NaN", "nan"];

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub null_tokens: Vec<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            null_tokens: DEFAULT_NULL_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CsvOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn is_null(&self, cell: &str) -> bool {
        self.null_tokens.iter().any(|t| t == cell)
    }
}

/// Reads `path` with default options; see [`read_with_options`].
pub fn read<P: AsRef<Path>, S: AsRef<str>>(path: P, column_filter: &[S]) -> Result<Dataset> {
    read_with_options(path, column_filter, &CsvOptions::default())
}

/// Reads `path` into a dataset.
///
/// A non-empty `column_filter` keeps exactly those columns in filter order and
/// fails with `TabloadError::Column` on a name the file does not have. An
/// empty filter keeps every column in file order.
pub fn read_with_options<P: AsRef<Path>, S: AsRef<str>>(
    path: P,
    column_filter: &[S],
    options: &CsvOptions,
) -> Result<Dataset> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .from_path(path)?;

    let columns = dedupe_headers(reader.headers()?.iter());
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); columns.len()];
    for record in reader.records() {
        let record = record?;
        for (column, cell) in cells.iter_mut().zip(record.iter()) {
            column.push(if options.is_null(cell) {
                None
            } else {
                Some(cell.to_string())
            });
        }
    }

    let height = cells.first().map(Vec::len).unwrap_or(0);
    let typed: Vec<Vec<Value>> = cells.into_iter().map(infer_column).collect();
    let mut rows: Vec<Vec<Value>> = (0..height).map(|_| Vec::with_capacity(columns.len())).collect();
    for column in typed {
        for (row, value) in rows.iter_mut().zip(column) {
            row.push(value);
        }
    }

    let dataset = Dataset::new(columns, rows)?;
    debug!(path = %path.display(), rows = dataset.len(), columns = dataset.column_count(), "parsed CSV");

    let dataset = if column_filter.is_empty() {
        dataset
    } else {
        dataset.select(column_filter)?
    };
    info!(path = %path.display(), rows = dataset.len(), "loaded CSV file");
    Ok(dataset)
}

/// Renames repeated headers `a, a` to `a, a.1`
fn dedupe_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut columns: Vec<String> = Vec::new();
    for header in headers {
        let mut name = header.to_string();
        while columns.contains(&name) {
            let n = seen.entry(header.to_string()).or_insert(0);
            *n += 1;
            name = format!("{}.{}", header, n);
        }
        columns.push(name);
    }
    columns
}

/// Types a whole column from its raw cells
fn infer_column(cells: Vec<Option<String>>) -> Vec<Value> {
    let present = || cells.iter().flatten();

    if present().all(|c| c.parse::<i64>().is_ok()) {
        return cells
            .iter()
            .map(|c| c.as_deref().and_then(|c| c.parse().ok()).map(Value::Integer).unwrap_or(Value::Null))
            .collect();
    }
    if present().all(|c| c.parse::<f64>().is_ok()) {
        return cells
            .iter()
            .map(|c| c.as_deref().and_then(|c| c.parse().ok()).map(Value::Real).unwrap_or(Value::Null))
            .collect();
    }
    if present().all(|c| parse_bool(c).is_some()) {
        return cells
            .iter()
            .map(|c| c.as_deref().and_then(parse_bool).map(Value::Bool).unwrap_or(Value::Null))
            .collect();
    }
    cells.into_iter().map(Value::from).collect()
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TabloadError;
    use crate::test_utils::write_csv;

    #[test]
    fn test_filter_reorders_columns() {
        let file = write_csv("a,b,c\n1,2,3\n");
        let data = read(file.path(), &["b", "a"]).unwrap();
        assert_eq!(data.columns(), &["b", "a"]);
        assert_eq!(data.rows(), &[vec![Value::Integer(2), Value::Integer(1)]]);
    }

    #[test]
    fn test_empty_filter_keeps_file_order() {
        let file = write_csv("a,b,c\n1,2,3\n");
        let data = read::<_, &str>(file.path(), &[]).unwrap();
        assert_eq!(data.columns(), &["a", "b", "c"]);
    }

    #[test]
    fn test_missing_filter_column() {
        let file = write_csv("a,b\n1,2\n");
        let result = read(file.path(), &["a", "nope"]);
        assert!(matches!(result, Err(TabloadError::Column(_))));
    }

    #[test]
    fn test_column_types_are_inferred() {
        let file = write_csv(
            "nome,cpf,peso,ativo,dt_nascimento\n\
             Ana,123,61.5,true,1990-01-02\n\
             Rui,,70,FALSE,NA\n",
        );
        let data = read::<_, &str>(file.path(), &[]).unwrap();
        assert_eq!(
            data.rows()[0],
            vec![
                Value::from("Ana"),
                Value::Integer(123),
                Value::Real(61.5),
                Value::Bool(true),
                Value::from("1990-01-02"),
            ]
        );
        assert_eq!(
            data.rows()[1],
            vec![
                Value::from("Rui"),
                Value::Null,
                Value::Real(70.0),
                Value::Bool(false),
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_mixed_column_stays_text() {
        let file = write_csv("code\n1\nx\n");
        let data = read::<_, &str>(file.path(), &[]).unwrap();
        assert_eq!(data.rows()[0][0], Value::from("1"));
    }

    #[test]
    fn test_duplicate_headers_are_renamed() {
        let file = write_csv("a,a,b\n1,2,3\n");
        let data = read::<_, &str>(file.path(), &[]).unwrap();
        assert_eq!(data.columns(), &["a", "a.1", "b"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let file = write_csv("a;b\n1;2\n");
        let options = CsvOptions::default().with_delimiter(b';');
        let data = read_with_options::<_, &str>(file.path(), &[], &options).unwrap();
        assert_eq!(data.columns(), &["a", "b"]);
    }

    #[test]
    fn test_missing_file() {
        let result = read::<_, &str>("/nonexistent/file.csv", &[]);
        assert!(matches!(result, Err(TabloadError::Csv(_))));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let file = write_csv("a,b\n1,2\n3\n");
        let result = read::<_, &str>(file.path(), &[]);
        assert!(matches!(result, Err(TabloadError::Csv(_))));
    }
}
