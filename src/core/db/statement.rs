/// Statement Generation Module
///
/// Builds the two statements a load issues, `CREATE TABLE IF NOT EXISTS` and
/// multi-row `INSERT`, from caller-supplied names. Table names are tokenized
/// and validated before they reach SQL text. Column names that are plain
/// identifiers are emitted bare so the server folds them like table names;
/// anything else is quoted.

use crate::core::{Result, TabloadError};
use crate::dataset::Value;
use postgres_protocol::escape::{escape_identifier, escape_literal};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::ALL_KEYWORDS;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::fmt;
use tracing::warn;

/// SQL flavour a statement is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// Values are inlined as escaped literals and coerced by the server
    Postgres,
    /// Values are bound as positional parameters
    Sqlite,
}

impl SqlDialect {
    /// Quotes an identifier so any characters survive verbatim
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            SqlDialect::Postgres => escape_identifier(ident),
            SqlDialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Renders a column name the way a bare identifier would be resolved.
    ///
    /// Plain identifiers (`nome`, `Nome`, `dt_2020`) are emitted as written.
    /// Plain identifiers that collide with a keyword are quoted in their
    /// folded lowercase form, which names the same column. Everything else
    /// (spaces, punctuation, leading digits) is quoted verbatim.
    pub fn column_ident(&self, name: &str) -> String {
        if !is_plain_identifier(name) {
            return self.quote_ident(name);
        }
        let upper = name.to_ascii_uppercase();
        if ALL_KEYWORDS.binary_search(&upper.as_str()).is_ok() {
            self.quote_ident(&name.to_ascii_lowercase())
        } else {
            name.to_string()
        }
    }

    /// Most bound parameters one statement may carry
    pub fn max_bind_params(&self) -> Option<usize> {
        match self {
            SqlDialect::Postgres => None,
            SqlDialect::Sqlite => Some(SQLITE_MAX_VARIABLES),
        }
    }
}

/// Highest `?N` the bundled SQLite accepts
pub const SQLITE_MAX_VARIABLES: usize = 32766;

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Rows per INSERT for `column_count` columns, never exceeding the dialect's
/// parameter limit and never below one.
pub fn rows_per_statement(dialect: SqlDialect, page_size: usize, column_count: usize) -> usize {
    let page_size = page_size.max(1);
    match dialect.max_bind_params() {
        Some(limit) if column_count > 0 => page_size.min(limit / column_count).max(1),
        _ => page_size,
    }
}

/// One part of a possibly schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    /// Identifier text without quotes
    pub value: String,
    /// Whether the identifier was written in double quotes
    pub quoted: bool,
}

/// A validated table name such as `staging.patients` or `"Raw Data".t1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    parts: Vec<Ident>,
}

impl TableName {
    /// Parses `ident(.ident)*`, where each ident is bare or double-quoted.
    ///
    /// Bare identifiers are kept as written so the server applies its usual
    /// case folding; anything other than identifiers and dots is rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let dialect = PostgreSqlDialect {};
        let tokens = Tokenizer::new(&dialect, input)
            .tokenize()
            .map_err(|e| TabloadError::Identifier(format!("'{}': {}", input, e.message)))?;

        let mut parts = Vec::new();
        let mut expect_ident = true;
        for token in tokens {
            match token {
                Token::Whitespace(_) => {
                    return Err(TabloadError::Identifier(format!(
                        "'{}': whitespace is only allowed inside quoted identifiers",
                        input
                    )))
                }
                Token::Word(word) if expect_ident => {
                    match word.quote_style {
                        None | Some('"') => {}
                        Some(q) => {
                            return Err(TabloadError::Identifier(format!(
                                "'{}': unsupported quote character {}",
                                input, q
                            )))
                        }
                    }
                    parts.push(Ident {
                        value: word.value,
                        quoted: word.quote_style.is_some(),
                    });
                    expect_ident = false;
                }
                Token::Period if !expect_ident => expect_ident = true,
                other => {
                    return Err(TabloadError::Identifier(format!(
                        "'{}': unexpected token {:?}",
                        input, other
                    )))
                }
            }
        }

        if parts.is_empty() || expect_ident {
            return Err(TabloadError::Identifier(format!(
                "'{}' is not a table name",
                input
            )));
        }
        Ok(TableName { parts })
    }

    pub fn parts(&self) -> &[Ident] {
        &self.parts
    }

    /// The unqualified table name
    pub fn table(&self) -> &str {
        // parse() guarantees at least one part
        self.parts.last().map(|p| p.value.as_str()).unwrap_or_default()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            if part.quoted {
                write!(f, "\"{}\"", part.value.replace('"', "\"\""))?;
            } else {
                write!(f, "{}", part.value)?;
            }
        }
        Ok(())
    }
}

/// Builds `CREATE TABLE IF NOT EXISTS` pairing columns with types by position.
///
/// Type declarations are emitted verbatim. Pairing stops at the shorter of
/// the two lists, so a short type list yields a table with fewer columns.
pub fn create_table_sql<S: AsRef<str>>(
    dialect: SqlDialect,
    table: &TableName,
    columns: &[String],
    column_types: &[S],
) -> String {
    if columns.len() != column_types.len() {
        warn!(
            table = %table,
            columns = columns.len(),
            types = column_types.len(),
            "column/type count mismatch; extra entries are ignored"
        );
    }

    let definitions = columns
        .iter()
        .zip(column_types)
        .map(|(column, ty)| format!("{} {}", dialect.column_ident(column), ty.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE IF NOT EXISTS {} ({})", table, definitions)
}

/// A rendered INSERT and the values to bind to it (empty for inlined literals)
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Builds one multi-row INSERT covering `rows`, in order.
pub fn insert_sql(
    dialect: SqlDialect,
    table: &TableName,
    columns: &[String],
    rows: &[Vec<Value>],
) -> InsertStatement {
    let column_list = columns
        .iter()
        .map(|c| dialect.column_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut params = Vec::new();
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let rendered = match dialect {
            SqlDialect::Postgres => row.iter().map(pg_literal).collect::<Vec<_>>(),
            SqlDialect::Sqlite => row
                .iter()
                .map(|value| {
                    params.push(value.clone());
                    format!("?{}", params.len())
                })
                .collect(),
        };
        tuples.push(format!("({})", rendered.join(", ")));
    }

    InsertStatement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            column_list,
            tuples.join(", ")
        ),
        params,
    }
}

/// Renders a value as a PostgreSQL literal
pub fn pg_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) if r.is_nan() => "'NaN'".to_string(),
        Value::Real(r) if r.is_infinite() => {
            if *r > 0.0 {
                "'Infinity'".to_string()
            } else {
                "'-Infinity'".to_string()
            }
        }
        Value::Real(r) => format!("{:?}", r),
        Value::Text(t) => escape_literal(t),
    }
}
