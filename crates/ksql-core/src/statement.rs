//! The statement contract shared by every builder.
//!
//! A statement knows its SQL text (with `?` placeholders) and the values to
//! bind to those placeholders. Executors only ever see this pair.

use crate::value::{SqlValue, ToSqlValue};

/// Anything that can be sent to the database.
pub trait Statement: Send + Sync {
    /// Returns the SQL text, using `?` for bound parameters.
    fn prepare(&self) -> String;

    /// Returns the values bound to the placeholders, in order.
    fn binds(&self) -> Vec<SqlValue>;
}

/// A plain SQL statement with positional binds.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    sql: String,
    binds: Vec<SqlValue>,
}

impl Query {
    /// Creates a statement from SQL text.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    /// Appends a bound value.
    #[must_use]
    pub fn bind(mut self, value: impl ToSqlValue) -> Self {
        self.binds.push(value.to_sql_value());
        self
    }
}

impl Statement for Query {
    fn prepare(&self) -> String {
        self.sql.clone()
    }

    fn binds(&self) -> Vec<SqlValue> {
        self.binds.clone()
    }
}

/// Renders a statement as standalone SQL with its binds inlined.
///
/// Placeholders inside quoted literals are left alone. Surplus placeholders
/// (more `?` than binds) are kept verbatim.
#[must_use]
pub fn render_inline(statement: &dyn Statement) -> String {
    let sql = statement.prepare();
    let mut binds = statement.binds().into_iter();
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;

    for ch in sql.chars() {
        match quote {
            Some(q) => {
                out.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    out.push(ch);
                }
                '?' => match binds.next() {
                    Some(value) => out.push_str(&value.to_sql_inline()),
                    None => out.push('?'),
                },
                _ => out.push(ch),
            },
        }
    }
    out
}
