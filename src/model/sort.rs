use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use crate::client::Counter;

static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([+-]?\d+)").expect("valid count pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnId {
    Context,
    Name,
    Value,
    Actions,
}

impl ColumnId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnId::Context => "context",
            ColumnId::Name => "name",
            ColumnId::Value => "value",
            ColumnId::Actions => "actions",
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortCriteria {
    pub column: ColumnId,
    pub ascending: bool,
}

impl SortCriteria {
    pub fn new(column: ColumnId, ascending: bool) -> Self {
        Self { column, ascending }
    }
}

impl Default for SortCriteria {
    fn default() -> Self {
        Self::new(ColumnId::Context, true)
    }
}

/// Parses a count formatted with `,` thousands separators, such as `1,024`.
///
/// Commas are dropped wherever they are, then the leading integer is read and
/// the rest ignored, so `12 345` is 12. Anything that does not start with a
/// number counts as 0.
pub fn parse_count(value: Option<&str>) -> i64 {
    let Some(value) = value else {
        return 0;
    };
    let value = value.replace(',', "");
    COUNT
        .captures(&value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(0)
}

/// Orders two counters by the given column, ascending.
pub fn compare(a: &Counter, b: &Counter, column: ColumnId) -> Ordering {
    if column == ColumnId::Value {
        let a_count = parse_count(a.value.as_deref());
        let b_count = parse_count(b.value.as_deref());
        a_count.cmp(&b_count)
    } else {
        let a_string = a.column_value(column).unwrap_or("");
        let b_string = b.column_value(column).unwrap_or("");
        a_string.cmp(b_string)
    }
}

pub fn sort_counters(rows: &mut [Counter], criteria: SortCriteria) {
    rows.sort_by(|a, b| {
        let ord = compare(a, b, criteria.column);
        if criteria.ascending { ord } else { ord.reverse() }
    });
}
