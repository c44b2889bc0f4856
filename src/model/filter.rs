use regex::{Regex, RegexBuilder};
use std::fmt;
use tracing::trace;

use crate::client::Counter;

/// Field of a counter the filter text is matched against.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    #[default]
    Name,
    Context,
}

impl FilterField {
    pub fn label(&self) -> &'static str {
        match self {
            FilterField::Name => "by name",
            FilterField::Context => "by context",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            FilterField::Name => FilterField::Context,
            FilterField::Context => FilterField::Name,
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    pub search_string: String,
    pub property: FilterField,
}

impl FilterCriteria {
    pub fn new(search_string: impl Into<String>, property: FilterField) -> Self {
        Self {
            search_string: search_string.into(),
            property,
        }
    }
}

/// Filter criteria with the search string compiled once.
///
/// The search string is taken as a case insensitive regular expression and is
/// NOT escaped: `a.c` matches `abc`. A pattern that does not compile matches no
/// row at all, so the table is empty while a pattern is typed half way.
pub enum CompiledFilter {
    All,
    Pattern(Regex, FilterField),
    Invalid,
}

impl CompiledFilter {
    pub fn compile(criteria: &FilterCriteria) -> Self {
        if criteria.search_string.is_empty() {
            return CompiledFilter::All;
        }
        match RegexBuilder::new(&criteria.search_string)
            .case_insensitive(true)
            .build()
        {
            Ok(re) => CompiledFilter::Pattern(re, criteria.property),
            Err(e) => {
                trace!("Invalid filter pattern {:?}: {e}", criteria.search_string);
                CompiledFilter::Invalid
            }
        }
    }

    pub fn matches(&self, row: &Counter) -> bool {
        match self {
            CompiledFilter::All => true,
            CompiledFilter::Invalid => false,
            CompiledFilter::Pattern(re, field) => re.is_match(row.filter_value(*field)),
        }
    }
}

pub fn matches(row: &Counter, criteria: &FilterCriteria) -> bool {
    CompiledFilter::compile(criteria).matches(row)
}
