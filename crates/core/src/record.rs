use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;

/// Where a record's date came from.
///
/// Statements sometimes carry no usable date. Those records are still
/// imported with the processing date, and this marker keeps that visible so
/// a caller can review them instead of trusting the substituted date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrigin {
    #[default]
    Parsed,
    /// The source had no date at all.
    Missing,
    /// The source had a date in none of the recognized layouts.
    Unparseable,
}

impl DateOrigin {
    pub fn is_substituted(self) -> bool {
        !matches!(self, DateOrigin::Parsed)
    }
}

impl fmt::Display for DateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateOrigin::Parsed => write!(f, "parsed"),
            DateOrigin::Missing => write!(f, "missing"),
            DateOrigin::Unparseable => write!(f, "unparseable"),
        }
    }
}

/// One normalized statement line, before storage assigns it an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub amount: Money,
    pub description: String,
    pub date: NaiveDate,
    /// Empty until classified.
    pub category: String,
    pub date_origin: DateOrigin,
}

impl ParsedRecord {
    pub fn new(amount: Money, description: impl Into<String>, date: NaiveDate) -> Self {
        ParsedRecord {
            amount,
            description: description.into(),
            date,
            category: String::new(),
            date_origin: DateOrigin::Parsed,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_date_origin(mut self, origin: DateOrigin) -> Self {
        self.date_origin = origin;
        self
    }

    pub fn is_categorized(&self) -> bool {
        !self.category.trim().is_empty()
    }
}
