use chrono::NaiveDate;
use pfin_core::ParsedRecord;

use crate::detect::{Format, MIN_SNIFF_WINDOW};
use crate::rules::Classifier;

/// Everything a parser needs besides the bytes themselves.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub classifier: &'a Classifier,
    /// Substituted for dates that are missing or unreadable.
    pub today: NaiveDate,
    /// Bytes inspected when the filename does not reveal the format.
    pub sniff_window: usize,
}

impl<'a> ParseContext<'a> {
    pub fn new(classifier: &'a Classifier, today: NaiveDate) -> Self {
        Self {
            classifier,
            today,
            sniff_window: MIN_SNIFF_WINDOW,
        }
    }

    pub fn with_sniff_window(mut self, bytes: usize) -> Self {
        self.sniff_window = bytes.max(MIN_SNIFF_WINDOW);
        self
    }
}

/// Parser output: the classified records plus what was dropped on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseReport {
    pub format: Format,
    pub records: Vec<ParsedRecord>,
    /// Rows or transaction blocks dropped because their amount did not parse.
    pub skipped: usize,
}

impl ParseReport {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            records: Vec::new(),
            skipped: 0,
        }
    }

    /// Records whose date was substituted with the processing date.
    pub fn repaired_dates(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.date_origin.is_substituted())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
