use chrono::{Local, NaiveDate};
use pfin_core::{DateRange, Money, ParsedRecord};
use std::convert::Infallible;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

use crate::config::ImportConfig;
use crate::context::{ParseContext, ParseReport};
use crate::detect::{detect_and_parse, Format, MIN_SNIFF_WINDOW};
use crate::error::{ImportError, Result};
use crate::rules::Classifier;

/// Storage collaborator that receives parsed records.
///
/// An import calls `begin`, then `append` once per record in file order, then
/// `commit`. If any `append` fails the import calls `rollback` instead and
/// nothing from that file should remain visible.
pub trait TransactionSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn begin(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    fn append(&mut self, record: &ParsedRecord) -> std::result::Result<(), Self::Error>;

    fn commit(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    fn rollback(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// In-memory sink. Appended records are staged until `commit`.
#[derive(Debug, Default)]
pub struct MemorySink {
    committed: Vec<ParsedRecord>,
    staged: Vec<ParsedRecord>,
    appends: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed records, oldest first.
    pub fn records(&self) -> &[ParsedRecord] {
        &self.committed
    }

    pub fn into_records(self) -> Vec<ParsedRecord> {
        self.committed
    }

    /// Total `append` calls received, committed or not.
    pub fn append_calls(&self) -> usize {
        self.appends
    }
}

impl TransactionSink for MemorySink {
    type Error = Infallible;

    fn begin(&mut self) -> std::result::Result<(), Infallible> {
        self.staged.clear();
        Ok(())
    }

    fn append(&mut self, record: &ParsedRecord) -> std::result::Result<(), Infallible> {
        self.appends += 1;
        self.staged.push(record.clone());
        Ok(())
    }

    fn commit(&mut self) -> std::result::Result<(), Infallible> {
        self.committed.append(&mut self.staged);
        Ok(())
    }

    fn rollback(&mut self) -> std::result::Result<(), Infallible> {
        self.staged.clear();
        Ok(())
    }
}

/// Outcome of one successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub format: Format,
    pub stored: usize,
    pub skipped: usize,
    pub repaired_dates: usize,
    /// Dates spanned by the stored records.
    pub date_range: Option<DateRange>,
    /// Sum of the stored amounts.
    pub net_amount: Money,
}

impl ImportSummary {
    fn from_report(report: &ParseReport) -> Self {
        ImportSummary {
            format: report.format,
            stored: 0,
            skipped: report.skipped,
            repaired_dates: report.repaired_dates(),
            date_range: DateRange::spanning(report.records.iter().map(|r| r.date)),
            net_amount: report.records.iter().map(|r| r.amount).sum(),
        }
    }

    pub fn nothing_parsed(&self) -> bool {
        self.stored == 0
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nothing_parsed() {
            return write!(f, "no transactions parsed ({}, {} skipped)", self.format, self.skipped);
        }
        write!(
            f,
            "imported {} {} transactions, net {}",
            self.stored, self.format, self.net_amount
        )?;
        if let Some(range) = self.date_range {
            write!(f, ", {range}")?;
        }
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.repaired_dates > 0 {
            write!(f, ", {} dated today", self.repaired_dates)?;
        }
        Ok(())
    }
}

/// Detects, parses, classifies and stores one statement file at a time.
#[derive(Debug, Clone)]
pub struct ImportPipeline {
    classifier: Classifier,
    sniff_window: usize,
    today: Option<NaiveDate>,
}

impl Default for ImportPipeline {
    fn default() -> Self {
        Self {
            classifier: Classifier::default(),
            sniff_window: MIN_SNIFF_WINDOW,
            today: None,
        }
    }
}

impl ImportPipeline {
    pub fn new(config: &ImportConfig) -> Result<Self> {
        Ok(Self {
            classifier: config.build_classifier()?,
            sniff_window: config.sniff_window(),
            today: None,
        })
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Fixes the date substituted for undated records. Defaults to the local date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    fn context(&self) -> ParseContext<'_> {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        ParseContext::new(&self.classifier, today).with_sniff_window(self.sniff_window)
    }

    /// Detects and parses `reader` without storing anything.
    pub fn parse<R: Read>(&self, reader: R, filename: &str) -> Result<ParseReport> {
        detect_and_parse(reader, filename, &self.context())
    }

    /// Parses `reader` and hands every record to `sink` as one unit.
    pub fn import<R, S>(&self, reader: R, filename: &str, sink: &mut S) -> Result<ImportSummary>
    where
        R: Read,
        S: TransactionSink + ?Sized,
    {
        info!(filename, "importing statement");
        let report = self.parse(reader, filename)?;
        let mut summary = ImportSummary::from_report(&report);

        if report.is_empty() {
            info!(filename, format = %report.format, skipped = report.skipped, "no transactions parsed");
            return Ok(summary);
        }
        if summary.repaired_dates > 0 {
            warn!(
                filename,
                repaired = summary.repaired_dates,
                "records without a usable date were given the processing date"
            );
        }

        store_all(sink, &report.records)?;
        summary.stored = report.records.len();
        info!(
            filename,
            format = %summary.format,
            stored = summary.stored,
            skipped = summary.skipped,
            "import complete"
        );
        Ok(summary)
    }

    /// Opens `path` and imports it, using the path as the filename hint.
    pub fn import_path<S>(&self, path: &Path, sink: &mut S) -> Result<ImportSummary>
    where
        S: TransactionSink + ?Sized,
    {
        let file = File::open(path)?;
        self.import(BufReader::new(file), &path.to_string_lossy(), sink)
    }
}

fn store_all<S>(sink: &mut S, records: &[ParsedRecord]) -> Result<()>
where
    S: TransactionSink + ?Sized,
{
    sink.begin().map_err(|e| ImportError::Storage(Box::new(e)))?;

    for (index, record) in records.iter().enumerate() {
        if let Err(source) = sink.append(record) {
            rollback(sink);
            return Err(ImportError::StorageRejected {
                index,
                source: Box::new(source),
            });
        }
    }

    if let Err(e) = sink.commit() {
        rollback(sink);
        return Err(ImportError::Storage(Box::new(e)));
    }
    Ok(())
}

fn rollback<S: TransactionSink + ?Sized>(sink: &mut S) {
    if let Err(e) = sink.rollback() {
        warn!(error = %e, "rollback failed");
    }
}
