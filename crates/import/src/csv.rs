//! Header-driven CSV statement parser.
//!
//! Row 0 is always a header. Its cells are matched against role synonyms to
//! find the date, amount, description and category columns; roles the header
//! does not name fall back to fixed positions.

use csv::{ByteRecord, ReaderBuilder, Trim};
use pfin_core::{Money, ParsedRecord};
use std::borrow::Cow;
use std::io::Read;
use tracing::{debug, warn};

use crate::context::{ParseContext, ParseReport};
use crate::detect::Format;
use crate::error::Result;
use crate::util::{parse_statement_date, resolve_date};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column index of each logical field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub date: Option<usize>,
    pub amount: Option<usize>,
    pub description: Option<usize>,
    pub category: Option<usize>,
}

impl ColumnRoles {
    /// Resolves roles from header cells. A later cell naming the same role
    /// replaces an earlier one. Date, amount and description fall back to
    /// columns 0, 1 and 2 when unnamed and the header is wide enough;
    /// category has no fallback.
    pub fn from_header<'h, I>(header: I) -> Self
    where
        I: IntoIterator<Item = &'h str>,
    {
        let mut roles = ColumnRoles::default();
        let mut width = 0;

        for (idx, cell) in header.into_iter().enumerate() {
            width = idx + 1;
            match cell.trim().to_lowercase().as_str() {
                "date" | "dt" => roles.date = Some(idx),
                "amount" | "amt" | "value" => roles.amount = Some(idx),
                "description" | "desc" | "name" | "memo" => roles.description = Some(idx),
                "category" | "cat" => roles.category = Some(idx),
                _ => {}
            }
        }

        if roles.date.is_none() && width >= 1 {
            roles.date = Some(0);
        }
        if roles.amount.is_none() && width >= 2 {
            roles.amount = Some(1);
        }
        if roles.description.is_none() && width >= 3 {
            roles.description = Some(2);
        }
        roles
    }

    fn field<'r>(&self, row: &'r ByteRecord, idx: Option<usize>) -> Cow<'r, str> {
        match idx.and_then(|i| row.get(i)) {
            Some(bytes) => String::from_utf8_lossy(bytes),
            None => Cow::Borrowed(""),
        }
    }

    /// Builds a record from one data row, or `None` when its amount is unusable.
    fn record(&self, row: &ByteRecord, ctx: &ParseContext<'_>) -> Option<ParsedRecord> {
        let amount: Money = self.field(row, self.amount).parse().ok()?;
        let date_text = self.field(row, self.date);
        let (date, origin) = resolve_date(Some(&*date_text), ctx.today, parse_statement_date);

        Some(
            ParsedRecord::new(amount, self.field(row, self.description).trim(), date)
                .with_category(self.field(row, self.category).trim())
                .with_date_origin(origin),
        )
    }
}

/// Reads the whole of `reader` and parses it as CSV.
pub fn parse<R: Read>(mut reader: R, ctx: &ParseContext<'_>) -> Result<ParseReport> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    parse_bytes(&data, ctx)
}

/// Drops spaces and tabs at the start of every unquoted field, so a quote
/// that follows `, ` still opens a quoted field.
fn trim_leading_space(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut in_quotes = false;
    let mut field_start = true;

    for &b in data {
        if field_start && matches!(b, b' ' | b'\t') {
            continue;
        }
        field_start = false;
        match b {
            b'"' => in_quotes = !in_quotes,
            b',' | b'\n' | b'\r' if !in_quotes => field_start = true,
            _ => {}
        }
        out.push(b);
    }
    out
}

pub fn parse_bytes(data: &[u8], ctx: &ParseContext<'_>) -> Result<ParseReport> {
    let data = trim_leading_space(data.strip_prefix(UTF8_BOM).unwrap_or(data));
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(data.as_slice());

    // Tokenize everything up front so a structural error fails the document
    // before any record is produced.
    let rows = reader
        .byte_records()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut report = ParseReport::new(Format::Csv);
    let Some((header, body)) = rows.split_first() else {
        return Ok(report);
    };

    let header: Vec<Cow<'_, str>> = header.iter().map(String::from_utf8_lossy).collect();
    let roles = ColumnRoles::from_header(header.iter().map(|c| c.as_ref()));
    debug!(?roles, "resolved CSV columns");

    for row in body {
        if row.iter().all(|f| f.is_empty()) {
            continue;
        }
        match roles.record(row, ctx) {
            Some(record) => report.records.push(record),
            None => {
                report.skipped += 1;
                let line = row.position().map(|p| p.line());
                warn!(?line, "skipping CSV row with unparseable amount");
            }
        }
    }

    ctx.classifier.fill_missing(&mut report.records);
    debug!(
        parsed = report.records.len(),
        skipped = report.skipped,
        "parsed CSV statement"
    );
    Ok(report)
}
