//! OFX/QFX statement parser.
//!
//! Handles SGML-style OFX 1.x (unterminated field tags) and XML OFX 2.x alike
//! by scanning the document one element at a time, so it does not care how
//! tags are spread over lines.

use pfin_core::{Money, ParsedRecord};
use std::io::Read;
use tracing::{debug, warn};

use crate::context::{ParseContext, ParseReport};
use crate::detect::Format;
use crate::error::Result;
use crate::util::{parse_compact_date, resolve_date};

/// One element of the tag stream.
#[derive(Debug, PartialEq, Eq)]
enum Element<'a> {
    Open { tag: &'a str, text: &'a str },
    Close(&'a str),
}

/// Length of the tag body when `rest` (the text after a `<`) starts a tag:
/// a name `[A-Za-z][A-Za-z0-9.]*`, optionally after `/`, then `>`. Processing
/// instructions and comments run to the next `>`.
fn tag_len(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    match *bytes.first()? {
        b'?' | b'!' => rest.find('>'),
        first => {
            let name_start = usize::from(first == b'/');
            if !bytes.get(name_start)?.is_ascii_alphabetic() {
                return None;
            }
            let name_len = bytes[name_start..]
                .iter()
                .take_while(|b| b.is_ascii_alphanumeric() || **b == b'.')
                .count();
            let end = name_start + name_len;
            (bytes.get(end) == Some(&b'>')).then_some(end)
        }
    }
}

/// Scans `content` into tags, each carrying the text up to the next tag. A
/// `<` that does not start a tag stays part of the text.
fn elements(content: &str) -> Vec<Element<'_>> {
    let mut tags = Vec::new();
    let mut from = 0;
    while let Some(offset) = content[from..].find('<') {
        let open = from + offset;
        match tag_len(&content[open + 1..]) {
            Some(len) => {
                let close = open + 1 + len;
                tags.push((open, close));
                from = close + 1;
            }
            None => from = open + 1,
        }
    }

    tags.iter()
        .enumerate()
        .filter_map(|(i, &(open, close))| {
            let tag = &content[open + 1..close];
            if tag.starts_with('?') || tag.starts_with('!') {
                return None;
            }
            let text_end = tags.get(i + 1).map_or(content.len(), |&(next, _)| next);
            Some(match tag.strip_prefix('/') {
                Some(name) => Element::Close(name),
                None => Element::Open {
                    tag,
                    text: content[close + 1..text_end].trim(),
                },
            })
        })
        .collect()
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Field text gathered between `<STMTTRN>` and `</STMTTRN>`.
#[derive(Debug, Default)]
struct PendingTransaction {
    posted: Option<String>,
    amount: Option<String>,
    name: String,
    memo: String,
}

impl PendingTransaction {
    fn set(&mut self, tag: &str, text: &str) {
        match tag.to_ascii_uppercase().as_str() {
            "DTPOSTED" => self.posted = Some(text.to_string()),
            "TRNAMT" => self.amount = Some(text.to_string()),
            "NAME" => self.name = decode_entities(text),
            "MEMO" => self.memo = decode_entities(text),
            _ => {}
        }
    }

    /// `None` when the amount is absent or unreadable.
    fn finish(self, ctx: &ParseContext<'_>) -> Option<ParsedRecord> {
        let amount: Money = self.amount.as_deref()?.parse().ok()?;
        let posted = self
            .posted
            .as_deref()
            .map(|s| s.get(..8).unwrap_or(s));
        let (date, origin) = resolve_date(posted, ctx.today, parse_compact_date);
        let description = if self.name.is_empty() {
            self.memo
        } else {
            self.name
        };
        Some(ParsedRecord::new(amount, description, date).with_date_origin(origin))
    }
}

/// Reads the whole of `reader` and extracts every closed `STMTTRN` block.
pub fn parse<R: Read>(mut reader: R, ctx: &ParseContext<'_>) -> Result<ParseReport> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(parse_str(&String::from_utf8_lossy(&data), ctx))
}

pub fn parse_str(content: &str, ctx: &ParseContext<'_>) -> ParseReport {
    let mut report = ParseReport::new(Format::Ofx);
    let mut pending: Option<PendingTransaction> = None;

    for element in elements(content) {
        match element {
            Element::Open { tag, .. } if tag.eq_ignore_ascii_case("STMTTRN") => {
                pending = Some(PendingTransaction::default());
            }
            Element::Close(tag) if tag.eq_ignore_ascii_case("STMTTRN") => {
                let Some(trx) = pending.take() else {
                    continue;
                };
                match trx.finish(ctx) {
                    Some(record) => report.records.push(record),
                    None => {
                        report.skipped += 1;
                        warn!(
                            block = report.records.len() + report.skipped,
                            "skipping OFX transaction with missing or unparseable amount"
                        );
                    }
                }
            }
            Element::Open { tag, text } => {
                if let Some(trx) = pending.as_mut() {
                    trx.set(tag, text);
                }
            }
            Element::Close(_) => {}
        }
    }

    if pending.is_some() {
        debug!("ignoring unterminated STMTTRN block at end of document");
    }

    ctx.classifier.fill_missing(&mut report.records);
    debug!(
        parsed = report.records.len(),
        skipped = report.skipped,
        "parsed OFX statement"
    );
    report
}
