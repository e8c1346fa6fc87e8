use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Chain, Cursor, Read};
use std::path::Path;
use tracing::debug;

use crate::context::{ParseContext, ParseReport};
use crate::error::{ImportError, Result};

/// Smallest content prefix inspected when sniffing.
pub const MIN_SNIFF_WINDOW: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Csv,
    /// OFX and QFX share one grammar.
    Ofx,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Csv => write!(f, "CSV"),
            Format::Ofx => write!(f, "OFX"),
        }
    }
}

impl Format {
    /// Format implied by the file extension, compared case-insensitively. The
    /// extension is everything after the last `.` of the final path component,
    /// so a bare `.csv` counts.
    pub fn from_filename(filename: &str) -> Option<Format> {
        let name = Path::new(filename).file_name()?.to_str()?;
        let (_, ext) = name.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Format::Csv),
            "ofx" | "qfx" => Some(Format::Ofx),
            _ => None,
        }
    }

    /// Format implied by a content prefix: `<ofx` anywhere means OFX, otherwise
    /// any comma means CSV.
    pub fn sniff(prefix: &[u8]) -> Option<Format> {
        let lower = prefix.to_ascii_lowercase();
        if lower.windows(4).any(|w| w == b"<ofx") {
            Some(Format::Ofx)
        } else if lower.contains(&b',') {
            Some(Format::Csv)
        } else {
            None
        }
    }
}

/// Reader that buffers a prefix of its source for inspection and then replays
/// it, so the bytes that were sniffed still reach the parser.
#[derive(Debug)]
pub struct SniffReader<R> {
    inner: Chain<Cursor<Vec<u8>>, R>,
}

impl<R: Read> SniffReader<R> {
    /// Buffers up to `window` bytes from `source`.
    pub fn new(mut source: R, window: usize) -> io::Result<Self> {
        let mut prefix = Vec::with_capacity(window);
        (&mut source).take(window as u64).read_to_end(&mut prefix)?;
        Ok(Self {
            inner: Cursor::new(prefix).chain(source),
        })
    }

    /// Wraps `source` without buffering anything.
    pub fn passthrough(source: R) -> Self {
        Self {
            inner: Cursor::new(Vec::new()).chain(source),
        }
    }

    /// The buffered prefix, regardless of how much has been read since.
    pub fn prefix(&self) -> &[u8] {
        self.inner.get_ref().0.get_ref()
    }
}

impl<R: Read> Read for SniffReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Picks a format from the filename, or failing that from the first
/// `window` bytes of content. The returned reader still yields every byte.
pub fn detect<R: Read>(
    filename: &str,
    source: R,
    window: usize,
) -> Result<(Format, SniffReader<R>)> {
    if let Some(format) = Format::from_filename(filename) {
        debug!(filename, %format, "format chosen by extension");
        return Ok((format, SniffReader::passthrough(source)));
    }

    let reader = SniffReader::new(source, window.max(MIN_SNIFF_WINDOW))?;
    match Format::sniff(reader.prefix()) {
        Some(format) => {
            debug!(filename, %format, sniffed = reader.prefix().len(), "format chosen by content");
            Ok((format, reader))
        }
        None => Err(ImportError::UnsupportedFormat(if filename.is_empty() {
            "<unnamed>".to_string()
        } else {
            filename.to_string()
        })),
    }
}

/// Detects the format of `source` and runs the matching parser.
pub fn detect_and_parse<R: Read>(
    source: R,
    filename: &str,
    ctx: &ParseContext<'_>,
) -> Result<ParseReport> {
    let (format, reader) = detect(filename, source, ctx.sniff_window)?;
    match format {
        Format::Csv => crate::csv::parse(reader, ctx),
        Format::Ofx => crate::ofx::parse(reader, ctx),
    }
}

/// Opens `path` and parses it, using the path itself as the filename hint.
pub fn parse_path(path: &Path, ctx: &ParseContext<'_>) -> Result<ParseReport> {
    let file = File::open(path)?;
    detect_and_parse(BufReader::new(file), &path.to_string_lossy(), ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Yields its data in small pieces so the sniff has to loop.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn read_all<R: Read>(mut r: R) -> Vec<u8> {
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        out
    }

    // ── extension ─────────────────────────────────────────────────────────────

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(Format::from_filename("march.csv"), Some(Format::Csv));
        assert_eq!(Format::from_filename("MARCH.CSV"), Some(Format::Csv));
        assert_eq!(Format::from_filename("stmt.ofx"), Some(Format::Ofx));
        assert_eq!(Format::from_filename("/tmp/Stmt.QFX"), Some(Format::Ofx));
    }

    #[test]
    fn unknown_or_missing_extension() {
        assert_eq!(Format::from_filename("statement.txt"), None);
        assert_eq!(Format::from_filename("statement"), None);
        assert_eq!(Format::from_filename(""), None);
        assert_eq!(Format::from_filename("csv"), None);
        assert_eq!(Format::from_filename("statement."), None);
        assert_eq!(Format::from_filename("csv.d/notes"), None);
    }

    #[test]
    fn dotfile_name_is_its_own_extension() {
        assert_eq!(Format::from_filename(".csv"), Some(Format::Csv));
        assert_eq!(Format::from_filename("/tmp/.QFX"), Some(Format::Ofx));
    }

    #[test]
    fn dotfile_csv_is_not_sniffed() {
        let (format, reader) = detect(".csv", &b"no commas here"[..], 2048).unwrap();
        assert_eq!(format, Format::Csv);
        assert!(reader.prefix().is_empty());
    }

    // ── content sniff ─────────────────────────────────────────────────────────

    #[test]
    fn sniff_prefers_ofx_over_commas() {
        assert_eq!(Format::sniff(b"OFXHEADER:100\n<OFX>\n<NAME>A, B"), Some(Format::Ofx));
        assert_eq!(Format::sniff(b"<?xml version=\"1.0\"?>\n<ofx>"), Some(Format::Ofx));
    }

    #[test]
    fn sniff_comma_means_csv() {
        assert_eq!(Format::sniff(b"date,amount\n"), Some(Format::Csv));
    }

    #[test]
    fn sniff_nothing_recognizable() {
        assert_eq!(Format::sniff(b"just some text\nwith lines"), None);
        assert_eq!(Format::sniff(b""), None);
    }

    // ── pushback ──────────────────────────────────────────────────────────────

    #[test]
    fn sniffed_bytes_are_replayed() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let reader = SniffReader::new(data.as_slice(), 2048).unwrap();
        assert_eq!(reader.prefix().len(), 2048);
        assert_eq!(read_all(reader), data);
    }

    #[test]
    fn sniff_fills_window_from_short_reads() {
        let data = vec![b'x'; 3000];
        let reader = SniffReader::new(Trickle { data: &data, step: 7 }, 2048).unwrap();
        assert_eq!(reader.prefix().len(), 2048);
        assert_eq!(read_all(reader).len(), 3000);
    }

    #[test]
    fn short_source_is_fully_buffered() {
        let reader = SniffReader::new(&b"a,b"[..], 2048).unwrap();
        assert_eq!(reader.prefix(), b"a,b");
        assert_eq!(read_all(reader), b"a,b");
    }

    #[test]
    fn detect_by_extension_does_not_consume() {
        let (format, reader) = detect("x.csv", &b"anything"[..], 2048).unwrap();
        assert_eq!(format, Format::Csv);
        assert!(reader.prefix().is_empty());
        assert_eq!(read_all(reader), b"anything");
    }

    #[test]
    fn detect_marker_beyond_minimum_window() {
        let mut data = vec![b' '; 3000];
        data.extend_from_slice(b"<OFX>");
        assert!(detect("export", data.as_slice(), 2048).is_err());
        let (format, _) = detect("export", data.as_slice(), 4096).unwrap();
        assert_eq!(format, Format::Ofx);
    }

    #[test]
    fn detect_window_never_below_minimum() {
        let mut data = vec![b' '; 1500];
        data.push(b',');
        let (format, _) = detect("export", data.as_slice(), 16).unwrap();
        assert_eq!(format, Format::Csv);
    }

    #[test]
    fn detect_unsupported() {
        let err = detect("notes.txt", &b"hello world"[..], 2048).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(ref name) if name == "notes.txt"));
    }
}
