use chrono::NaiveDate;
use pfin_core::DateOrigin;

/// `YYYYMMDD`, exactly eight ASCII digits.
pub fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let y: i32 = s[0..4].parse().ok()?;
    let m: u32 = s[4..6].parse().ok()?;
    let d: u32 = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// `DD/MM/YYYY` with two-digit day and month.
fn parse_day_first(s: &str) -> Option<NaiveDate> {
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
}

/// `M/D/YYYY`; month and day may drop their leading zero, the year may not.
fn parse_month_first(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split('/');
    let (m, d, y) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let digits = |p: &str, lens: std::ops::RangeInclusive<usize>| {
        lens.contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits(m, 1..=2) || !digits(d, 1..=2) || !digits(y, 4..=4) {
        return None;
    }
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Tries `YYYY-MM-DD`, `YYYYMMDD`, `DD/MM/YYYY` then `M/D/YYYY`.
pub fn parse_statement_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    parse_iso(s)
        .or_else(|| parse_compact_date(s))
        .or_else(|| parse_day_first(s))
        .or_else(|| parse_month_first(s))
}

/// Resolves a source date, falling back to `today` when it is absent or
/// unreadable.
pub fn resolve_date(
    text: Option<&str>,
    today: NaiveDate,
    parse: impl Fn(&str) -> Option<NaiveDate>,
) -> (NaiveDate, DateOrigin) {
    match text.map(str::trim).filter(|s| !s.is_empty()) {
        None => (today, DateOrigin::Missing),
        Some(s) => match parse(s) {
            Some(date) => (date, DateOrigin::Parsed),
            None => (today, DateOrigin::Unparseable),
        },
    }
}
