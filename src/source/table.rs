//! Table extraction from the rendered PAGASA table page.
//!
//! Low-level string scanning tailored to the page layout: a `div.search-time`
//! holding the reported capture time and a `table.table-type1` whose `tbody`
//! rows are stations. Tag and attribute
//! names are matched case-insensitively (ASCII).

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::error::AcquisitionError;
use crate::models::{Feed, Reading, Snapshot, CAPTURE_TIME_FORMAT};

// ---

/// Parse one table page into a snapshot.
///
/// `fallback` is used as the capture time when the page does not report one.
/// Header rows (no `<td>`) and rows with fewer cells than the feed schema
/// are skipped, and a repeated
/// station keeps its first row. A page without the data table is an error;
/// a table without usable rows yields an empty snapshot.
pub fn parse_snapshot(
    feed: Feed,
    html: &str,
    fallback: NaiveDateTime,
) -> Result<Snapshot, AcquisitionError> {
    // ---
    let captured_at = element_inner(html, "div", "search-time")
        .and_then(|inner| parse_capture_time(&cell_text(inner)))
        .unwrap_or(fallback);

    let table =
        element_inner(html, "table", "table-type1").ok_or(AcquisitionError::TableNotFound { feed })?;
    let body = element_inner(table, "tbody", "").unwrap_or(table);

    let columns = feed.columns();
    let mut seen = HashSet::new();
    let mut readings = Vec::new();

    for row in child_blocks(body, &["tr"]) {
        // Header rows have no data cells. Without a literal <tbody> the
        // <thead> rows are scanned too.
        if child_blocks(row, &["td"]).is_empty() {
            continue;
        }

        let cells: Vec<String> = child_blocks(row, &["th", "td"])
            .into_iter()
            .map(cell_text)
            .collect();
        if cells.len() < columns.len() + 1 {
            continue;
        }

        let station = cells[0].clone();
        if !seen.insert(station.clone()) {
            tracing::debug!(feed = %feed, station = %station, "Skipping repeated station row");
            continue;
        }

        let reading = columns
            .iter()
            .zip(&cells[1..])
            .fold(Reading::new(station), |r, (column, value)| r.with(column, value.as_str()));
        readings.push(reading);
    }

    Ok(Snapshot::new(readings, captured_at))
}

/// Byte shape of a capture time: `d` is an ASCII digit, anything else literal.
const CAPTURE_TIME_SHAPE: &[u8] = b"dddd-dd-dd dd:dd";

/// Find a `YYYY-MM-DD HH:MM` timestamp in a label such as
/// `"Search Time : 2024-07-24 09:40"`.
///
/// Only a run of exactly that shape, not touching other digits on either
/// side, is handed to chrono.
fn parse_capture_time(text: &str) -> Option<NaiveDateTime> {
    // ---
    let bytes = text.as_bytes();
    let width = CAPTURE_TIME_SHAPE.len();
    if bytes.len() < width {
        return None;
    }

    (0..=bytes.len() - width)
        .filter(|&i| i == 0 || !bytes[i - 1].is_ascii_digit())
        .filter(|&i| bytes.get(i + width).map_or(true, |b| !b.is_ascii_digit()))
        .filter(|&i| matches_shape(&bytes[i..i + width]))
        .find_map(|i| {
            let window = text.get(i..i + width)?;
            NaiveDateTime::parse_from_str(window, CAPTURE_TIME_FORMAT).ok()
        })
}

fn matches_shape(window: &[u8]) -> bool {
    window
        .iter()
        .zip(CAPTURE_TIME_SHAPE)
        .all(|(&b, &shape)| match shape {
            b'd' => b.is_ascii_digit(),
            literal => b == literal,
        })
}

/// Inner HTML of the first `<tag>` whose class list contains `class`
/// (any `<tag>` when `class` is empty).
fn element_inner<'a>(html: &'a str, tag: &str, class: &str) -> Option<&'a str> {
    // ---
    let lc = to_lowercase_fast(html);
    let close_pat = format!("</{}", tag);
    let mut from = 0;

    while let Some(start) = find_open_tag(&lc, tag, from) {
        let open_end = lc[start..].find('>')? + start + 1;
        if class.is_empty() || has_class(&lc[start..open_end], class) {
            let close = lc[open_end..].find(&close_pat)? + open_end;
            return Some(&html[open_end..close]);
        }
        from = open_end;
    }
    None
}

/// Inner HTML of each successive block opened by any of `tags`, in document order.
fn child_blocks<'a>(html: &'a str, tags: &[&str]) -> Vec<&'a str> {
    // ---
    let lc = to_lowercase_fast(html);
    let mut blocks = Vec::new();
    let mut from = 0;

    while let Some((start, tag)) = tags
        .iter()
        .filter_map(|tag| find_open_tag(&lc, tag, from).map(|i| (i, *tag)))
        .min_by_key(|(i, _)| *i)
    {
        let Some(open_end) = lc[start..].find('>').map(|i| start + i + 1) else {
            break;
        };
        let close_pat = format!("</{}", tag);
        let Some(close) = lc[open_end..].find(&close_pat).map(|i| open_end + i) else {
            break;
        };
        blocks.push(&html[open_end..close]);
        from = close + close_pat.len();
    }
    blocks
}

/// Position of the next `<tag` that is a whole tag name (`<th` must not match `<thead`).
fn find_open_tag(lc: &str, tag: &str, from: usize) -> Option<usize> {
    // ---
    let pat = format!("<{}", tag);
    let mut pos = from;
    loop {
        let idx = lc.get(pos..)?.find(&pat)? + pos;
        match lc[idx + pat.len()..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => return Some(idx),
            _ => pos = idx + pat.len(),
        }
    }
}

fn has_class(open_tag: &str, class: &str) -> bool {
    open_tag
        .split(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '=' | '>'))
        .any(|token| token == class)
}

/// Visible text of a cell: tags removed, entities decoded, whitespace collapsed.
fn cell_text(inner: &str) -> String {
    normalize_ws(&normalize_entities(&strip_tags(inner)))
}

fn strip_tags(s: &str) -> String {
    // ---
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn normalize_entities(s: &str) -> String {
    s.replace("&nbsp;", " ").replace("&amp;", "&")
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// ASCII-only lowercasing; byte offsets stay valid against the input.
fn to_lowercase_fast(s: &str) -> String {
    s.chars().map(|c| c.to_ascii_lowercase()).collect()
}
