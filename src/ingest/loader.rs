// src/ingest/loader.rs
use csv::{ErrorKind, ReaderBuilder};
use encoding_rs::{Encoding, UTF_8};
use std::{borrow::Cow, fs, path::Path};
use tracing::{debug, error, info, warn};

use super::{
    error::{AttemptFailure, FailedAttempt, LoadError},
    RawTable,
};

/// Knobs for header/encoding detection.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Tried in order; the first one that yields a table wins.
    pub encodings: Vec<&'static Encoding>,
    /// Number of leading lines searched for the header row.
    pub scan_lines: usize,
    /// A line containing any of these is the header row.
    pub header_signals: Vec<String>,
}

/// Read `path` and parse it with the first encoding candidate that decodes
/// cleanly and shows a header row within the scan window.
///
/// A file whose header is found but which has no data rows is a success
/// (an empty table), not a failure.
#[tracing::instrument(level = "info", skip(path, opts), fields(path = %path.as_ref().display()))]
pub fn load<P: AsRef<Path>>(path: P, opts: &LoaderOptions) -> Result<RawTable, LoadError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut attempts = Vec::with_capacity(opts.encodings.len());
    for &encoding in &opts.encodings {
        match attempt(&bytes, encoding, opts) {
            Ok(table) => {
                info!(
                    encoding = table.encoding,
                    delimiter = %char::from(table.delimiter),
                    header_row = table.header_row,
                    rows = table.rows.len(),
                    skipped = table.skipped_rows,
                    "loaded table"
                );
                return Ok(table);
            }
            Err(failure) => {
                debug!(encoding = encoding.name(), %failure, "encoding rejected");
                attempts.push(FailedAttempt {
                    encoding: encoding.name(),
                    failure,
                });
            }
        }
    }

    let err = LoadError::Exhausted {
        path: path.to_path_buf(),
        attempts,
    };
    error!("{}", err);
    Err(err)
}

/// One encoding candidate, start to finish: decode, find the header row,
/// pick the delimiter, parse.
///
/// Lines end at `\n` (with an optional `\r` before it). A file with no `\n`
/// at all is split on bare `\r` instead, matching what the CSV reader treats
/// as a record end.
pub fn attempt(
    bytes: &[u8],
    encoding: &'static Encoding,
    opts: &LoaderOptions,
) -> Result<RawTable, AttemptFailure> {
    let decoded = decode(bytes, encoding).ok_or(AttemptFailure::Undecodable(encoding.name()))?;
    let text: &str = &decoded;

    let (header_row, header_line) = find_header(text, opts.scan_lines, &opts.header_signals)
        .ok_or_else(|| AttemptFailure::NoHeader {
            scanned: lines(text).take(opts.scan_lines).count(),
        })?;
    let delimiter = sniff_delimiter(header_line);

    let body = &text[line_offset(text, header_row)..];
    let (headers, rows, skipped_rows) = parse_body(body, delimiter)?;

    Ok(RawTable {
        headers,
        rows,
        encoding: encoding.name(),
        delimiter,
        header_row,
        skipped_rows,
    })
}

/// Strict decode: any malformed sequence rejects the candidate. A BOM for the
/// candidate encoding is dropped.
fn decode<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Option<Cow<'a, str>> {
    let bytes = match Encoding::for_bom(bytes) {
        Some((bom_enc, len)) if bom_enc == encoding => &bytes[len..],
        _ => bytes,
    };
    if encoding == UTF_8 {
        return std::str::from_utf8(bytes).ok().map(Cow::Borrowed);
    }
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

/// First line (within `scan_lines`) that contains any signal word.
fn find_header<'t>(
    text: &'t str,
    scan_lines: usize,
    signals: &[String],
) -> Option<(usize, &'t str)> {
    lines(text)
        .take(scan_lines)
        .enumerate()
        .find(|(_, line)| signals.iter().any(|s| line.contains(s.as_str())))
}

/// Semicolon only when it strictly outnumbers commas on the header line.
pub fn sniff_delimiter(line: &str) -> u8 {
    let semis = line.matches(';').count();
    let commas = line.matches(',').count();
    if semis > commas {
        b';'
    } else {
        b','
    }
}

/// `\n`, or `\r` for old-Mac style files that never use `\n`.
fn line_break(text: &str) -> char {
    if !text.contains('\n') && text.contains('\r') {
        '\r'
    } else {
        '\n'
    }
}

fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split_terminator(line_break(text))
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
}

/// Byte offset where line `index` starts.
fn line_offset(text: &str, index: usize) -> usize {
    text.split_inclusive(line_break(text))
        .take(index)
        .map(str::len)
        .sum()
}

type ParsedBody = (Vec<String>, Vec<Vec<String>>, usize);

fn parse_body(body: &str, delimiter: u8) -> Result<ParsedBody, AttemptFailure> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        match result {
            Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
            Err(e) => {
                skipped += 1;
                match e.kind() {
                    ErrorKind::UnequalLengths { pos, expected_len, len } => {
                        let line = pos.as_ref().map(|p| p.line());
                        debug!(?line, expected_len, len, "skipping malformed row");
                    }
                    _ => warn!("skipping unreadable row: {}", e),
                }
            }
        }
    }

    Ok((headers, rows, skipped))
}
