//! CSV reading and writing with encoding and delimiter auto-detection.
//!
//! Rows are kept as plain string cells aligned with the header so that
//! column order survives a read-transform-write cycle untouched.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use crate::error::{CsvError, CsvResult};

/// Candidate delimiters, in detection priority order.
pub const DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Files under this size get a row-count estimate in the logs.
const ESTIMATE_LIMIT_BYTES: u64 = 1024 * 1024;

/// What to do with data rows carrying more fields than the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadLines {
    /// Keep the row, drop the extra fields.
    Truncate,
    /// Drop the whole row.
    Skip,
}

/// Output quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    /// Quote only fields that need it.
    Necessary,
    /// Quote every field.
    Always,
}

impl From<Quoting> for csv::QuoteStyle {
    fn from(q: Quoting) -> Self {
        match q {
            Quoting::Necessary => csv::QuoteStyle::Necessary,
            Quoting::Always => csv::QuoteStyle::Always,
        }
    }
}

/// A parsed CSV file.
#[derive(Debug, Clone)]
pub struct Table {
    /// Column headers in file order
    pub headers: Vec<String>,
    /// Data rows, each exactly `headers.len()` cells long
    pub rows: Vec<Vec<String>>,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    /// Rows dropped under [`BadLines::Skip`]
    pub skipped: usize,
}

impl Table {
    /// Index of `name` in the header.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of `name`, or [`CsvError::MissingColumn`].
    pub fn require_column(&self, name: &str) -> CsvResult<usize> {
        self.column_index(name)
            .ok_or_else(|| CsvError::MissingColumn(name.to_string()))
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding.
///
/// Unknown encodings fall back to lossy UTF-8. A leading BOM is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        // Latin-1 maps every byte to the code point of the same value.
        "iso-8859-1" | "latin-1" | "latin1" => bytes.iter().map(|&b| b as char).collect(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Pick the first candidate delimiter present in the header line.
///
/// Falls back to `,` when the header holds none of them (single column).
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");
    DELIMITERS
        .iter()
        .copied()
        .find(|d| first_line.contains(*d))
        .unwrap_or(',')
}

/// Log the first `num_lines` lines and delimiter counts of a file.
///
/// Purely diagnostic; failures are logged, never returned.
pub fn peek(path: &Path, num_lines: usize) {
    info!("Examining first {} lines of {}:", num_lines, path.display());

    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Error examining CSV file: {}", e);
            return;
        }
    };

    let mut header = None;
    let mut lines = BufReader::new(file).split(b'\n');
    for i in 0..num_lines {
        let line = match lines.next() {
            Some(Ok(raw)) => String::from_utf8_lossy(&raw).trim().to_string(),
            Some(Err(e)) => {
                warn!("Error examining CSV file: {}", e);
                return;
            }
            None => String::new(),
        };
        if header.is_none() {
            header = Some(line.clone());
        }
        if line.is_empty() {
            info!("  Line {}: <empty line>", i + 1);
        } else {
            info!("  Line {}: {}", i + 1, crate::logging::preview(&line, 100));
        }
    }

    if let Some(header) = header {
        for d in DELIMITERS {
            let count = header.matches(d).count();
            if count > 0 {
                info!("  Potential delimiter '{}' found {} times in header", format_delimiter(d), count);
            }
        }
    }
}

/// Read and parse a CSV file with auto-detection of encoding and delimiter.
pub fn read_table(path: &Path, bad_lines: BadLines) -> CsvResult<Table> {
    if !path.exists() {
        return Err(CsvError::NotFound(path.to_path_buf()));
    }

    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    if bytes.len() as u64 <= ESTIMATE_LIMIT_BYTES {
        let estimate = bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count();
        info!(
            "File size: {:.1}KB, Estimated rows: {}",
            bytes.len() as f64 / 1024.0,
            estimate.saturating_sub(1)
        );
    } else {
        info!(
            "Large file detected ({:.1}MB). Not counting rows.",
            bytes.len() as f64 / 1024.0 / 1024.0
        );
    }

    parse_bytes(&bytes, bad_lines)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes(bytes: &[u8], bad_lines: BadLines) -> CsvResult<Table> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter = detect_delimiter(&content);
    info!("Detected encoding: {}, delimiter: '{}'", encoding, format_delimiter(delimiter));

    parse_str(&content, delimiter, encoding, bad_lines)
}

/// Parse CSV text with an explicit delimiter.
pub fn parse_str(
    content: &str,
    delimiter: char,
    encoding: String,
    bad_lines: BadLines,
) -> CsvResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut rows = Vec::new();
    let mut skipped = 0;

    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() && bad_lines == BadLines::Skip {
            warn!(
                "Skipping line {}: expected {} fields, saw {}",
                record.position().map_or(0, |p| p.line()),
                headers.len(),
                record.len()
            );
            skipped += 1;
            continue;
        }

        let mut row: Vec<String> = record.iter().take(headers.len()).map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(Table {
        headers,
        rows,
        encoding,
        delimiter,
        skipped,
    })
}

/// Write a header and rows to `path` as comma-separated UTF-8.
pub fn write_table<H, R>(path: &Path, headers: &[H], rows: &[R], quoting: Quoting) -> CsvResult<()>
where
    H: AsRef<str>,
    R: AsRef<[String]>,
{
    let mut writer = csv::WriterBuilder::new()
        .quote_style(quoting.into())
        .from_path(path)?;

    writer.write_record(headers.iter().map(|h| h.as_ref()))?;
    for row in rows {
        writer.write_record(row.as_ref())?;
    }
    writer.flush()?;
    Ok(())
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
