//! File edges: reading sheets into [`RawRow`]s, loading existing keys, and
//! writing committed records.
//!
//! - **Delimiter resolution**: `.tsv` means tab, anything else comma, unless
//!   overridden.
//! - **Encoding**: input decoding and output encoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **Cells**: blank cells become [`CellValue::Empty`]; cells whose text is
//!   the canonical rendering of a finite number become
//!   [`CellValue::Number`], the way a spreadsheet keeps numeric cells
//!   numeric. Anything else, including `007` or `12.50`, stays text.
//! - **Headers**: repeated names get `_1`, `_2` suffixes and blank names
//!   become `__EMPTY`, so every column keeps a distinct key.
//! - **stdin/stdout**: the `-` path routes through the standard streams.

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;

use crate::data::{CanonicalRecord, CellValue, RawRow, format_number};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        Ok(Box::new(io::stdin().lock()))
    } else {
        Ok(Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        )))
    }
}

fn read_text(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let mut bytes = Vec::new();
    open_input(path)?
        .read_to_end(&mut bytes)
        .with_context(|| format!("Reading {path:?}"))?;
    decode_bytes(&bytes, encoding)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// Interprets one sheet cell.
pub fn parse_cell(raw: &str) -> CellValue {
    if raw.trim().is_empty() {
        return CellValue::Empty;
    }
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(number) if number.is_finite() && format_number(number) == trimmed => {
            CellValue::Number(number)
        }
        _ => CellValue::Text(raw.to_string()),
    }
}

/// Makes header names unique and non-empty, preserving column order.
pub fn unique_headers(raw: &[String]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut headers = Vec::with_capacity(raw.len());
    for name in raw {
        let base = if name.trim().is_empty() {
            "__EMPTY".to_string()
        } else {
            name.clone()
        };
        let mut candidate = base.clone();
        while taken.contains(&candidate) {
            let count = counts.entry(base.clone()).or_insert(0);
            *count += 1;
            candidate = format!("{base}_{count}");
        }
        taken.insert(candidate.clone());
        headers.push(candidate);
    }
    headers
}

/// Reads a delimited sheet. The first line supplies the headers; fully
/// blank rows are skipped and short rows are padded with empty cells.
pub fn read_sheet(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    limit: Option<usize>,
) -> Result<(Vec<String>, Vec<RawRow>)> {
    let text = read_text(path, encoding)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let raw_headers = reader
        .headers()
        .with_context(|| format!("Reading headers from {path:?}"))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let headers = unique_headers(&raw_headers);

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        if limit.is_some_and(|max| rows.len() >= max) {
            break;
        }
        let record = record.with_context(|| format!("Reading row {} in {path:?}", idx + 2))?;
        let row = headers
            .iter()
            .enumerate()
            .map(|(col, header)| {
                let cell = record.get(col).map(parse_cell).unwrap_or(CellValue::Empty);
                (header.as_str(), cell)
            })
            .collect::<RawRow>();
        if row.is_blank() {
            continue;
        }
        rows.push(row);
    }
    Ok((headers, rows))
}

/// Loads backend keys from a JSON array of strings or a plain list with one
/// key per line. Blank lines are ignored; keys are not trimmed beyond the
/// line break.
pub fn load_existing_keys(path: &Path, encoding: &'static Encoding) -> Result<HashSet<String>> {
    let text = read_text(path, encoding)?;
    if text.trim_start().starts_with('[') {
        let keys: Vec<String> = serde_json::from_str(&text)
            .with_context(|| format!("Parsing existing keys JSON from {path:?}"))?;
        return Ok(keys.into_iter().collect());
    }
    Ok(text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if !is_dash(p) => Ok(Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        ))),
        _ => Ok(Box::new(io::stdout())),
    }
}

pub fn write_text(path: Option<&Path>, text: &str, encoding: &'static Encoding) -> Result<()> {
    let (encoded, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(anyhow!(
            "Failed to encode output using {}",
            encoding.name()
        ));
    }
    let mut writer = open_output(path)?;
    writer
        .write_all(encoded.as_ref())
        .context("Writing output")?;
    writer.flush().context("Flushing output writer")
}

pub fn records_to_json<T: Serialize>(records: &[T]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(records).context("Serializing records to JSON")?;
    json.push('\n');
    Ok(json)
}

/// Renders records as CSV using `columns` as the header row. Blank fields
/// become empty cells.
pub fn records_to_csv(records: &[CanonicalRecord], columns: &[&str], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer
        .write_record(columns)
        .context("Writing output headers")?;
    for (idx, record) in records.iter().enumerate() {
        let cells = columns
            .iter()
            .map(|column| {
                record
                    .get(column)
                    .map(|value| value.as_display())
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>();
        writer
            .write_record(&cells)
            .with_context(|| format!("Writing output row {}", idx + 1))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing CSV buffer: {err}"))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn cells_keep_numbers_numeric_only_when_canonical() {
        assert_eq!(parse_cell("45000"), CellValue::Number(45000.0));
        assert_eq!(parse_cell("-2.5"), CellValue::Number(-2.5));
        assert_eq!(parse_cell("007"), CellValue::Text("007".into()));
        assert_eq!(parse_cell("12.50"), CellValue::Text("12.50".into()));
        assert_eq!(parse_cell("KAA 001A"), CellValue::Text("KAA 001A".into()));
        assert_eq!(parse_cell("  "), CellValue::Empty);
        assert_eq!(parse_cell("NaN"), CellValue::Text("NaN".into()));
    }

    #[test]
    fn repeated_and_blank_headers_get_suffixes() {
        let raw = ["Name", "Name", "", "Name", ""]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            unique_headers(&raw),
            vec!["Name", "Name_1", "__EMPTY", "Name_2", "__EMPTY_1"]
        );
    }

    #[test]
    fn read_sheet_skips_blank_rows_and_pads_short_ones() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "Reg No,Cost,Notes").unwrap();
        writeln!(file, "KAA001A,1500,ok").unwrap();
        writeln!(file, ",,").unwrap();
        writeln!(file, "KBB002B,20").unwrap();
        let (headers, rows) = read_sheet(file.path(), b',', UTF_8, None).expect("read sheet");
        assert_eq!(headers, vec!["Reg No", "Cost", "Notes"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Cost"), Some(&CellValue::Number(1500.0)));
        assert_eq!(rows[1].get("Notes"), Some(&CellValue::Empty));
    }

    #[test]
    fn existing_keys_accept_lines_or_json() {
        let mut lines = NamedTempFile::new().expect("temp file");
        writeln!(lines, "KAA002B\r\n\nKCC003C").unwrap();
        let keys = load_existing_keys(lines.path(), UTF_8).expect("load lines");
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("KAA002B"));

        let mut json = NamedTempFile::new().expect("temp file");
        write!(json, r#"["KAA002B", "KDD004D"]"#).unwrap();
        let keys = load_existing_keys(json.path(), UTF_8).expect("load json");
        assert!(keys.contains("KDD004D"));
    }
}
