use std::{fmt, sync::OnceLock};

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

/// Days between the spreadsheet epoch (1899-12-30) and the Unix epoch.
pub const SPREADSHEET_UNIX_EPOCH_OFFSET: f64 = 25569.0;
const MILLIS_PER_DAY: f64 = 86_400.0 * 1000.0;

/// A cell as handed over by the spreadsheet reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(text) => text.clone(),
            CellValue::Empty => String::new(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Declared type of a canonical field, used as the transformer's type hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed value in a [`CanonicalRecord`].
///
/// `Date` holds either an ISO `YYYY-MM-DD` string produced from a serial
/// number or the sheet's own text, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Date(String),
}

impl FieldValue {
    pub fn as_display(&self) -> String {
        match self {
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(text) | FieldValue::Date(text) => text.clone(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// One spreadsheet row: header to cell, in sheet column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a cell, replacing the value in place if the header already exists.
    pub fn insert(&mut self, header: impl Into<String>, value: impl Into<CellValue>) {
        let header = header.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(existing, _)| *existing == header) {
            Some((_, slot)) => *slot = value,
            None => self.cells.push((header, value)),
        }
    }

    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(existing, _)| existing == header)
            .map(|(_, value)| value)
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(header, _)| header.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(header, value)| (header.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, value)| value.is_blank())
    }
}

impl<K, V> FromIterator<(K, V)> for RawRow
where
    K: Into<String>,
    V: Into<CellValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (header, value) in iter {
            row.insert(header, value);
        }
        row
    }
}

/// A transformed row keyed by canonical field name.
///
/// Fields keep the order in which they were first set. `None` marks a blank
/// or unparsable cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRecord {
    fields: Vec<(String, Option<FieldValue>)>,
}

impl CanonicalRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: Option<FieldValue>) {
        let field = field.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == field) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Returns the stored value; `None` both for absent fields and blank ones.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == field)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.iter().any(|(existing, _)| existing == field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(field, _)| field.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// String form of a field, `None` when missing or blank.
    pub fn text(&self, field: &str) -> Option<String> {
        self.get(field)
            .map(FieldValue::as_display)
            .filter(|value| !value.is_empty())
    }
}

impl<K: Into<String>> FromIterator<(K, Option<FieldValue>)> for CanonicalRecord {
    fn from_iter<I: IntoIterator<Item = (K, Option<FieldValue>)>>(iter: I) -> Self {
        let mut record = CanonicalRecord::new();
        for (field, value) in iter {
            record.set(field, value);
        }
        record
    }
}

impl Serialize for CanonicalRecord {
    // Blank fields are omitted, the way a JSON payload drops undefined keys.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let present = self.fields.iter().filter(|(_, value)| value.is_some());
        let mut map = serializer.serialize_map(Some(present.clone().count()))?;
        for (field, value) in present {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

static FLOAT_PREFIX: OnceLock<Regex> = OnceLock::new();

/// Parses the longest leading decimal literal, ignoring surrounding
/// whitespace and trailing text (`"12.5 kg"` is `12.5`). Locale-invariant:
/// only `.` is a decimal separator. Non-finite results are rejected.
pub fn parse_lenient_float(value: &str) -> Option<f64> {
    let pattern = FLOAT_PREFIX.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?")
            .expect("float prefix pattern compiles")
    });
    let trimmed = value.trim();
    let literal = pattern.find(trimmed)?.as_str();
    literal
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
}

/// Converts a spreadsheet serial day number into a calendar date (UTC).
///
/// Serial `25569` is 1970-01-01; fractional days carry the time of day and
/// are dropped from the returned date.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let millis = ((serial - SPREADSHEET_UNIX_EPOCH_OFFSET) * MILLIS_PER_DAY).trunc();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64).map(|instant| instant.date_naive())
}

pub fn serial_to_iso_date(serial: f64) -> Option<String> {
    serial_to_date(serial).map(|date| date.format("%Y-%m-%d").to_string())
}
