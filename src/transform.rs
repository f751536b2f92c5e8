//! Applies a [`HeaderMapping`] to raw rows, coercing cells into typed values.

use crate::{
    data::{
        CanonicalRecord, CellValue, FieldType, FieldValue, RawRow, parse_lenient_float,
        serial_to_iso_date,
    },
    mapping::{HeaderMapping, build_mapping_traced, map_fields},
    schema::{FieldSchema, MappingMode, TypeHints},
    trace::{NoTrace, TraceSink},
};

/// Coerces one cell according to its field's declared type.
///
/// Blank cells and anything that cannot be coerced come back as `None`.
pub fn coerce_cell(cell: &CellValue, datatype: FieldType) -> Option<FieldValue> {
    if cell.is_blank() {
        return None;
    }
    match (datatype, cell) {
        (_, CellValue::Empty) => None,
        (FieldType::Number, CellValue::Number(n)) => {
            n.is_finite().then_some(FieldValue::Number(*n))
        }
        (FieldType::Number, CellValue::Text(text)) => {
            parse_lenient_float(text).map(FieldValue::Number)
        }
        (FieldType::Date, CellValue::Number(serial)) => {
            serial_to_iso_date(*serial).map(FieldValue::Date)
        }
        (FieldType::Date, CellValue::Text(text)) => Some(FieldValue::Date(text.clone())),
        (FieldType::String, CellValue::Text(text)) => {
            Some(FieldValue::Text(text.trim().to_string()))
        }
        (FieldType::String, CellValue::Number(n)) => Some(FieldValue::Text(cell_text(*n))),
    }
}

fn cell_text(value: f64) -> String {
    CellValue::Number(value).as_display()
}

/// Builds a canonical record from `row`. Only mapped headers are carried
/// over; every mapped field is present in the output, blank or not.
pub fn transform_row(row: &RawRow, mapping: &HeaderMapping, hints: &TypeHints) -> CanonicalRecord {
    let mut record = CanonicalRecord::new();
    for (header, field) in mapping.iter() {
        let datatype = hints.get(field).copied().unwrap_or_default();
        let value = row
            .get(header)
            .and_then(|cell| coerce_cell(cell, datatype));
        record.set(field, value);
    }
    record
}

pub fn transform_rows(
    rows: &[RawRow],
    mapping: &HeaderMapping,
    hints: &TypeHints,
) -> Vec<CanonicalRecord> {
    rows.iter()
        .map(|row| transform_row(row, mapping, hints))
        .collect()
}

/// Maps headers from the first row, then transforms every row.
pub fn process_rows(
    rows: &[RawRow],
    schema: &FieldSchema,
    threshold: f64,
) -> (HeaderMapping, Vec<CanonicalRecord>) {
    process_rows_traced(rows, schema, threshold, &mut NoTrace)
}

pub fn process_rows_traced(
    rows: &[RawRow],
    schema: &FieldSchema,
    threshold: f64,
    sink: &mut dyn TraceSink,
) -> (HeaderMapping, Vec<CanonicalRecord>) {
    let Some(sample) = rows.first() else {
        return (HeaderMapping::new(), Vec::new());
    };
    let mapping = build_mapping_traced(sample, &schema.fields, threshold, sink);
    let records = transform_rows(rows, &mapping, &schema.type_hints());
    (mapping, records)
}

/// Field-centric pipeline: each row goes through [`map_fields`], so every
/// field takes its own best column. The returned mapping is the identity over
/// the schema's fields, and every record carries all of them.
pub fn process_rows_by_field(
    rows: &[RawRow],
    schema: &FieldSchema,
    threshold: f64,
) -> (HeaderMapping, Vec<CanonicalRecord>) {
    let mapping = schema
        .fields
        .iter()
        .map(|spec| (spec.field.as_str(), spec.field.as_str()))
        .collect::<HeaderMapping>();
    let hints = schema.type_hints();
    let records = rows
        .iter()
        .map(|row| transform_row(&map_fields(row, &schema.fields, threshold), &mapping, &hints))
        .collect();
    (mapping, records)
}

/// Runs whichever pipeline `mode` selects.
pub fn process_rows_with_mode(
    rows: &[RawRow],
    schema: &FieldSchema,
    threshold: f64,
    mode: MappingMode,
    sink: &mut dyn TraceSink,
) -> (HeaderMapping, Vec<CanonicalRecord>) {
    match mode {
        MappingMode::Header => process_rows_traced(rows, schema, threshold, sink),
        MappingMode::Field => process_rows_by_field(rows, schema, threshold),
    }
}
