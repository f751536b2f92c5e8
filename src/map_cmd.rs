use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::{
    cli::MapArgs,
    data::{CellValue, RawRow},
    io_utils,
    mapping::{MappingStatus, build_mapping, field_sources, mapping_report},
    schema::{FieldSchema, MappingMode},
    table::{Align, Table},
};

pub fn execute(args: &MapArgs) -> Result<()> {
    let schema = crate::load_schema(&args.source)?;
    let threshold = crate::resolve_threshold(args.threshold, &schema)?;
    let delimiter = io_utils::resolve_input_delimiter(&args.sheet.input, args.sheet.delimiter);
    let encoding = io_utils::resolve_encoding(args.sheet.input_encoding.as_deref())?;

    let (headers, rows) = io_utils::read_sheet(&args.sheet.input, delimiter, encoding, Some(1))
        .with_context(|| format!("Reading {:?}", args.sheet.input))?;
    // A header-only sheet still has headers worth mapping.
    let sample = rows.into_iter().next().unwrap_or_else(|| {
        headers
            .iter()
            .map(|header| (header.as_str(), CellValue::Empty))
            .collect()
    });

    if crate::resolve_mode(args.field_centric, &schema) == MappingMode::Field {
        return report_fields(&sample, &schema, threshold, args.json);
    }

    let report = mapping_report(&sample, &schema.fields, threshold);
    if args.json {
        print!("{}", io_utils::records_to_json(&report)?);
    } else {
        let mut table = Table::new(["#", "header", "field", "confidence", "status"])
            .align(0, Align::Right)
            .align(3, Align::Right);
        for (idx, entry) in report.iter().enumerate() {
            table.push_row(vec![
                (idx + 1).to_string(),
                entry.header.clone(),
                entry.mapped_to.clone().unwrap_or_default(),
                format!("{:.2}", entry.confidence),
                entry.status.as_str().to_string(),
            ]);
        }
        table.print();
    }

    let mapping = build_mapping(&sample, &schema.fields, threshold);
    let unmatched = report
        .iter()
        .filter(|entry| entry.status == MappingStatus::Unmatched)
        .count();
    let shadowed = report
        .iter()
        .filter(|entry| entry.status == MappingStatus::Shadowed)
        .count();
    info!(
        "Mapped {} of {} column(s) onto '{}' (threshold {threshold:.2}); {unmatched} not recognized, {shadowed} shadowed",
        mapping.len(),
        report.len(),
        schema.entity
    );
    let missing = mapping.unmapped_required(&schema);
    if !missing.is_empty() {
        warn!("Required field(s) without a column: {}", missing.join(", "));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct FieldSourceEntry<'a> {
    field: &'a str,
    column: Option<&'a str>,
    required: bool,
}

/// Field-centric view: which column each field reads from.
fn report_fields(sample: &RawRow, schema: &FieldSchema, threshold: f64, json: bool) -> Result<()> {
    let entries = field_sources(sample, &schema.fields, threshold)
        .into_iter()
        .map(|(field, column)| FieldSourceEntry {
            field,
            column,
            required: schema.field(field).is_some_and(|spec| spec.required),
        })
        .collect::<Vec<_>>();
    if json {
        print!("{}", io_utils::records_to_json(&entries)?);
    } else {
        let mut table = Table::new(["#", "field", "column", "required"]).align(0, Align::Right);
        for (idx, entry) in entries.iter().enumerate() {
            table.push_row(vec![
                (idx + 1).to_string(),
                entry.field.to_string(),
                entry.column.unwrap_or_default().to_string(),
                if entry.required { "yes" } else { "" }.to_string(),
            ]);
        }
        table.print();
    }

    let found = entries.iter().filter(|entry| entry.column.is_some()).count();
    info!(
        "{found} of {} field(s) of '{}' found a column (field mode, threshold {threshold:.2})",
        entries.len(),
        schema.entity
    );
    let missing = entries
        .iter()
        .filter(|entry| entry.required && entry.column.is_none())
        .map(|entry| entry.field)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        warn!("Required field(s) without a column: {}", missing.join(", "));
    }
    Ok(())
}
