use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};

use crate::{
    cli::{ImportArgs, OutputFormat},
    error::CommitBlocked,
    io_utils,
    mapping::field_sources,
    reconcile::ImportBatch,
    schema::MappingMode,
    trace::LogSink,
    transform::process_rows_with_mode,
};

pub fn execute(args: &ImportArgs) -> Result<()> {
    let schema = crate::load_schema(&args.source)?;
    let threshold = crate::resolve_threshold(args.threshold, &schema)?;
    let key_field = schema.resolve_natural_key(args.key.as_deref())?;
    let mode = crate::resolve_mode(args.field_centric, &schema);
    let delimiter = io_utils::resolve_input_delimiter(&args.sheet.input, args.sheet.delimiter);
    let input_encoding = io_utils::resolve_encoding(args.sheet.input_encoding.as_deref())?;
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;

    info!(
        "Importing '{}' as '{}' keyed on '{key_field}' (delimiter '{}')",
        args.sheet.input.display(),
        schema.entity,
        crate::printable_delimiter(delimiter)
    );
    let (_, rows) = io_utils::read_sheet(&args.sheet.input, delimiter, input_encoding, None)
        .with_context(|| format!("Reading {:?}", args.sheet.input))?;

    let mut sink = LogSink;
    let (mapping, records) = process_rows_with_mode(&rows, &schema, threshold, mode, &mut sink);
    let unmapped: Vec<&str> = match (mode, rows.first()) {
        (MappingMode::Field, Some(sample)) => {
            let sources = field_sources(sample, &schema.fields, threshold);
            for (field, header) in &sources {
                match header {
                    Some(header) => debug!("Field '{field}' reads column '{header}'"),
                    None => debug!("Field '{field}' has no column"),
                }
            }
            sources
                .iter()
                .filter(|(field, header)| {
                    header.is_none() && schema.field(field).is_some_and(|spec| spec.required)
                })
                .map(|(field, _)| *field)
                .collect()
        }
        (MappingMode::Field, None) => Vec::new(),
        (MappingMode::Header, _) => mapping.unmapped_required(&schema),
    };
    info!(
        "Mapped {} field(s) ({} mode); transformed {} row(s)",
        mapping.len(),
        mode.as_str(),
        records.len()
    );
    if !unmapped.is_empty() {
        warn!("Required field(s) without a column: {}", unmapped.join(", "));
    }

    let existing_keys = match &args.existing {
        Some(path) => io_utils::load_existing_keys(path, input_encoding)
            .with_context(|| format!("Loading existing keys from {path:?}"))?,
        None => HashSet::new(),
    };
    let mut batch = ImportBatch::new(records, key_field, existing_keys);
    for rejected in batch.rejected() {
        warn!(
            "Skipping row {}: '{}' already exists",
            rejected.source_index + 1,
            rejected.key
        );
    }

    if args.auto_fix && !batch.duplicate_indices().is_empty() {
        let renamed = batch.auto_fix_traced(&mut sink);
        info!("Renamed {renamed} duplicate key(s)");
    }

    let committed = match batch.commit(&schema) {
        Ok(records) => records,
        Err(blocked) => {
            report_blocked(&batch, &schema, &blocked);
            bail!("Import blocked: {blocked}");
        }
    };

    let rendered = match args.format {
        OutputFormat::Json => io_utils::records_to_json(committed)?,
        OutputFormat::Csv => {
            let columns = mapping.fields().collect::<Vec<_>>();
            io_utils::records_to_csv(committed, &columns, b',')?
        }
    };
    io_utils::write_text(args.output.as_deref(), &rendered, output_encoding)?;

    let destination = args
        .output
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());
    info!(
        "Committed {} record(s), skipped {} existing -> {destination}",
        committed.len(),
        batch.rejected().len()
    );
    Ok(())
}

fn report_blocked(batch: &ImportBatch, schema: &crate::schema::FieldSchema, blocked: &CommitBlocked) {
    match blocked {
        CommitBlocked::DuplicateKeys(_) => {
            for &index in batch.duplicate_indices() {
                let key = batch.records()[index]
                    .text(batch.key_field())
                    .unwrap_or_default();
                let row = batch.origin(index).unwrap_or(index) + 1;
                warn!("Record {row} repeats key '{key}'");
            }
            warn!("Re-run with --auto-fix to rename duplicates");
        }
        CommitBlocked::MissingValues(_) => {
            for missing in batch.validate(schema) {
                let row = batch.origin(missing.index).unwrap_or(missing.index) + 1;
                warn!("Record {row} is missing '{}'", missing.field);
            }
        }
    }
}
