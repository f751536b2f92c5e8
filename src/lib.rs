pub mod cli;
pub mod data;
pub mod error;
pub mod import_cmd;
pub mod io_utils;
pub mod map_cmd;
pub mod mapping;
pub mod matcher;
pub mod normalize;
pub mod reconcile;
pub mod schema;
pub mod schema_cmd;
pub mod similarity;
pub mod table;
pub mod trace;
pub mod transform;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug};

pub use crate::data::{CanonicalRecord, CellValue, FieldType, FieldValue, RawRow};
pub use crate::error::{CommitBlocked, ImportError};
pub use crate::mapping::{HeaderMapping, build_mapping, mapping_report};
pub use crate::matcher::{DEFAULT_THRESHOLD, best_match};
pub use crate::normalize::normalize;
pub use crate::reconcile::{ImportBatch, ReconciliationResult, auto_fix_duplicates, reconcile};
pub use crate::schema::{FieldSchema, FieldSpec, MappingMode};
pub use crate::similarity::similarity;
pub use crate::transform::{process_rows, process_rows_by_field, transform_row};

use crate::cli::{Cli, Commands, SchemaSource};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_mapper", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Map(args) => map_cmd::execute(&args),
        Commands::Import(args) => import_cmd::execute(&args),
        Commands::Schema(args) => schema_cmd::execute(&args),
    }
}

pub(crate) fn load_schema(source: &SchemaSource) -> Result<FieldSchema> {
    let schema = match (&source.schema, &source.builtin) {
        (Some(path), _) => {
            FieldSchema::load(path).with_context(|| format!("Loading schema from {path:?}"))?
        }
        (None, Some(name)) => FieldSchema::builtin(name)?,
        (None, None) => anyhow::bail!("Either --schema or --builtin is required"),
    };
    debug!(
        "Schema '{}' with {} field(s), natural key {:?}",
        schema.entity,
        schema.fields.len(),
        schema.natural_key
    );
    Ok(schema)
}

/// The `--threshold` flag wins over the schema's own, which wins over the default.
pub(crate) fn resolve_threshold(flag: Option<f64>, schema: &FieldSchema) -> Result<f64> {
    let threshold = flag.or(schema.threshold).unwrap_or(DEFAULT_THRESHOLD);
    schema::validate_threshold(threshold)?;
    Ok(threshold)
}

/// `--field-centric` forces field mode; otherwise the schema decides.
pub(crate) fn resolve_mode(field_centric: bool, schema: &FieldSchema) -> MappingMode {
    if field_centric {
        MappingMode::Field
    } else {
        schema.mode
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
