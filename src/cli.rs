use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Map spreadsheet columns onto a schema and reconcile bulk imports",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show how each column of a sheet maps onto the schema
    Map(MapArgs),
    /// Map, transform, and reconcile a sheet, writing the committable records
    Import(ImportArgs),
    /// List the fields of a schema, or export it as YAML or a blank template
    Schema(SchemaArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SchemaSource {
    /// YAML schema file describing canonical fields and header spellings
    #[arg(short = 's', long = "schema", conflicts_with = "builtin")]
    pub schema: Option<PathBuf>,
    /// Use a built-in schema instead of a file (e.g. `vehicle`)
    #[arg(long = "builtin", required_unless_present = "schema")]
    pub builtin: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct SheetInput {
    /// Input sheet (CSV/TSV, `-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Field delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub sheet: SheetInput,
    #[command(flatten)]
    pub source: SchemaSource,
    /// Minimum similarity for a header to map (defaults to the schema's, then 0.6)
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    /// Let each field pick its own best column instead of each column its field
    #[arg(long = "field-centric")]
    pub field_centric: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub sheet: SheetInput,
    #[command(flatten)]
    pub source: SchemaSource,
    /// Minimum similarity for a header to map (defaults to the schema's, then 0.6)
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Canonical field used as the natural key (defaults to the schema's)
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,
    /// Keys already present in the backend: a JSON array or one key per line
    #[arg(short = 'e', long = "existing")]
    pub existing: Option<PathBuf>,
    /// Let each field pick its own best column instead of each column its field
    #[arg(long = "field-centric")]
    pub field_centric: bool,
    /// Rename in-batch duplicate keys with numeric suffixes before committing
    #[arg(long = "auto-fix")]
    pub auto_fix: bool,
    /// Output file for committed records (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format for committed records
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: OutputFormat,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub source: SchemaSource,
    /// Write the schema as YAML to this path
    #[arg(long)]
    pub export: Option<PathBuf>,
    /// Write a blank CSV template with title-cased headers to this path
    #[arg(long)]
    pub template: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
