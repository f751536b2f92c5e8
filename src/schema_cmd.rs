//! Schema listing and export.
//!
//! Renders a schema's fields as a table, and optionally writes the schema as
//! YAML or a blank CSV template whose headers are the title-cased field names.

use anyhow::{Context, Result};
use heck::ToTitleCase;
use log::info;

use crate::{
    cli::SchemaArgs,
    schema::FieldSchema,
    table::{Align, Table},
};

pub fn execute(args: &SchemaArgs) -> Result<()> {
    let schema = crate::load_schema(&args.source)?;

    let mut table = Table::new(["#", "field", "type", "required", "spellings"])
        .align(0, Align::Right)
        .align(4, Align::Right);
    for (idx, spec) in schema.fields.iter().enumerate() {
        let mut required = if spec.required { "yes" } else { "" }.to_string();
        if schema.natural_key.as_deref() == Some(spec.field.as_str()) {
            required.push_str(if required.is_empty() { "key" } else { " (key)" });
        }
        table.push_row(vec![
            (idx + 1).to_string(),
            spec.field.clone(),
            spec.datatype.to_string(),
            required,
            spec.spellings().count().to_string(),
        ]);
    }
    table.print();

    if let Some(path) = &args.export {
        schema
            .save(path)
            .with_context(|| format!("Writing schema to {path:?}"))?;
        info!("Schema '{}' written to {path:?}", schema.entity);
    }
    if let Some(path) = &args.template {
        let headers = template_headers(&schema);
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Creating template {path:?}"))?;
        writer
            .write_record(&headers)
            .context("Writing template headers")?;
        writer.flush().context("Flushing template")?;
        info!(
            "Template with {} column(s) written to {path:?}",
            headers.len()
        );
    }
    Ok(())
}

/// `registration_number` becomes `Registration Number`, which maps straight
/// back onto the field.
pub fn template_headers(schema: &FieldSchema) -> Vec<String> {
    schema
        .fields
        .iter()
        .map(|spec| spec.field.to_title_case())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mapping::build_mapping, matcher::DEFAULT_THRESHOLD, schema::vehicle_schema};

    #[test]
    fn template_headers_map_back_onto_their_fields() {
        let schema = vehicle_schema();
        let headers = template_headers(&schema);
        assert_eq!(headers[0], "Registration Number");
        let sample = headers
            .iter()
            .map(|h| (h.as_str(), "x"))
            .collect::<crate::data::RawRow>();
        let mapping = build_mapping(&sample, &schema.fields, DEFAULT_THRESHOLD);
        assert_eq!(mapping.len(), schema.fields.len());
        for (header, field) in mapping.iter() {
            assert_eq!(header, field.to_title_case());
        }
    }
}
