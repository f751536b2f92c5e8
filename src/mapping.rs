//! Sheet-wide header mapping.
//!
//! [`build_mapping`] runs the matcher over every header of one sample row and
//! records `header -> field`. A header maps to at most one field and a field
//! accepts at most one header: the first column (in sheet order) to claim a
//! field keeps it, and later columns whose best match is that same field are
//! left unmapped. [`mapping_report`] surfaces those as
//! [`MappingStatus::Shadowed`] so a reviewer can see which column lost.
//!
//! Required-field coverage is not checked here; see
//! [`HeaderMapping::unmapped_required`].

use serde::Serialize;

use crate::{
    data::{CellValue, RawRow},
    matcher::score_header,
    normalize::normalize,
    schema::{FieldSchema, FieldSpec},
    similarity::normalized_similarity,
    trace::{NoTrace, TraceEvent, TraceSink},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub header: String,
    pub field: String,
}

/// Raw header to canonical field, in sheet column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderMapping {
    entries: Vec<MappingEntry>,
}

impl HeaderMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `header -> field` unless either side is already taken.
    /// Returns whether the pair was stored.
    pub fn claim(&mut self, header: impl Into<String>, field: impl Into<String>) -> bool {
        let header = header.into();
        let field = field.into();
        if self.field_for(&header).is_some() || self.header_for(&field).is_some() {
            return false;
        }
        self.entries.push(MappingEntry { header, field });
        true
    }

    pub fn field_for(&self, header: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.header == header)
            .map(|entry| entry.field.as_str())
    }

    pub fn header_for(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.header.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.header.as_str(), entry.field.as_str()))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.field.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Required schema fields that no sheet column maps to.
    pub fn unmapped_required<'a>(&self, schema: &'a FieldSchema) -> Vec<&'a str> {
        schema
            .required_fields()
            .filter(|field| self.header_for(field).is_none())
            .collect()
    }

    /// Sample-row headers that were left out of the mapping.
    pub fn unmapped_headers<'a>(&self, sample: &'a RawRow) -> Vec<&'a str> {
        sample
            .headers()
            .filter(|header| self.field_for(header).is_none())
            .collect()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for HeaderMapping {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut mapping = HeaderMapping::new();
        for (header, field) in iter {
            mapping.claim(header, field);
        }
        mapping
    }
}

pub fn build_mapping(sample: &RawRow, schema: &[FieldSpec], threshold: f64) -> HeaderMapping {
    build_mapping_traced(sample, schema, threshold, &mut NoTrace)
}

pub fn build_mapping_traced(
    sample: &RawRow,
    schema: &[FieldSpec],
    threshold: f64,
    sink: &mut dyn TraceSink,
) -> HeaderMapping {
    sink.trace(&TraceEvent::HeadersFound {
        headers: sample.headers().collect(),
    });
    let mut mapping = HeaderMapping::new();
    for header in sample.headers() {
        let Some(candidate) = score_header(header, schema) else {
            sink.trace(&TraceEvent::HeaderUnmatched {
                header,
                best_score: 0.0,
            });
            continue;
        };
        if !candidate.clears(threshold) {
            sink.trace(&TraceEvent::HeaderUnmatched {
                header,
                best_score: candidate.score,
            });
            continue;
        }
        if let Some(claimed_by) = mapping.header_for(candidate.field) {
            sink.trace(&TraceEvent::HeaderShadowed {
                header,
                field: candidate.field,
                claimed_by,
            });
            continue;
        }
        mapping.claim(header, candidate.field);
        sink.trace(&TraceEvent::HeaderMapped {
            header,
            field: candidate.field,
            score: candidate.score,
        });
    }
    mapping
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    Mapped,
    Unmatched,
    Shadowed,
}

impl MappingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingStatus::Mapped => "mapped",
            MappingStatus::Unmatched => "unmatched",
            MappingStatus::Shadowed => "shadowed",
        }
    }
}

/// One line of the mapping confidence report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingReportEntry {
    pub header: String,
    /// The field the header maps to, or would map to when shadowed.
    pub mapped_to: Option<String>,
    pub confidence: f64,
    pub status: MappingStatus,
}

pub fn mapping_report(
    sample: &RawRow,
    schema: &[FieldSpec],
    threshold: f64,
) -> Vec<MappingReportEntry> {
    let mapping = build_mapping(sample, schema, threshold);
    sample
        .headers()
        .map(|header| {
            let candidate = score_header(header, schema);
            let confidence = candidate.map(|c| c.score).unwrap_or(0.0);
            let (mapped_to, status) = match (mapping.field_for(header), candidate) {
                (Some(field), _) => (Some(field.to_string()), MappingStatus::Mapped),
                (None, Some(c)) if c.clears(threshold) => {
                    (Some(c.field.to_string()), MappingStatus::Shadowed)
                }
                _ => (None, MappingStatus::Unmatched),
            };
            MappingReportEntry {
                header: header.to_string(),
                mapped_to,
                confidence,
                status,
            }
        })
        .collect()
}

/// Field-centric lookup: for each schema field, picks the row header that
/// best matches any of the field's spellings.
///
/// Unlike [`build_mapping`], one header may feed several fields. A field with
/// no header above `threshold` falls back to a header spelled exactly like the
/// field name, and otherwise comes back as [`CellValue::Empty`]. The result is
/// keyed by canonical field name in schema order.
pub fn map_fields(row: &RawRow, schema: &[FieldSpec], threshold: f64) -> RawRow {
    field_sources(row, schema, threshold)
        .into_iter()
        .map(|(field, header)| {
            let value = header
                .and_then(|header| row.get(header))
                .cloned()
                .unwrap_or(CellValue::Empty);
            (field, value)
        })
        .collect()
}

/// The column each field reads from under [`map_fields`], `None` when no
/// header qualifies. Repeated field names keep the first definition.
pub fn field_sources<'a, 'r>(
    row: &'r RawRow,
    schema: &'a [FieldSpec],
    threshold: f64,
) -> Vec<(&'a str, Option<&'r str>)> {
    let headers = row
        .headers()
        .map(|header| (header, normalize(header)))
        .collect::<Vec<_>>();
    let mut sources: Vec<(&'a str, Option<&'r str>)> = Vec::new();
    for spec in schema {
        if sources.iter().any(|(field, _)| *field == spec.field) {
            continue;
        }
        let mut best: Option<(&'r str, f64)> = None;
        for (header, normalized) in &headers {
            for spelling in spec.spellings() {
                let score = normalized_similarity(normalized, &normalize(spelling));
                let beats = best.is_none_or(|(_, current)| score > current);
                if beats && score > 0.0 && score >= threshold {
                    best = Some((*header, score));
                }
            }
        }
        let source = best
            .map(|(header, _)| header)
            .or_else(|| row.headers().find(|header| *header == spec.field));
        sources.push((spec.field.as_str(), source));
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DEFAULT_THRESHOLD;

    fn sample(headers: &[&str]) -> RawRow {
        headers.iter().map(|h| (*h, "x")).collect()
    }

    fn schema() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("registration_number")
                .variations(["registration number", "reg no"])
                .aliases(["reg"]),
            FieldSpec::new("current_location").variations(["current location", "location"]),
            FieldSpec::new("amount").variations(["amount", "cost"]),
        ]
    }

    #[test]
    fn maps_known_headers_and_skips_unknown() {
        let row = sample(&["Reg No", "Location", "Fuel Type"]);
        let mapping = build_mapping(&row, &schema(), DEFAULT_THRESHOLD);
        assert_eq!(mapping.field_for("Reg No"), Some("registration_number"));
        assert_eq!(mapping.field_for("Location"), Some("current_location"));
        assert_eq!(mapping.field_for("Fuel Type"), None);
        assert_eq!(mapping.unmapped_headers(&row), vec!["Fuel Type"]);
    }

    #[test]
    fn first_header_keeps_a_contested_field() {
        let row = sample(&["Current Location", "Location"]);
        let mapping = build_mapping(&row, &schema(), DEFAULT_THRESHOLD);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.header_for("current_location"), Some("Current Location"));

        let report = mapping_report(&row, &schema(), DEFAULT_THRESHOLD);
        assert_eq!(report[1].status, MappingStatus::Shadowed);
        assert_eq!(report[1].mapped_to.as_deref(), Some("current_location"));
        assert_eq!(report[1].confidence, 1.0);
    }

    #[test]
    fn trace_reports_each_decision() {
        let row = sample(&["Reg No", "Location", "Present Location", "Misc"]);
        let mut events = Vec::new();
        {
            let mut sink = |event: &TraceEvent<'_>| events.push(event.to_string());
            build_mapping_traced(&row, &schema(), DEFAULT_THRESHOLD, &mut sink);
        }
        assert_eq!(events.len(), 5);
        assert!(events[1].starts_with("Mapped 'Reg No' -> 'registration_number'"));
        assert!(events[3].contains("already mapped from 'Location'"));
        assert!(events[4].starts_with("No match for 'Misc'"));
    }

    #[test]
    fn unmapped_required_fields_are_listed() {
        let full = FieldSchema::new("vehicle", schema());
        let mut with_required = full.clone();
        with_required.fields[0].required = true;
        let mapping = build_mapping(&sample(&["Amount"]), &full.fields, DEFAULT_THRESHOLD);
        assert!(mapping.unmapped_required(&full).is_empty());
        assert_eq!(
            mapping.unmapped_required(&with_required),
            vec!["registration_number"]
        );
    }

    #[test]
    fn field_centric_mapping_falls_back_to_exact_names() {
        let mut row = RawRow::new();
        row.insert("Reg. No", "KAA001A");
        row.insert("amount", 1200.0);
        let schema = vec![
            FieldSpec::new("registration_number").variations(["reg no"]),
            FieldSpec::new("amount").variations(["purchase price"]),
            FieldSpec::new("notes").variations(["remarks"]),
        ];
        let mapped = map_fields(&row, &schema, DEFAULT_THRESHOLD);
        assert_eq!(
            mapped.headers().collect::<Vec<_>>(),
            vec!["registration_number", "amount", "notes"]
        );
        assert_eq!(
            mapped.get("registration_number"),
            Some(&CellValue::Text("KAA001A".into()))
        );
        assert_eq!(mapped.get("amount"), Some(&CellValue::Number(1200.0)));
        assert_eq!(mapped.get("notes"), Some(&CellValue::Empty));

        let sources = field_sources(&row, &schema, DEFAULT_THRESHOLD);
        assert_eq!(
            sources,
            vec![
                ("registration_number", Some("Reg. No")),
                ("amount", Some("amount")),
                ("notes", None),
            ]
        );
    }

    #[test]
    fn one_header_may_feed_several_fields() {
        let mut row = RawRow::new();
        row.insert("Depreciation", 1500.0);
        let schema = vec![
            FieldSpec::new("annual_depreciation").variations(["Annual Depreciation", "Depreciation"]),
            FieldSpec::new("accumulated_depreciation")
                .variations(["Accumulated Depreciation", "Depreciation"]),
        ];
        let mapped = map_fields(&row, &schema, DEFAULT_THRESHOLD);
        assert_eq!(mapped.get("annual_depreciation"), Some(&CellValue::Number(1500.0)));
        assert_eq!(mapped.get("accumulated_depreciation"), Some(&CellValue::Number(1500.0)));
    }
}
