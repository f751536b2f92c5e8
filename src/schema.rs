//! Field schema model and YAML persistence.
//!
//! A [`FieldSchema`] lists the canonical fields of one entity type together
//! with every header spelling the sheet owner might use for them. Schemas are
//! static configuration: loaded once at import start and never mutated by the
//! matching passes.
//!
//! ```yaml
//! entity: vehicle
//! natural_key: registration_number
//! threshold: 0.6
//! fields:
//!   - field: registration_number
//!     variations: ["registration number", "reg no"]
//!     aliases: ["reg", "plate"]
//!     required: true
//!   - field: amount
//!     datatype: number
//!     variations: ["amount", "purchase cost"]
//! ```
//!
//! `mode: field` switches the import to field-centric lookup (see
//! [`map_fields`](crate::mapping::map_fields)), where each field picks its
//! own best column and one column may feed several fields.

use std::{
    collections::{BTreeMap, HashSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{data::FieldType, error::ImportError};

pub const BUILTIN_SCHEMAS: &[&str] = &["vehicle", "building"];

/// How sheet columns are paired with schema fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// Each header claims its best field; a field takes the first header.
    #[default]
    Header,
    /// Each field picks its best header, independently of the others.
    Field,
}

impl MappingMode {
    pub fn is_header(&self) -> bool {
        *self == MappingMode::Header
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MappingMode::Header => "header",
            MappingMode::Field => "field",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub datatype: FieldType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(field: impl Into<String>) -> Self {
        FieldSpec {
            field: field.into(),
            variations: Vec::new(),
            aliases: Vec::new(),
            datatype: FieldType::String,
            required: false,
        }
    }

    pub fn variations<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variations = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn aliases<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn datatype(mut self, datatype: FieldType) -> Self {
        self.datatype = datatype;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Variations followed by aliases, the order in which the matcher scores them.
    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        self.variations
            .iter()
            .chain(self.aliases.iter())
            .map(String::as_str)
    }
}

pub type TypeHints = BTreeMap<String, FieldType>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "MappingMode::is_header")]
    pub mode: MappingMode,
    pub fields: Vec<FieldSpec>,
}

impl FieldSchema {
    pub fn new(entity: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        FieldSchema {
            entity: entity.into(),
            natural_key: None,
            threshold: None,
            mode: MappingMode::Header,
            fields,
        }
    }

    pub fn with_natural_key(mut self, key: impl Into<String>) -> Self {
        self.natural_key = Some(key.into());
        self
    }

    /// First definition wins when a field name repeats.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.field == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.field.as_str())
    }

    /// Datatypes per field for the row transformer. Repeated names keep the
    /// first definition's type.
    pub fn type_hints(&self) -> TypeHints {
        let mut hints = TypeHints::new();
        for spec in &self.fields {
            hints.entry(spec.field.clone()).or_insert(spec.datatype);
        }
        hints
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        let mut seen = HashSet::new();
        for spec in &self.fields {
            if spec.field.trim().is_empty() {
                return Err(ImportError::EmptyFieldName {
                    entity: self.entity.clone(),
                });
            }
            if !seen.insert(spec.field.as_str()) {
                return Err(ImportError::DuplicateField {
                    entity: self.entity.clone(),
                    field: spec.field.clone(),
                });
            }
        }
        if let Some(key) = &self.natural_key {
            self.ensure_field(key)?;
        }
        if let Some(threshold) = self.threshold {
            validate_threshold(threshold)?;
        }
        Ok(())
    }

    pub fn ensure_field(&self, name: &str) -> Result<(), ImportError> {
        if self.field(name).is_some() {
            Ok(())
        } else {
            Err(ImportError::UnknownNaturalKey {
                entity: self.entity.clone(),
                key: name.to_string(),
            })
        }
    }

    /// Resolves the reconciliation key, preferring an explicit override.
    pub fn resolve_natural_key(&self, explicit: Option<&str>) -> Result<String, ImportError> {
        let key = explicit
            .or(self.natural_key.as_deref())
            .ok_or_else(|| ImportError::MissingNaturalKey(self.entity.clone()))?;
        self.ensure_field(key)?;
        Ok(key.to_string())
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let schema: FieldSchema = serde_yaml::from_str(input).context("Parsing schema YAML")?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing schema to YAML string")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema: FieldSchema =
            serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
        schema
            .validate()
            .with_context(|| format!("Validating schema file {path:?}"))?;
        Ok(schema)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }

    pub fn builtin(name: &str) -> Result<Self, ImportError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "vehicle" | "vehicles" => Ok(vehicle_schema()),
            "building" | "buildings" => Ok(building_schema()),
            _ => Err(ImportError::UnknownBuiltin {
                name: name.to_string(),
                available: BUILTIN_SCHEMAS.join(", "),
            }),
        }
    }
}

pub fn validate_threshold(threshold: f64) -> Result<(), ImportError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ImportError::InvalidThreshold(threshold))
    }
}

/// Header spellings seen on fleet registers.
pub fn vehicle_schema() -> FieldSchema {
    let fields = vec![
        FieldSpec::new("registration_number")
            .variations([
                "registration_number",
                "registration number",
                "reg number",
                "reg no",
                "regno",
                "registration no",
                "vehicle registration",
                "vehicle reg",
                "plate number",
                "license plate",
            ])
            .aliases(["reg", "registration", "plate"])
            .required(),
        FieldSpec::new("tag_number")
            .variations([
                "tag_number",
                "tag number",
                "tag no",
                "tagno",
                "asset tag",
                "tag",
                "asset number",
            ])
            .aliases(["tag", "asset_tag"]),
        FieldSpec::new("financed_by")
            .variations([
                "financed_by",
                "financed by",
                "financing source",
                "source of funds",
                "funded by",
                "finance source",
            ])
            .aliases(["financed", "funding", "source"]),
        FieldSpec::new("make_model")
            .variations([
                "make_model",
                "make model",
                "make/model",
                "make & model",
                "make and model",
                "vehicle make",
                "model",
                "make",
            ])
            .aliases(["make", "model", "vehicle"]),
        FieldSpec::new("year_of_purchase")
            .variations([
                "year_of_purchase",
                "year of purchase",
                "purchase year",
                "year purchased",
                "acquisition year",
                "year",
            ])
            .aliases(["year", "purchase_year"]),
        FieldSpec::new("engine_number")
            .variations([
                "engine_number",
                "engine number",
                "engine no",
                "engineno",
                "engine #",
            ])
            .aliases(["engine", "engine_no"]),
        FieldSpec::new("chassis_number")
            .variations([
                "chassis_number",
                "chassis number",
                "chassis no",
                "chassisno",
                "chassis #",
                "vin",
                "vehicle identification number",
            ])
            .aliases(["chassis", "chassis_no", "vin"]),
        FieldSpec::new("pv_number")
            .variations(["pv_number", "pv number", "pv no", "pvno", "pv #"])
            .aliases(["pv", "pv_no"]),
        FieldSpec::new("color")
            .variations(["color", "colour", "vehicle color", "vehicle colour"])
            .aliases(["color", "colour"]),
        FieldSpec::new("original_location")
            .variations([
                "original_location",
                "original location",
                "initial location",
                "starting location",
                "first location",
            ])
            .aliases(["original", "initial_location"]),
        FieldSpec::new("current_location")
            .variations([
                "current_location",
                "current location",
                "present location",
                "location",
            ])
            .aliases(["current", "location"]),
        FieldSpec::new("amount")
            .variations([
                "amount",
                "purchase amount",
                "cost",
                "purchase cost",
                "price",
                "purchase price",
                "value",
            ])
            .aliases(["amount", "cost", "price"])
            .datatype(FieldType::Number),
        FieldSpec::new("depreciation_rate")
            .variations([
                "depreciation_rate",
                "depreciation rate",
                "depreciation %",
                "depreciation percent",
                "dep rate",
                "rate",
            ])
            .aliases(["depreciation", "rate"])
            .datatype(FieldType::Number),
        FieldSpec::new("annual_depreciation")
            .variations([
                "annual_depreciation",
                "annual depreciation",
                "yearly depreciation",
                "depreciation per year",
            ])
            .aliases(["annual", "yearly_depreciation"])
            .datatype(FieldType::Number),
        FieldSpec::new("accumulated_depreciation")
            .variations([
                "accumulated_depreciation",
                "accumulated depreciation",
                "total depreciation",
                "cumulative depreciation",
            ])
            .aliases(["accumulated", "total_depreciation"])
            .datatype(FieldType::Number),
        FieldSpec::new("net_book_value")
            .variations([
                "net_book_value",
                "net book value",
                "nbv",
                "book value",
                "current value",
            ])
            .aliases(["nbv", "book_value"])
            .datatype(FieldType::Number),
        FieldSpec::new("disposal_value")
            .variations([
                "disposal_value",
                "disposal value",
                "salvage value",
                "residual value",
                "scrap value",
            ])
            .aliases(["disposal", "salvage"])
            .datatype(FieldType::Number),
        FieldSpec::new("replacement_date")
            .variations([
                "replacement_date",
                "replacement date",
                "date of replacement",
                "replace date",
            ])
            .aliases(["replacement", "replace_date"])
            .datatype(FieldType::Date),
        FieldSpec::new("date_of_disposal")
            .variations([
                "date_of_disposal",
                "date of disposal",
                "disposal date",
                "disposed date",
            ])
            .aliases(["disposal_date", "disposed"])
            .datatype(FieldType::Date),
        FieldSpec::new("responsible_officer")
            .variations([
                "responsible_officer",
                "responsible officer",
                "officer",
                "assigned to",
                "assigned officer",
                "custodian",
            ])
            .aliases(["officer", "custodian", "assigned"]),
        FieldSpec::new("asset_condition")
            .variations([
                "asset_condition",
                "asset condition",
                "condition",
                "status",
                "state",
            ])
            .aliases(["condition", "status"]),
        FieldSpec::new("has_logbook")
            .variations([
                "has_logbook",
                "has logbook",
                "logbook",
                "log book",
                "has log book",
                "logbook available",
            ])
            .aliases(["logbook", "log_book"]),
        FieldSpec::new("notes")
            .variations([
                "notes",
                "note",
                "comments",
                "comment",
                "remarks",
                "remark",
                "description",
            ])
            .aliases(["notes", "comments", "remarks"]),
    ];
    FieldSchema {
        entity: "vehicle".to_string(),
        natural_key: Some("registration_number".to_string()),
        threshold: None,
        mode: MappingMode::Header,
        fields,
    }
}

/// Building register columns. Imported field by field, keyed on `building_no`.
pub fn building_schema() -> FieldSchema {
    let fields = vec![
        FieldSpec::new("description_name_of_building").variations([
            "Description Name of Building",
            "Building Name",
            "Name",
        ]),
        FieldSpec::new("building_ownership").variations(["Building Ownership", "Ownership"]),
        FieldSpec::new("category").variations(["Category"]),
        FieldSpec::new("building_no")
            .variations(["Building No", "Building Number", "Bldg No"])
            .required(),
        FieldSpec::new("institution_no").variations([
            "Institution No",
            "Institution Number",
            "Inst No",
        ]),
        FieldSpec::new("nearest_town_shopping_centre").variations([
            "Nearest Town Shopping Centre",
            "Nearest Town",
            "Town",
        ]),
        FieldSpec::new("street").variations(["Street"]),
        FieldSpec::new("county").variations(["County"]),
        FieldSpec::new("sub_county").variations(["Sub County", "Subcounty"]),
        FieldSpec::new("division").variations(["Division"]),
        FieldSpec::new("location").variations(["Location"]),
        FieldSpec::new("sub_location").variations(["Sub Location", "Sublocation"]),
        FieldSpec::new("lr_no").variations(["LR No", "LR Number", "Land Reference"]),
        FieldSpec::new("size_of_land_ha")
            .variations(["Size of Land Ha", "Land Size", "Size Ha"])
            .datatype(FieldType::Number),
        FieldSpec::new("ownership_status").variations(["Ownership Status", "Status"]),
        FieldSpec::new("source_of_funds").variations(["Source of Funds", "Funding Source"]),
        FieldSpec::new("mode_of_acquisition")
            .variations(["Mode of Acquisition", "Acquisition Mode"]),
        FieldSpec::new("date_of_purchase_or_commissioning")
            .variations([
                "Date of Purchase or Commissioning",
                "Purchase Date",
                "Date",
            ])
            .datatype(FieldType::Date),
        FieldSpec::new("type_of_building").variations(["Type of Building", "Building Type"]),
        FieldSpec::new("designated_use").variations(["Designated Use", "Use"]),
        FieldSpec::new("estimated_useful_life")
            .variations(["Estimated Useful Life", "Useful Life", "Life Years"])
            .datatype(FieldType::Number),
        FieldSpec::new("no_of_floors")
            .variations(["No of Floors", "Floors", "Number of Floors"])
            .datatype(FieldType::Number),
        FieldSpec::new("plinth_area")
            .variations(["Plinth Area", "Area"])
            .datatype(FieldType::Number),
        FieldSpec::new("cost_of_construction_or_valuation")
            .variations(["Cost of Construction or Valuation", "Cost", "Valuation"])
            .datatype(FieldType::Number),
        FieldSpec::new("annual_depreciation")
            .variations(["Annual Depreciation", "Depreciation"])
            .datatype(FieldType::Number),
        FieldSpec::new("accumulated_depreciation_to_date")
            .variations([
                "Accumulated Depreciation to Date",
                "Accumulated Depreciation",
            ])
            .datatype(FieldType::Number),
        FieldSpec::new("net_book_value")
            .variations(["Net Book Value", "Book Value", "NBV"])
            .datatype(FieldType::Number),
        FieldSpec::new("annual_rental_income")
            .variations(["Annual Rental Income", "Rental Income"])
            .datatype(FieldType::Number),
        FieldSpec::new("remarks").variations(["Remarks", "Notes", "Comments"]),
    ];
    FieldSchema {
        entity: "building".to_string(),
        natural_key: Some("building_no".to_string()),
        threshold: None,
        mode: MappingMode::Field,
        fields,
    }
}
