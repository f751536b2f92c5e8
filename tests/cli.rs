mod common;

use std::fs;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::str::contains;
use sheet_mapper::FieldSchema;

const REGISTER: &str = "\
Reg No.,Make & Model,Colour,Cost,Date of Disposal,Fuel Type
KAA001A,Toyota Hilux,White,3500000,45000,Diesel
KAA001A,Toyota Prado,Silver,5200000,,Petrol
KBB002B,Nissan Navara,Blue,n/a,,Diesel
KCC003C,Isuzu D-Max,Red,4100000,pending,Diesel
";

fn sheet_mapper() -> Command {
    Command::cargo_bin("sheet-mapper").expect("binary exists")
}

#[test]
fn map_prints_a_confidence_table() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("register.csv", REGISTER);
    sheet_mapper()
        .args(["map", "-i", input.to_str().unwrap(), "--builtin", "vehicle"])
        .assert()
        .success()
        .stdout(contains("registration_number"))
        .stdout(contains("make_model"))
        .stdout(contains("unmatched"));
}

#[test]
fn map_emits_json_report() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("register.csv", REGISTER);
    let output = sheet_mapper()
        .args([
            "map",
            "-i",
            input.to_str().unwrap(),
            "--builtin",
            "vehicle",
            "--json",
        ])
        .output()
        .expect("run map");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    let entries = report.as_array().expect("array");
    assert_eq!(entries.len(), 6);
    assert_eq!(entries[0]["mapped_to"], "registration_number");
    assert_eq!(entries[5]["status"], "unmatched");
}

#[test]
fn import_blocks_on_duplicate_keys() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("register.csv", REGISTER);
    sheet_mapper()
        .args(["import", "-i", input.to_str().unwrap(), "--builtin", "vehicle"])
        .assert()
        .failure()
        .stderr(contains("Import blocked: 1 record(s) share a key"));
}

#[test]
fn import_auto_fixes_and_skips_existing_keys() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("register.csv", REGISTER);
    let existing = workspace.write("existing.json", r#"["KBB002B"]"#);
    let output_path = workspace.path().join("committed.json");
    sheet_mapper()
        .args([
            "import",
            "-i",
            input.to_str().unwrap(),
            "--builtin",
            "vehicle",
            "-e",
            existing.to_str().unwrap(),
            "--auto-fix",
            "-o",
            output_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let contents = fs::read_to_string(&output_path).expect("read output");
    let records: serde_json::Value = serde_json::from_str(&contents).expect("parse output");
    let records = records.as_array().expect("array");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["registration_number"], "KAA001A");
    assert_eq!(records[0]["amount"], 3500000.0);
    assert_eq!(records[0]["date_of_disposal"], "2023-03-15");
    assert_eq!(records[1]["registration_number"], "KAA001A-1");
    assert!(records[1].get("date_of_disposal").is_none());
    assert_eq!(records[2]["registration_number"], "KCC003C");
    assert_eq!(records[2]["date_of_disposal"], "pending");
    assert!(records.iter().all(|r| r.get("Fuel Type").is_none()));
}

#[test]
fn import_writes_csv_with_mapped_columns() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "register.csv",
        "Registration Number,Colour,Odometer\nKAA001A,White,120000\nKBB002B,,98000\n",
    );
    sheet_mapper()
        .args([
            "import",
            "-i",
            input.to_str().unwrap(),
            "--builtin",
            "vehicle",
            "--format",
            "csv",
        ])
        .assert()
        .success()
        .stdout("registration_number,color\nKAA001A,White\nKBB002B,\n");
}

#[test]
fn import_reads_keys_from_a_custom_schema() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write(
        "furniture.yaml",
        "entity: furniture\nnatural_key: tag_number\nfields:\n  - field: tag_number\n    variations: [tag no, asset tag]\n    required: true\n  - field: description\n    variations: [item, description]\n",
    );
    let input = workspace.write(
        "furniture.tsv",
        "Asset Tag\tItem\nF-001\tDesk\nF-001\tChair\n",
    );
    sheet_mapper()
        .args([
            "import",
            "-i",
            input.to_str().unwrap(),
            "-s",
            schema.to_str().unwrap(),
            "--auto-fix",
        ])
        .assert()
        .success()
        .stdout(contains("\"F-001-1\""))
        .stdout(contains("\"Chair\""));
}

const BUILDINGS: &str = "\
Bldg No,Building Name,County,Purchase Date,Plinth Area,Cost
B-001,Head Office,Nairobi,45000,1200.5,25000000
B-002,Annex,Kisumu,2019-07-01,,8000000
B-001,Store,Nairobi,,300,
";

#[test]
fn import_building_register_field_by_field() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("buildings.csv", BUILDINGS);
    let existing = workspace.write("existing.txt", "B-002\n");
    let output = sheet_mapper()
        .args([
            "import",
            "-i",
            input.to_str().unwrap(),
            "--builtin",
            "building",
            "-e",
            existing.to_str().unwrap(),
            "--auto-fix",
        ])
        .output()
        .expect("run import");
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    let records = records.as_array().expect("array");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["building_no"], "B-001");
    assert_eq!(records[0]["description_name_of_building"], "Head Office");
    assert_eq!(records[0]["date_of_purchase_or_commissioning"], "2023-03-15");
    assert_eq!(records[0]["plinth_area"], 1200.5);
    assert_eq!(records[0]["cost_of_construction_or_valuation"], 25000000.0);
    // one column may feed several fields
    assert_eq!(records[0]["county"], "Nairobi");
    assert_eq!(records[0]["sub_county"], "Nairobi");
    assert_eq!(records[1]["building_no"], "B-001-1");
    assert!(records[1].get("cost_of_construction_or_valuation").is_none());
}

#[test]
fn map_building_lists_the_column_for_each_field() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("buildings.csv", BUILDINGS);
    sheet_mapper()
        .args(["map", "-i", input.to_str().unwrap(), "--builtin", "building"])
        .assert()
        .success()
        .stdout(contains("building_no"))
        .stdout(contains("Bldg No"))
        .stdout(contains("remarks"));
}

#[test]
fn field_centric_flag_applies_to_any_schema() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("register.csv", REGISTER);
    let output = sheet_mapper()
        .args([
            "map",
            "-i",
            input.to_str().unwrap(),
            "--builtin",
            "vehicle",
            "--field-centric",
            "--json",
        ])
        .output()
        .expect("run map");
    assert!(output.status.success());
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    let entries = entries.as_array().expect("array");
    assert_eq!(entries.len(), 23);
    assert_eq!(entries[0]["field"], "registration_number");
    assert_eq!(entries[0]["column"], "Reg No.");
    assert_eq!(entries[0]["required"], true);
}

#[test]
fn unknown_builtin_reports_available_schemas() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("register.csv", REGISTER);
    sheet_mapper()
        .args(["map", "-i", input.to_str().unwrap(), "--builtin", "boats"])
        .assert()
        .failure()
        .stderr(contains("unknown built-in schema 'boats' (available: vehicle, building)"));
}

#[test]
fn schema_exports_yaml_and_template() {
    let workspace = TestWorkspace::new();
    let yaml_path = workspace.path().join("vehicle.yaml");
    let template_path = workspace.path().join("template.csv");
    sheet_mapper()
        .args([
            "schema",
            "--builtin",
            "vehicle",
            "--export",
            yaml_path.to_str().unwrap(),
            "--template",
            template_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("registration_number"));

    let exported = FieldSchema::load(&yaml_path).expect("load exported schema");
    assert_eq!(exported.natural_key.as_deref(), Some("registration_number"));
    let template = fs::read_to_string(&template_path).expect("read template");
    assert!(template.starts_with("Registration Number,Tag Number,"));
}

#[test]
fn schema_and_builtin_are_mutually_exclusive() {
    sheet_mapper()
        .args(["schema", "--builtin", "vehicle", "-s", "vehicle.yaml"])
        .assert()
        .failure();
}
