use sheet_mapper::{
    CellValue, FieldType, FieldValue, HeaderMapping, RawRow,
    data::{serial_to_date, serial_to_iso_date},
    process_rows,
    reconcile::record_key,
    schema::vehicle_schema,
    transform::coerce_cell,
    transform_row,
};

#[test]
fn serial_dates_convert_to_iso_days() {
    assert_eq!(serial_to_iso_date(45000.0).as_deref(), Some("2023-03-15"));
    assert_eq!(serial_to_iso_date(25569.0).as_deref(), Some("1970-01-01"));
    // time of day is discarded
    assert_eq!(serial_to_iso_date(44197.75).as_deref(), Some("2021-01-01"));
    assert_eq!(serial_to_date(f64::INFINITY), None);
}

#[test]
fn number_fields_accept_text_with_units() {
    assert_eq!(
        coerce_cell(&CellValue::from("12.5 %"), FieldType::Number),
        Some(FieldValue::Number(12.5))
    );
    assert_eq!(coerce_cell(&CellValue::from("abc"), FieldType::Number), None);
    assert_eq!(coerce_cell(&CellValue::Empty, FieldType::Date), None);
}

#[test]
fn keys_survive_the_transform_as_strings() {
    let mapping: HeaderMapping = [("Reg", "registration_number"), ("PV", "pv_number")]
        .into_iter()
        .collect();
    let hints = vehicle_schema().type_hints();
    let row: RawRow = [
        ("Reg", CellValue::from(" KAA001A ")),
        ("PV", CellValue::Number(1042.0)),
    ]
    .into_iter()
    .collect();
    let record = transform_row(&row, &mapping, &hints);
    assert_eq!(
        record_key(&record, "registration_number").as_deref(),
        Some("KAA001A")
    );
    assert_eq!(record.get("pv_number"), Some(&FieldValue::Text("1042".into())));
}

#[test]
fn dates_and_amounts_follow_the_vehicle_schema() {
    let rows: Vec<RawRow> = vec![
        [
            ("Registration Number", CellValue::from("KAA001A")),
            ("Purchase Cost", CellValue::Number(2_500_000.0)),
            ("Date of Disposal", CellValue::Number(45000.0)),
        ]
        .into_iter()
        .collect(),
        [
            ("Registration Number", CellValue::from("KBB002B")),
            ("Purchase Cost", CellValue::from("")),
            ("Date of Disposal", CellValue::from("pending")),
        ]
        .into_iter()
        .collect(),
    ];
    let (mapping, records) = process_rows(&rows, &vehicle_schema(), 0.6);
    assert_eq!(mapping.len(), 3);
    assert_eq!(records[0].get("amount"), Some(&FieldValue::Number(2_500_000.0)));
    assert_eq!(
        records[0].get("date_of_disposal"),
        Some(&FieldValue::Date("2023-03-15".into()))
    );
    assert_eq!(records[1].get("amount"), None);
    assert_eq!(
        records[1].get("date_of_disposal"),
        Some(&FieldValue::Date("pending".into()))
    );

    let json = serde_json::to_value(&records[1]).expect("serialize record");
    assert_eq!(
        json,
        serde_json::json!({
            "registration_number": "KBB002B",
            "date_of_disposal": "pending"
        })
    );
}
