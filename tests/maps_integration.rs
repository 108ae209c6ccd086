use std::collections::HashMap;

use xsv_bind::{
    BindError, SchemaError,
    core::config::CsvFormat,
    item::maps::{MapRow, csv_to_map, csv_to_maps, read_map, write_maps},
};

#[test]
fn two_column_file_becomes_a_dictionary() {
    let data = "code,label
FR,France
DE,Germany
";

    let map = csv_to_map(data.as_bytes()).unwrap();

    assert_eq!(
        map,
        HashMap::from([
            ("FR".to_string(), "France".to_string()),
            ("DE".to_string(), "Germany".to_string()),
        ])
    );
}

#[test]
fn typed_dictionaries_convert_keys_and_values() {
    let data = "id\tscores\n1\t[10,20]\n2\t[]\n";

    let map: HashMap<u16, Vec<f64>> = read_map(data.as_bytes(), &CsvFormat::tsv()).unwrap();

    assert_eq!(map[&1], vec![10.0, 20.0]);
    assert!(map[&2].is_empty());
}

#[test]
fn dictionaries_need_exactly_two_columns() {
    let err = csv_to_map("only\n1\n".as_bytes()).unwrap_err();

    assert!(matches!(
        err,
        BindError::Schema(SchemaError::TwoColumnsRequired { found: 1 })
    ));
}

#[test]
fn rows_become_header_keyed_maps() {
    let data = "name,age
Alice,28
Bob,35
";

    let rows = csv_to_maps(data.as_bytes()).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "Alice");
    assert_eq!(rows[1]["age"], "35");
}

#[test]
fn maps_written_and_read_back_are_identical() {
    let rows = vec![
        MapRow::from([
            ("city".to_string(), "Paris".to_string()),
            ("zip".to_string(), "75001".to_string()),
        ]),
        MapRow::from([
            ("city".to_string(), "Lyon, Rhône".to_string()),
            ("zip".to_string(), "69001".to_string()),
        ]),
    ];

    let data = write_maps(Vec::new(), &CsvFormat::default(), &rows, None).unwrap();
    assert_eq!(
        String::from_utf8(data.clone()).unwrap(),
        "city,zip\nParis,75001\n\"Lyon, Rhône\",69001\n"
    );

    let decoded = csv_to_maps(data.as_slice()).unwrap();
    assert_eq!(decoded, rows);
}
