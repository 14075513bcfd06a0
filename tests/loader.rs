mod common;

use common::{PAYROLL_CSV, TestWorkspace};
use encoding_rs::{UTF_8, WINDOWS_1252};
use sheet_assist::{
    data::Cell,
    dataset::{Dataset, SourceFormat},
    error::SheetError,
    loader::{LoadOptions, load_dataset},
    persist,
};

#[test]
fn semicolon_latin1_csv_is_detected() {
    let workspace = TestWorkspace::new();
    let (bytes, _, _) = WINDOWS_1252.encode("Nom;Salaire\nRené;3000\nZoë;4200\n");
    let path = workspace.write_bytes("paie.csv", &bytes);

    let dataset = load_dataset(&path, &LoadOptions::default()).expect("load");
    assert_eq!(
        dataset.source(),
        SourceFormat::Csv {
            delimiter: b';',
            encoding: WINDOWS_1252,
        }
    );
    assert_eq!(dataset.cell(0, 0), Some(&Cell::Text("René".into())));
    assert_eq!(dataset.column("Salaire").unwrap().sum(), 7200.0);
}

#[test]
fn short_rows_and_duplicate_headers_are_normalized() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("ragged.csv", "a,a,\n1,2,3\n4\n");
    let dataset = load_dataset(&path, &LoadOptions::default()).expect("load");
    assert_eq!(dataset.header_names(), vec!["a", "a.1", "column_3"]);
    assert_eq!(dataset.row_count(), 2);
    assert_eq!(dataset.cell(1, 2), Some(&Cell::Empty));
}

#[test]
fn csv_round_trip_keeps_shape() {
    let workspace = TestWorkspace::new();
    let source = workspace.write("payroll.csv", PAYROLL_CSV);
    let dataset = load_dataset(&source, &LoadOptions::default()).expect("load");
    let copy = workspace.path().join("copy.csv");
    persist::save_dataset(&dataset, &copy).expect("save");

    let reloaded = load_dataset(&copy, &LoadOptions::default()).expect("reload");
    assert_eq!(reloaded.row_count(), dataset.row_count());
    assert_eq!(reloaded.header_names(), dataset.header_names());
}

#[test]
fn xlsx_round_trip_keeps_shape_and_types() {
    let workspace = TestWorkspace::new();
    let dataset = Dataset::from_text_rows(
        vec!["Region".into(), "Revenue".into(), "Note".into()],
        vec![
            vec!["North".into(), "1250.5".into(), "".into()],
            vec!["South".into(), "980".into(), "late".into()],
        ],
        SourceFormat::Csv {
            delimiter: b',',
            encoding: UTF_8,
        },
    );
    let path = workspace.path().join("regions.xlsx");
    persist::save_dataset(&dataset, &path).expect("save workbook");

    let reloaded = load_dataset(&path, &LoadOptions::default()).expect("reload");
    assert_eq!(reloaded.source(), SourceFormat::Xlsx);
    assert_eq!((reloaded.row_count(), reloaded.column_count()), (2, 3));
    assert_eq!(reloaded.numeric_columns(), vec!["Revenue"]);
    assert_eq!(reloaded.cell(0, 2), Some(&Cell::Empty));
    assert_eq!(reloaded.cell(1, 1), Some(&Cell::Number(980.0)));
}

#[test]
fn unsupported_extension_is_rejected() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("notes.txt", "a,b\n1,2\n");
    assert!(matches!(
        load_dataset(&path, &LoadOptions::default()),
        Err(SheetError::UnsupportedFormat { extension }) if extension == ".txt"
    ));
}

#[test]
fn oversized_file_is_rejected() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("payroll.csv", PAYROLL_CSV);
    let options = LoadOptions { max_file_size: 16 };
    assert!(matches!(
        load_dataset(&path, &options),
        Err(SheetError::FileTooLarge { limit: 16, .. })
    ));
}

#[test]
fn header_only_file_is_empty() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("empty.csv", "Name,Salary\n");
    assert!(matches!(
        load_dataset(&path, &LoadOptions::default()),
        Err(SheetError::EmptyDataset(_))
    ));
}

#[test]
fn single_column_text_is_not_a_table() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("list.csv", "just\none\ncolumn\n");
    match load_dataset(&path, &LoadOptions::default()) {
        Err(SheetError::InvalidDataset { attempts, .. }) => assert_eq!(attempts.len(), 9),
        other => panic!("expected InvalidDataset, got {other:?}"),
    }
}

#[test]
fn missing_file_is_not_found() {
    let workspace = TestWorkspace::new();
    let err = load_dataset(&workspace.path().join("absent.csv"), &LoadOptions::default())
        .expect_err("missing");
    assert!(err.is_not_found());
}

fn fixture(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

#[test]
fn legacy_xls_maps_dates_booleans_and_errors() {
    let dataset = load_dataset(&fixture("staff.xls"), &LoadOptions::default()).expect("load xls");
    assert_eq!(dataset.source(), SourceFormat::Xls);
    assert_eq!(dataset.header_names(), vec!["Name", "Hired", "Salary", "Active"]);
    assert_eq!(dataset.row_count(), 3);
    assert_eq!(dataset.cell(0, 1), Some(&Cell::Text("2024-03-15 00:00:00".into())));
    assert_eq!(dataset.cell(1, 3), Some(&Cell::Text("false".into())));
    // #DIV/0! reads as an empty cell, so the column stays numeric.
    assert_eq!(dataset.cell(2, 2), Some(&Cell::Empty));
    assert!(dataset.column("Salary").unwrap().is_numeric());
    assert_eq!(dataset.column("Salary").unwrap().sum(), 9500.0);
    assert_eq!(dataset.numeric_columns(), vec!["Salary"]);
}

#[test]
fn ods_keeps_iso_dates_as_text() {
    let dataset = load_dataset(&fixture("staff.ods"), &LoadOptions::default()).expect("load ods");
    assert_eq!(dataset.source(), SourceFormat::Ods);
    assert_eq!(dataset.header_names(), vec!["Name", "Hired", "Salary", "Active"]);
    assert_eq!(dataset.row_count(), 2);
    assert_eq!(dataset.cell(0, 1), Some(&Cell::Text("2024-03-15".into())));
    assert_eq!(dataset.cell(1, 1), Some(&Cell::Text("2023-11-02".into())));
    assert_eq!(dataset.cell(0, 3), Some(&Cell::Text("true".into())));
    assert_eq!(dataset.column("Salary").unwrap().sum(), 9500.0);
}
