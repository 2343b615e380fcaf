use pptime_core::pivot::{Cell, Column, PivotView};
use pptime_core::{
    DocumentWriter, RenderError, ReportBook, ReportComment, ReportMaterializer, ReportStore,
};
use pptime_store::SqliteReportStore;
use pretty_assertions::assert_eq;
use std::path::Path;

struct TouchWriter;

impl DocumentWriter for TouchWriter {
    fn write(&self, _book: &ReportBook, path: &Path) -> Result<(), RenderError> {
        std::fs::write(path, b"PK")?;
        Ok(())
    }
}

fn book() -> ReportBook {
    ReportBook {
        views: vec![PivotView {
            sheet_name: "All time reports".into(),
            columns: vec![Column::new("Project"), Column::new("Hours")],
            rows: vec![vec![Cell::Text("Website".into()), Cell::Number(2.0)]],
            total_row: false,
        }],
    }
}

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("pptime.db");

    let first = {
        let mut store = SqliteReportStore::open(&db).unwrap();
        store.record("timereports/a.xlsx", "no comment provided").unwrap()
    };

    let store = SqliteReportStore::open(&db).unwrap();
    assert_eq!(store.list().unwrap(), vec![first]);
}

#[test]
fn materializer_records_into_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteReportStore::open(dir.path().join("pptime.db")).unwrap();
    let mut materializer = ReportMaterializer::new(TouchWriter, store, dir.path().join("out"));

    let artifact = materializer
        .materialize(&book(), &ReportComment::new("weekly").unwrap())
        .unwrap();

    assert!(Path::new(&artifact.file_path).exists());
    let listed = materializer.store().list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].comment, "weekly");
    assert_eq!(listed[0].file_path, artifact.file_path);
}
