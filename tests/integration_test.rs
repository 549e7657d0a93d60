//! End-to-end tests through the public API over real temp files.

use std::io::{Cursor, Write};

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use sheetstream::{CellValue, XlsxError, XlsxReader};

struct Workbook<'a> {
    sheets: Vec<(&'a str, String)>,
    shared_strings: Option<String>,
    compression: CompressionMethod,
}

impl<'a> Workbook<'a> {
    fn new() -> Self {
        Workbook {
            sheets: Vec::new(),
            shared_strings: None,
            compression: CompressionMethod::Deflated,
        }
    }

    fn stored(mut self) -> Self {
        self.compression = CompressionMethod::Stored;
        self
    }

    fn sheet(mut self, name: &'a str, rows: &str) -> Self {
        self.sheets.push((
            name,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{rows}</sheetData></worksheet>"#
            ),
        ));
        self
    }

    /// Pool entries become `<si><t>..</t></si>` elements in index order.
    fn shared(mut self, entries: &[&str]) -> Self {
        let mut xml = String::from(
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );
        for entry in entries {
            xml.push_str(&format!("<si><t>{entry}</t></si>"));
        }
        xml.push_str("</sst>");
        self.shared_strings = Some(xml);
        self
    }

    fn shared_raw(mut self, xml: &str) -> Self {
        self.shared_strings = Some(xml.to_string());
        self
    }

    fn write_to_file(self) -> NamedTempFile {
        let options = SimpleFileOptions::default().compression_method(self.compression);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let mut workbook = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
        );
        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (i, (name, _)) in self.sheets.iter().enumerate() {
            let n = i + 1;
            workbook.push_str(&format!(
                r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#
            ));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
            ));
        }
        workbook.push_str("</sheets></workbook>");
        rels.push_str("</Relationships>");

        zip.start_file("xl/workbook.xml", options).unwrap();
        zip.write_all(workbook.as_bytes()).unwrap();
        zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();
        if let Some(sst) = &self.shared_strings {
            zip.start_file("xl/sharedStrings.xml", options).unwrap();
            zip.write_all(sst.as_bytes()).unwrap();
        }
        for (i, (_, xml)) in self.sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
        }
        let bytes = zip.finish().unwrap().into_inner();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();
        file
    }
}

fn collect_rows(file: &NamedTempFile, sheet: Option<&str>) -> Vec<Vec<CellValue>> {
    let reader = XlsxReader::open(file.path().to_str().unwrap(), sheet).unwrap();
    reader
        .stream_rows()
        .unwrap()
        .collect::<sheetstream::Result<Vec<_>>>()
        .unwrap()
}

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

#[test]
fn test_header_and_typed_rows() {
    // Shared-string headers, numeric body, shared-string footer.
    let file = Workbook::new()
        .shared(&["A", "B", "C", "X", "Y", "Z"])
        .sheet(
            "Sheet",
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row>
               <row r="2"><c r="A2"><v>1</v></c><c r="B2"><v>2</v></c><c r="C2"><v>3</v></c></row>
               <row r="3"><c r="A3" t="s"><v>3</v></c><c r="B3" t="s"><v>4</v></c><c r="C3" t="s"><v>5</v></c></row>"#,
        )
        .write_to_file();

    let rows = collect_rows(&file, Some("Sheet"));
    assert_eq!(
        rows,
        vec![
            vec![text("A"), text("B"), text("C")],
            vec![CellValue::Int(1), CellValue::Int(2), CellValue::Int(3)],
            vec![text("X"), text("Y"), text("Z")],
        ]
    );
}

#[test]
fn test_sparse_rows_pad_with_empty() {
    let file = Workbook::new()
        .shared(&["A", "C", "X", "Y", "Z"])
        .sheet(
            "Sheet",
            r#"<row><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c></row>
               <row><c r="A2" t="s"><v>2</v></c><c r="B2" t="s"><v>3</v></c><c r="D2" t="s"><v>4</v></c></row>"#,
        )
        .write_to_file();

    let rows = collect_rows(&file, None);
    assert_eq!(
        rows,
        vec![
            vec![text("A"), CellValue::Empty, text("C")],
            vec![text("X"), text("Y"), CellValue::Empty, text("Z")],
        ]
    );
}

#[test]
fn test_second_sheet_selection() {
    let file = Workbook::new()
        .shared(&["X", "Y", "Z"])
        .sheet("Sheet1", r#"<row><c r="A1"><v>0</v></c></row>"#)
        .sheet(
            "Sheet2",
            r#"<row><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row>
               <row><c r="A2"><v>1</v></c><c r="B2"><v>2</v></c><c r="C2"><v>3</v></c></row>"#,
        )
        .write_to_file();

    let rows = collect_rows(&file, Some("Sheet2"));
    assert_eq!(
        rows,
        vec![
            vec![text("X"), text("Y"), text("Z")],
            vec![CellValue::Int(1), CellValue::Int(2), CellValue::Int(3)],
        ]
    );
}

#[test]
fn test_missing_sheet_fails() {
    let file = Workbook::new()
        .sheet("Sheet1", r#"<row><c r="A1"><v>1</v></c></row>"#)
        .sheet("Sheet2", r#"<row><c r="A1"><v>2</v></c></row>"#)
        .write_to_file();

    let reader = XlsxReader::open(file.path().to_str().unwrap(), Some("NonExistent")).unwrap();
    assert!(matches!(
        reader.stream_rows(),
        Err(XlsxError::SheetNotFound { sheet }) if sheet == "NonExistent"
    ));
}

#[test]
fn test_repeated_shared_string() {
    // One pool entry referenced from three cells.
    let file = Workbook::new()
        .shared(&["Value1"])
        .sheet(
            "Sheet",
            r#"<row><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>0</v></c></row>
               <row><c r="A2" t="s"><v>0</v></c></row>"#,
        )
        .write_to_file();

    let rows = collect_rows(&file, None);
    assert_eq!(rows[0], vec![text("Value1"), text("Value1")]);
    assert_eq!(rows[1], vec![text("Value1")]);
}

#[test]
fn test_rich_text_shared_string() {
    let file = Workbook::new()
        .shared_raw(r#"<sst><si><r><t>Bold</t></r><r><t>Normal</t></r></si></sst>"#)
        .sheet("Sheet", r#"<row><c r="A1" t="s"><v>0</v></c></row>"#)
        .write_to_file();

    let rows = collect_rows(&file, None);
    assert_eq!(rows[0], vec![text("BoldNormal")]);
}

#[test]
fn test_empty_worksheet_yields_no_rows() {
    let file = Workbook::new().sheet("Sheet", "").write_to_file();
    assert!(collect_rows(&file, None).is_empty());
}

#[test]
fn test_stored_archive() {
    // Method 0 (no compression) end to end.
    let file = Workbook::new()
        .stored()
        .sheet("Sheet", r#"<row><c r="A1"><v>123</v></c></row>"#)
        .write_to_file();

    let rows = collect_rows(&file, None);
    assert_eq!(rows, vec![vec![CellValue::Int(123)]]);
}

#[test]
fn test_determinism_across_readers() {
    let file = Workbook::new()
        .shared(&["a", "b"])
        .sheet(
            "Sheet",
            r#"<row><c r="A1" t="s"><v>0</v></c><c r="B1"><v>1.5</v></c></row>
               <row><c r="C2" t="s"><v>1</v></c></row>"#,
        )
        .write_to_file();

    let first = collect_rows(&file, None);
    let second = collect_rows(&file, None);
    assert_eq!(first, second);
}

#[test]
fn test_numeric_typing_end_to_end() {
    let file = Workbook::new()
        .sheet(
            "Sheet",
            r#"<row>
                 <c r="A1"><v>42</v></c>
                 <c r="B1"><v>3.14</v></c>
                 <c r="C1"><v>1e3</v></c>
                 <c r="D1" t="e"><v>#N/A</v></c>
                 <c r="E1" t="b"><v>1</v></c>
               </row>"#,
        )
        .write_to_file();

    let rows = collect_rows(&file, None);
    assert_eq!(
        rows[0],
        vec![
            CellValue::Int(42),
            CellValue::Float(3.14),
            CellValue::Float(1000.0),
            text("#N/A"),
            CellValue::Bool(true),
        ]
    );
}

#[test]
fn test_to_csv_output() {
    let file = Workbook::new()
        .shared(&["name", "with,comma", "with\"quote"])
        .sheet(
            "Sheet",
            r#"<row><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row>
               <row><c r="A2"><v>7</v></c><c r="C2"><v>2.5</v></c></row>"#,
        )
        .write_to_file();

    let reader = XlsxReader::open(file.path().to_str().unwrap(), None).unwrap();
    let mut out = Vec::new();
    let rows = reader.to_csv(&mut out).unwrap();

    assert_eq!(rows, 2);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "name,\"with,comma\",\"with\"\"quote\"\r\n7,,2.5\r\n"
    );
}

#[test]
fn test_row_order_ignores_declared_indices() {
    // Declared indices descend; emission order must follow the document.
    let file = Workbook::new()
        .sheet(
            "Sheet",
            r#"<row r="30"><c r="A30"><v>1</v></c></row>
               <row r="20"><c r="A20"><v>2</v></c></row>
               <row r="10"><c r="A10"><v>3</v></c></row>"#,
        )
        .write_to_file();

    let rows = collect_rows(&file, None);
    assert_eq!(
        rows,
        vec![
            vec![CellValue::Int(1)],
            vec![CellValue::Int(2)],
            vec![CellValue::Int(3)],
        ]
    );
}

#[test]
fn test_inline_strings_end_to_end() {
    let file = Workbook::new()
        .sheet(
            "Sheet",
            r#"<row><c r="A1" t="inlineStr"><is><t>inline value</t></is></c><c r="B1"><v>2</v></c></row>"#,
        )
        .write_to_file();

    let rows = collect_rows(&file, None);
    assert_eq!(rows[0], vec![text("inline value"), CellValue::Int(2)]);
}

#[test]
fn test_source_unavailable() {
    assert!(matches!(
        XlsxReader::open("/no/such/file.xlsx", None),
        Err(XlsxError::SourceUnavailable(_))
    ));
}

#[test]
fn test_metadata_reports_file_size() {
    let file = Workbook::new()
        .sheet("Sheet", r#"<row><c r="A1"><v>1</v></c></row>"#)
        .write_to_file();

    let reader = XlsxReader::open(file.path().to_str().unwrap(), None).unwrap();
    let info = reader.metadata();
    assert_eq!(info.size, Some(file.path().metadata().unwrap().len()));
    assert_eq!(info.kind, sheetstream::SourceKind::Local);
}

#[test]
fn test_many_rows_stream_through() {
    // A worksheet bigger than any single decoder buffer.
    let mut rows_xml = String::new();
    for i in 1..=5_000 {
        rows_xml.push_str(&format!(r#"<row><c r="A{i}"><v>{i}</v></c></row>"#));
    }
    let file = Workbook::new().sheet("Sheet", &rows_xml).write_to_file();

    let rows = collect_rows(&file, None);
    assert_eq!(rows.len(), 5_000);
    assert_eq!(rows[0], vec![CellValue::Int(1)]);
    assert_eq!(rows[4_999], vec![CellValue::Int(5_000)]);
}
