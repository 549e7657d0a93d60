//! Shared fixtures for unit tests: in-memory sources and minimal archives.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::Result;
use crate::source::{ByteSource, ChunkStream, SourceInfo, SourceKind};

/// Source over an in-memory buffer; re-openable like the real ones.
pub(crate) struct MemorySource {
    data: Vec<u8>,
    chunk_size: usize,
}

impl MemorySource {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        MemorySource {
            data,
            chunk_size: 1024,
        }
    }

    /// Tiny chunks shake out boundary bugs in the decoders.
    pub(crate) fn with_chunk_size(data: Vec<u8>, chunk_size: usize) -> Self {
        MemorySource { data, chunk_size }
    }
}

impl ByteSource for MemorySource {
    fn open_stream(&self) -> Result<ChunkStream> {
        let chunks: Vec<std::io::Result<Vec<u8>>> = self
            .data
            .chunks(self.chunk_size)
            .map(|c| Ok(c.to_vec()))
            .collect();
        Ok(Box::new(chunks.into_iter()))
    }

    fn describe(&self) -> SourceInfo {
        SourceInfo {
            kind: SourceKind::Local,
            size: Some(self.data.len() as u64),
            content_type: None,
            origin: "memory".to_string(),
        }
    }
}

/// One worksheet in a fixture archive.
pub(crate) struct SheetSpec<'a> {
    pub name: &'a str,
    pub worksheet_xml: &'a str,
}

impl<'a> SheetSpec<'a> {
    pub(crate) fn new(name: &'a str, worksheet_xml: &'a str) -> Self {
        SheetSpec {
            name,
            worksheet_xml,
        }
    }
}

/// Wrap row markup in a complete worksheet document.
pub(crate) fn sheet_data(rows: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{rows}</sheetData></worksheet>"#
    )
}

/// Build a minimal XLSX archive in memory.
///
/// Writes `xl/workbook.xml`, `xl/_rels/workbook.xml.rels`, one
/// `xl/worksheets/sheetN.xml` part per entry, and optionally
/// `xl/sharedStrings.xml`.
pub(crate) fn xlsx_archive(sheets: &[SheetSpec<'_>], shared_strings: Option<&str>) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (i, sheet) in sheets.iter().enumerate() {
        let n = i + 1;
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            sheet.name
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

    if let Some(sst) = shared_strings {
        zip.start_file("xl/sharedStrings.xml", options).unwrap();
        zip.write_all(sst.as_bytes()).unwrap();
    }

    for (i, sheet) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
            .unwrap();
        zip.write_all(sheet.worksheet_xml.as_bytes()).unwrap();
    }

    zip.finish().unwrap().into_inner()
}
