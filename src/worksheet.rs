//! Second pass: pull-parse the worksheet XML into dense rows
//!
//! Drives the ZIP decoder over a fresh source stream, drains every part
//! except the resolved worksheet, and feeds that part's body through an
//! incremental XML parser. The parser state is a small explicit tuple rather
//! than an element tree, and accumulated text is released as each element
//! closes, so memory stays flat regardless of worksheet length.

use std::collections::BTreeMap;
use std::io::BufReader;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::chunk_reader::ChunkReader;
use crate::error::{Result, XlsxError};
use crate::source::ByteSource;
use crate::types::{column_index, CellValue, Row};
use crate::zip_stream::{OwnedPartBody, ZipStream};

/// Lazy iterator of dense rows from one worksheet.
///
/// Rows are emitted in document order; the `r` attribute on `<row>` elements
/// is informational only and never used for ordering or gap filling. A
/// `<row>` with no cells yields nothing.
pub struct RowStream {
    parser: Option<WorksheetParser>,
}

impl RowStream {
    /// Open the worksheet at `part_path`, scanning a fresh stream from the
    /// source. A worksheet part that does not exist in the archive produces
    /// an empty stream.
    pub(crate) fn open(
        source: &dyn ByteSource,
        part_path: &str,
        shared_strings: Vec<String>,
    ) -> Result<Self> {
        let mut zip = ZipStream::new(ChunkReader::new(source.open_stream()?));

        loop {
            match zip.next_part()? {
                Some(part) if part.name == part_path => {
                    log::debug!("streaming worksheet part {part_path}");
                    return Ok(RowStream {
                        parser: Some(WorksheetParser::new(zip.into_body(), shared_strings, part_path)),
                    });
                }
                Some(_) => continue,
                None => {
                    log::debug!("worksheet part {part_path} not present, emitting no rows");
                    return Ok(RowStream { parser: None });
                }
            }
        }
    }
}

impl Iterator for RowStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let parser = self.parser.as_mut()?;
        match parser.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.parser = None;
                None
            }
            Err(e) => {
                // Structural errors are fail-fast: surface once, then end.
                self.parser = None;
                Some(Err(e))
            }
        }
    }
}

struct WorksheetParser {
    reader: Reader<BufReader<OwnedPartBody<ChunkReader>>>,
    shared_strings: Vec<String>,
    part_path: String,
    buf: Vec<u8>,
    current_row: BTreeMap<usize, CellValue>,
    current_cell_address: Option<String>,
    current_cell_type: Option<String>,
    collecting_value: bool,
    collecting_inline: bool,
    value_parts: String,
}

impl WorksheetParser {
    fn new(body: OwnedPartBody<ChunkReader>, shared_strings: Vec<String>, part_path: &str) -> Self {
        let mut reader = Reader::from_reader(BufReader::new(body));
        reader.config_mut().trim_text(false);
        WorksheetParser {
            reader,
            shared_strings,
            part_path: part_path.to_string(),
            buf: Vec::with_capacity(4096),
            current_row: BTreeMap::new(),
            current_cell_address: None,
            current_cell_type: None,
            collecting_value: false,
            collecting_inline: false,
            value_parts: String::new(),
        }
    }

    /// Advance the event loop until a row completes or the part ends.
    fn next_row(&mut self) -> Result<Option<Row>> {
        // The event buffer is detached from `self` for the duration of the
        // loop so borrowed event data and parser state can coexist.
        let mut buf = std::mem::take(&mut self.buf);
        let result = self.advance(&mut buf);
        self.buf = buf;
        result
    }

    fn advance(&mut self, buf: &mut Vec<u8>) -> Result<Option<Row>> {
        loop {
            buf.clear();
            let event = self
                .reader
                .read_event_into(buf)
                .map_err(|e| XlsxError::xml(&self.part_path, e))?;

            match event {
                Event::Start(e) => self.on_start(&e)?,
                Event::Empty(e) => self.on_empty(&e)?,
                Event::Text(e) => {
                    if self.collecting_value || self.collecting_inline {
                        let text = e
                            .unescape()
                            .map_err(|err| XlsxError::xml(&self.part_path, err))?;
                        self.value_parts.push_str(&text);
                    }
                }
                Event::CData(e) => {
                    if self.collecting_value || self.collecting_inline {
                        self.value_parts.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(e) => {
                    if let Some(row) = self.on_end(e.local_name().as_ref()) {
                        return Ok(Some(row));
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    fn on_start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match e.local_name().as_ref() {
            b"row" => self.current_row.clear(),
            b"c" => self.capture_cell_attributes(e)?,
            b"v" if self.current_cell_address.is_some() => {
                self.collecting_value = true;
                self.value_parts.clear();
            }
            b"is" if self.current_cell_address.is_some()
                && self.current_cell_type.as_deref() == Some("inlineStr") =>
            {
                self.collecting_inline = true;
                self.value_parts.clear();
            }
            _ => {}
        }
        Ok(())
    }

    /// Self-closing elements: `<c .../>` carries no value, `<v/>` and `<is/>`
    /// are empty values, `<row/>` has no cells and emits nothing.
    fn on_empty(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match e.local_name().as_ref() {
            b"row" => self.current_row.clear(),
            b"c" => self.capture_cell_attributes(e)?,
            b"v" if self.current_cell_address.is_some() => {
                self.value_parts.clear();
                self.finalize_value_cell();
            }
            b"is" if self.current_cell_address.is_some()
                && self.current_cell_type.as_deref() == Some("inlineStr") =>
            {
                self.value_parts.clear();
                self.finalize_inline_cell();
            }
            _ => {}
        }
        Ok(())
    }

    fn on_end(&mut self, local: &[u8]) -> Option<Row> {
        match local {
            b"v" if self.collecting_value => {
                self.finalize_value_cell();
                None
            }
            b"is" if self.collecting_inline => {
                self.finalize_inline_cell();
                None
            }
            b"row" => {
                if self.current_row.is_empty() {
                    return None;
                }
                let sparse = std::mem::take(&mut self.current_row);
                Some(densify(sparse))
            }
            _ => None,
        }
    }

    fn capture_cell_attributes(&mut self, e: &BytesStart<'_>) -> Result<()> {
        self.current_cell_address = None;
        self.current_cell_type = None;
        for attr in e.attributes() {
            let attr = attr.map_err(|err| XlsxError::xml(&self.part_path, err))?;
            match attr.key.local_name().as_ref() {
                b"r" => {
                    self.current_cell_address =
                        Some(String::from_utf8_lossy(&attr.value).into_owned());
                }
                b"t" => {
                    self.current_cell_type =
                        Some(String::from_utf8_lossy(&attr.value).into_owned());
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// `</v>` reached: decode the collected text per the cell's type
    /// attribute and record the cell.
    fn finalize_value_cell(&mut self) {
        let text = std::mem::take(&mut self.value_parts);
        self.collecting_value = false;

        let value = match self.current_cell_type.as_deref() {
            Some("s") => self.lookup_shared_string(&text),
            Some("b") => match text.as_str() {
                "1" => CellValue::Bool(true),
                "0" => CellValue::Bool(false),
                _ => CellValue::Text(text),
            },
            // Formula string results and error literals stay textual.
            Some("str") | Some("e") => CellValue::Text(text),
            None | Some("n") => infer_numeric(text),
            Some(_) => CellValue::Text(text),
        };

        if let Some(address) = &self.current_cell_address {
            self.current_row.insert(column_index(address), value);
        }
    }

    /// `</is>` reached: the nested `<t>` content is already collected.
    fn finalize_inline_cell(&mut self) {
        let text = std::mem::take(&mut self.value_parts);
        self.collecting_inline = false;
        if let Some(address) = &self.current_cell_address {
            self.current_row
                .insert(column_index(address), CellValue::Text(text));
        }
    }

    fn lookup_shared_string(&self, text: &str) -> CellValue {
        match text.parse::<usize>() {
            Ok(index) if index < self.shared_strings.len() => {
                CellValue::Text(self.shared_strings[index].clone())
            }
            Ok(index) => {
                log::warn!(
                    "shared string index {} out of range (pool size {}), cell left empty",
                    index,
                    self.shared_strings.len()
                );
                CellValue::Empty
            }
            Err(_) => {
                log::warn!("non-integer shared string index '{text}', cell left empty");
                CellValue::Empty
            }
        }
    }
}

/// Expand a sparse column map to a dense row padded with `Empty`.
fn densify(sparse: BTreeMap<usize, CellValue>) -> Row {
    let width = sparse
        .keys()
        .next_back()
        .map(|max| max + 1)
        .unwrap_or(0);
    let mut dense = vec![CellValue::Empty; width];
    for (index, value) in sparse {
        dense[index] = value;
    }
    dense
}

/// Type inference for cells whose type attribute is absent or `n`.
///
/// Text without `.`/`e`/`E` parses as an integer, anything else as a float;
/// unparsable text (error literals like `#N/A`) is kept verbatim.
fn infer_numeric(text: String) -> CellValue {
    if text.is_empty() {
        return CellValue::Empty;
    }
    if text.contains(['.', 'e', 'E']) {
        match text.parse::<f64>() {
            Ok(f) => CellValue::Float(f),
            Err(_) => {
                log::warn!("unparsable numeric '{text}', kept as text");
                CellValue::Text(text)
            }
        }
    } else {
        match text.parse::<i64>() {
            Ok(i) => CellValue::Int(i),
            Err(_) => {
                log::warn!("unparsable numeric '{text}', kept as text");
                CellValue::Text(text)
            }
        }
    }
}
