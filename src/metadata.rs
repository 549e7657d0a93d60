//! First pass over the archive: shared strings and worksheet resolution
//!
//! The shared-string pool and the worksheet parts appear in undefined order
//! inside the archive, so rows cannot be decoded until the pool is known.
//! This pass streams the whole archive once, keeping only three parts:
//! `xl/sharedStrings.xml` (streamed through a pull parser, never fully
//! buffered), and the small `xl/workbook.xml` / `xl/_rels/workbook.xml.rels`
//! pair (buffered whole) needed to map a sheet name to its part path.

use std::io::{BufReader, Read};

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Reader};

use crate::chunk_reader::ChunkReader;
use crate::error::{Result, XlsxError};
use crate::source::ByteSource;
use crate::types::SheetRef;
use crate::zip_stream::ZipStream;

pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
pub const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub const DEFAULT_WORKSHEET_PART: &str = "xl/worksheets/sheet1.xml";

/// Namespace binding the `r:id` attribute on `<sheet>` elements
const RELATIONSHIPS_NS: &[u8] =
    b"http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Result of the metadata pass.
#[derive(Debug)]
pub struct WorkbookMetadata {
    /// Shared-string pool, indexed by the integer cells reference
    pub shared_strings: Vec<String>,
    /// Archive path of the worksheet to stream, always `xl/`-prefixed
    pub worksheet_path: String,
    /// Resolved sheet reference when a name was requested
    pub sheet: Option<SheetRef>,
}

/// Drive one full pass of the ZIP decoder and resolve the target worksheet.
///
/// With no `sheet_name` the worksheet path defaults to
/// `xl/worksheets/sheet1.xml` whether or not the workbook part exists. With a
/// name, both `xl/workbook.xml` and its rels part must be present and yield a
/// match, otherwise [`XlsxError::SheetNotFound`]. A missing shared-string
/// part just leaves the pool empty.
pub fn resolve(source: &dyn ByteSource, sheet_name: Option<&str>) -> Result<WorkbookMetadata> {
    let mut zip = ZipStream::new(ChunkReader::new(source.open_stream()?));

    let mut shared_strings = Vec::new();
    let mut workbook_xml: Option<Vec<u8>> = None;
    let mut rels_xml: Option<Vec<u8>> = None;

    while let Some(part) = zip.next_part()? {
        match part.name.as_str() {
            SHARED_STRINGS_PART => {
                shared_strings = parse_shared_strings(zip.body())?;
            }
            WORKBOOK_PART if sheet_name.is_some() => {
                workbook_xml = Some(read_part(zip.body(), part.size_hint)?);
            }
            WORKBOOK_RELS_PART if sheet_name.is_some() => {
                rels_xml = Some(read_part(zip.body(), part.size_hint)?);
            }
            // Everything else is drained by the next `next_part` call.
            _ => {}
        }
    }

    log::debug!(
        "metadata pass complete: {} shared strings",
        shared_strings.len()
    );

    let Some(name) = sheet_name else {
        return Ok(WorkbookMetadata {
            shared_strings,
            worksheet_path: DEFAULT_WORKSHEET_PART.to_string(),
            sheet: None,
        });
    };

    let not_found = || XlsxError::SheetNotFound {
        sheet: name.to_string(),
    };

    let workbook_xml = workbook_xml.ok_or_else(not_found)?;
    let relationship_id = find_sheet_rid(&workbook_xml, name)?.ok_or_else(not_found)?;

    let rels_xml = rels_xml.ok_or_else(not_found)?;
    let target = find_relationship_target(&rels_xml, &relationship_id)?.ok_or_else(not_found)?;

    let worksheet_path = normalize_part_path(&target);
    log::debug!("sheet '{name}' -> {relationship_id} -> {worksheet_path}");

    Ok(WorkbookMetadata {
        shared_strings,
        worksheet_path: worksheet_path.clone(),
        sheet: Some(SheetRef {
            display_name: name.to_string(),
            relationship_id,
            part_path: worksheet_path,
        }),
    })
}

fn read_part(mut body: impl Read, size_hint: Option<u64>) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(size_hint.unwrap_or(0).min(1 << 20) as usize);
    body.read_to_end(&mut data)
        .map_err(crate::error::unwrap_io)?;
    Ok(data)
}

/// Streaming parse of `xl/sharedStrings.xml`.
///
/// Each pool entry is the concatenation of every `<t>` text node inside the
/// corresponding `<si>`, which flattens rich-text runs. Element state is
/// discarded as soon as each `<si>` closes, so memory stays bounded by the
/// largest single string.
fn parse_shared_strings(body: impl Read) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(BufReader::new(body));
    reader.config_mut().trim_text(false);

    let mut pool = Vec::new();
    let mut pending = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| XlsxError::xml(SHARED_STRINGS_PART, err))?;
                pending.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => pool.push(std::mem::take(&mut pending)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(XlsxError::xml(SHARED_STRINGS_PART, e)),
        }
        buf.clear();
    }

    Ok(pool)
}

/// Find the relationship id of the sheet named `sheet_name` in workbook.xml.
///
/// The `id` attribute must be bound to the relationships namespace; an
/// unqualified `id` on a `<sheet>` element is not the same attribute.
fn find_sheet_rid(xml: &[u8], sheet_name: &str) -> Result<Option<String>> {
    let mut reader = NsReader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                let mut name = None;
                let mut rid = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| XlsxError::xml(WORKBOOK_PART, err))?;
                    let (ns, local) = reader.resolve_attribute(attr.key);
                    let value = attr
                        .unescape_value()
                        .map_err(|err| XlsxError::xml(WORKBOOK_PART, err))?;
                    match local.as_ref() {
                        b"name" if matches!(ns, ResolveResult::Unbound) => {
                            name = Some(value.into_owned());
                        }
                        b"id" => {
                            if let ResolveResult::Bound(bound) = ns {
                                if bound.as_ref() == RELATIONSHIPS_NS {
                                    rid = Some(value.into_owned());
                                }
                            }
                        }
                        _ => {}
                    }
                }
                if name.as_deref() == Some(sheet_name) {
                    return Ok(rid);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(XlsxError::xml(WORKBOOK_PART, e)),
        }
        buf.clear();
    }

    Ok(None)
}

/// Map a relationship id to its `Target` path in workbook.xml.rels.
fn find_relationship_target(xml: &[u8], relationship_id: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| XlsxError::xml(WORKBOOK_RELS_PART, err))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|err| XlsxError::xml(WORKBOOK_RELS_PART, err))?;
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = Some(value.into_owned()),
                        b"Target" => target = Some(value.into_owned()),
                        _ => {}
                    }
                }
                if id.as_deref() == Some(relationship_id) {
                    return Ok(target);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(XlsxError::xml(WORKBOOK_RELS_PART, e)),
        }
        buf.clear();
    }

    Ok(None)
}

/// Normalize a relationship target to an absolute archive path.
///
/// Targets are usually relative to `xl/` (`worksheets/sheet1.xml`), but
/// absolute (`/xl/worksheets/sheet1.xml`) and already-prefixed forms occur in
/// the wild.
fn normalize_part_path(target: &str) -> String {
    let path = target.strip_prefix('/').unwrap_or(target);
    let path = path.strip_prefix("xl/").unwrap_or(path);
    format!("xl/{path}")
}
