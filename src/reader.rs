//! Unified reader façade composing the streaming pipeline

use std::io::Write;

use crate::csv::CsvEncoder;
use crate::error::Result;
use crate::metadata;
use crate::source::{self, ByteSource, SourceInfo, DEFAULT_CHUNK_SIZE};
use crate::worksheet::RowStream;

/// Streaming XLSX reader over any re-openable byte source.
///
/// The source is consumed twice per row stream: a first pass collects the
/// shared-string pool and resolves the target worksheet part, a second pass
/// streams that part's rows. Neither pass materializes the archive or any
/// single part in memory (the shared-string pool excepted, which must be
/// resident while rows are decoded).
///
/// # Example
///
/// ```no_run
/// use sheetstream::XlsxReader;
///
/// let reader = XlsxReader::open("report.xlsx", Some("Invoices"))?;
/// for row in reader.stream_rows()? {
///     println!("{:?}", row?);
/// }
/// # Ok::<(), sheetstream::XlsxError>(())
/// ```
pub struct XlsxReader {
    source: Box<dyn ByteSource>,
    sheet_name: Option<String>,
}

impl XlsxReader {
    /// Open a reader for a source string: a local path, an `s3://bucket/key`
    /// URI (feature `s3`), or an `http(s)://` URL (feature `http`).
    ///
    /// `sheet_name` selects the worksheet; `None` targets the conventional
    /// first sheet part.
    pub fn open(source: &str, sheet_name: Option<&str>) -> Result<Self> {
        Self::open_with_chunk_size(source, sheet_name, DEFAULT_CHUNK_SIZE)
    }

    /// Like [`open`](Self::open) with an explicit source chunk size hint.
    pub fn open_with_chunk_size(
        source: &str,
        sheet_name: Option<&str>,
        chunk_size: usize,
    ) -> Result<Self> {
        let source = source::from_uri(source, chunk_size)?;
        log::info!(
            "reader initialized (source={}, sheet={:?})",
            source.describe().kind,
            sheet_name
        );
        Ok(Self::from_source(source, sheet_name))
    }

    /// Wrap an already-constructed source.
    pub fn from_source(source: Box<dyn ByteSource>, sheet_name: Option<&str>) -> Self {
        XlsxReader {
            source,
            sheet_name: sheet_name.map(str::to_string),
        }
    }

    /// Metadata about the underlying source (kind, size, content type).
    pub fn metadata(&self) -> SourceInfo {
        self.source.describe()
    }

    /// Stream the rows of the selected worksheet.
    ///
    /// Runs both passes. Fails with [`SheetNotFound`](crate::XlsxError) when
    /// a requested sheet name cannot be resolved. After the returned iterator
    /// is exhausted (or dropped), no resources remain open.
    pub fn stream_rows(&self) -> Result<RowStream> {
        let meta = metadata::resolve(self.source.as_ref(), self.sheet_name.as_deref())?;
        log::info!(
            "metadata extracted: {} shared strings, worksheet path: {}",
            meta.shared_strings.len(),
            meta.worksheet_path
        );
        RowStream::open(
            self.source.as_ref(),
            &meta.worksheet_path,
            meta.shared_strings,
        )
    }

    /// Convert the worksheet to CSV, writing rows to `sink` as they stream.
    ///
    /// Returns the number of rows written. The sink is flushed but never
    /// closed; the caller keeps ownership of it.
    pub fn to_csv<W: Write>(&self, sink: &mut W) -> Result<u64> {
        let encoder = CsvEncoder::new();
        let mut line = Vec::with_capacity(1024);
        let mut count: u64 = 0;

        for row in self.stream_rows()? {
            let row = row?;
            line.clear();
            encoder.encode_row(&row, &mut line);
            sink.write_all(&line)?;
            count += 1;
            if count % 10_000 == 0 {
                log::info!("processed {count} rows");
            }
        }
        sink.flush()?;

        log::info!("completed streaming {count} rows");
        Ok(count)
    }
}
