//! # sheetstream
//!
//! Memory-bounded streaming reader for XLSX spreadsheets.
//!
//! Reads the document as a forward-only byte stream (from a local file, an
//! HTTP(S) URL, or an S3 object) and produces rows lazily without ever
//! holding the archive, or any single worksheet, in memory. Peak memory is
//! bounded by the source chunk size, the widest row, and the shared-string
//! pool, independent of worksheet length.
//!
//! ## How it works
//!
//! The ZIP container is decoded with a local-file-header scan (no central
//! directory, no seeking), inflating entries on demand. The source is opened
//! twice: a first pass collects the shared-string pool and resolves the
//! requested sheet name through the workbook relationships; a second pass
//! pull-parses the worksheet XML and emits dense, ordered rows.
//!
//! ## Reading rows
//!
//! ```no_run
//! use sheetstream::XlsxReader;
//!
//! # fn main() -> sheetstream::Result<()> {
//! let reader = XlsxReader::open("data.xlsx", None)?;
//! for row in reader.stream_rows()? {
//!     println!("{:?}", row?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Converting to CSV
//!
//! ```no_run
//! use sheetstream::XlsxReader;
//!
//! # fn main() -> sheetstream::Result<()> {
//! let reader = XlsxReader::open("data.xlsx", Some("Sheet2"))?;
//! let mut out = std::fs::File::create("data.csv")?;
//! let rows = reader.to_csv(&mut out)?;
//! eprintln!("wrote {rows} rows");
//! # Ok(())
//! # }
//! ```

pub mod chunk_reader;
pub mod csv;
pub mod error;
pub mod metadata;
pub mod reader;
pub mod source;
pub mod types;
pub mod worksheet;
pub mod zip_stream;

#[cfg(test)]
pub(crate) mod testutil;

pub use csv::CsvEncoder;
pub use error::{Result, XlsxError};
pub use reader::XlsxReader;
pub use source::{ByteSource, SourceInfo, SourceKind, DEFAULT_CHUNK_SIZE};
pub use types::{CellValue, Row, SheetRef};
pub use worksheet::RowStream;
