//! Byte-stream sources for the reader
//!
//! A source produces a forward-only sequence of byte chunks plus coarse
//! metadata. The reader opens a source twice per conversion (once for the
//! metadata pass, once for the row pass), so implementations must support
//! repeated [`ByteSource::open_stream`] calls.

use std::fmt;
use std::io::{self, Read};

use crate::error::{Result, XlsxError};

pub mod local;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "s3")]
pub mod s3;

pub use local::LocalFileSource;

#[cfg(feature = "http")]
pub use http::HttpSource;

#[cfg(feature = "s3")]
pub use s3::S3Source;

/// Default chunk size hint: 16 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// MIME type reported when the transport does not supply one
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A finite lazy sequence of byte chunks. Single pass; a fresh sequence is
/// obtained by asking the source again.
pub type ChunkStream = Box<dyn Iterator<Item = io::Result<Vec<u8>>>>;

/// Where the bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    Http,
    ObjectStore,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Local => write!(f, "local"),
            SourceKind::Http => write!(f, "http"),
            SourceKind::ObjectStore => write!(f, "object-store"),
        }
    }
}

/// Cheap source metadata.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub kind: SourceKind,
    /// Total size in bytes, when the transport reports one
    pub size: Option<u64>,
    pub content_type: Option<String>,
    /// Path, URL, or `s3://bucket/key` the source was created from
    pub origin: String,
}

/// A re-openable stream of bytes.
pub trait ByteSource {
    /// Open a fresh sequential read over the underlying object.
    ///
    /// Must be callable at least twice per source: the reader makes one pass
    /// for metadata and a second for rows.
    fn open_stream(&self) -> Result<ChunkStream>;

    /// Describe the source without reading its body.
    fn describe(&self) -> SourceInfo;
}

/// Resolve a source string to a concrete implementation.
///
/// `s3://bucket/key` becomes an [`S3Source`], `http://`/`https://` URLs an
/// [`HttpSource`], and anything else a [`LocalFileSource`].
pub fn from_uri(uri: &str, chunk_size: usize) -> Result<Box<dyn ByteSource>> {
    if let Some(remainder) = uri.strip_prefix("s3://") {
        return s3_from_uri(uri, remainder, chunk_size);
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return http_from_uri(uri, chunk_size);
    }
    Ok(Box::new(LocalFileSource::new(uri, chunk_size)?))
}

#[cfg(feature = "s3")]
fn s3_from_uri(uri: &str, remainder: &str, chunk_size: usize) -> Result<Box<dyn ByteSource>> {
    let (bucket, key) = remainder.split_once('/').unwrap_or((remainder, ""));
    if bucket.is_empty() || key.is_empty() {
        return Err(XlsxError::InvalidSource(format!(
            "invalid S3 URI '{uri}', expected s3://bucket/key"
        )));
    }
    Ok(Box::new(S3Source::new(bucket, key).with_chunk_size(chunk_size)))
}

#[cfg(not(feature = "s3"))]
fn s3_from_uri(uri: &str, _remainder: &str, _chunk_size: usize) -> Result<Box<dyn ByteSource>> {
    Err(XlsxError::InvalidSource(format!(
        "'{uri}' requires the `s3` feature"
    )))
}

#[cfg(feature = "http")]
fn http_from_uri(uri: &str, chunk_size: usize) -> Result<Box<dyn ByteSource>> {
    Ok(Box::new(HttpSource::new(uri)?.with_chunk_size(chunk_size)))
}

#[cfg(not(feature = "http"))]
fn http_from_uri(uri: &str, _chunk_size: usize) -> Result<Box<dyn ByteSource>> {
    Err(XlsxError::InvalidSource(format!(
        "'{uri}' requires the `http` feature"
    )))
}

/// Chunk iterator over any [`Read`], shared by the transport-backed sources.
pub(crate) struct ReadChunks<R: Read> {
    reader: R,
    chunk_size: usize,
    failed: bool,
}

impl<R: Read> ReadChunks<R> {
    pub(crate) fn new(reader: R, chunk_size: usize) -> Self {
        ReadChunks {
            reader,
            chunk_size: chunk_size.max(1),
            failed: false,
        }
    }
}

impl<R: Read> Iterator for ReadChunks<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut chunk = vec![0u8; self.chunk_size];
        let mut filled = 0;
        // Top up so short transport reads do not degrade into tiny chunks.
        while filled < chunk.len() {
            match self.reader.read(&mut chunk[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        if filled == 0 {
            return None;
        }
        chunk.truncate(filled);
        Some(Ok(chunk))
    }
}
