//! Local file system source

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Result, XlsxError};
use crate::source::{
    ByteSource, ChunkStream, ReadChunks, SourceInfo, SourceKind, DEFAULT_CHUNK_SIZE,
    XLSX_CONTENT_TYPE,
};

/// Streams a file from the local file system in fixed-size chunks.
pub struct LocalFileSource {
    path: PathBuf,
    chunk_size: usize,
}

impl LocalFileSource {
    /// Create a source for `path`.
    ///
    /// Fails with [`XlsxError::SourceUnavailable`] when the path does not
    /// exist or is not a regular file.
    pub fn new<P: AsRef<Path>>(path: P, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(XlsxError::SourceUnavailable(format!(
                    "path is not a file: {}",
                    path.display()
                )))
            }
            Err(e) => {
                return Err(XlsxError::SourceUnavailable(format!(
                    "cannot open {}: {}",
                    path.display(),
                    e
                )))
            }
        }
        log::debug!("local source: {}", path.display());
        Ok(LocalFileSource { path, chunk_size })
    }

    /// Create a source with the default 16 MiB chunk size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(path, DEFAULT_CHUNK_SIZE)
    }
}

impl ByteSource for LocalFileSource {
    fn open_stream(&self) -> Result<ChunkStream> {
        let file = File::open(&self.path).map_err(|e| {
            XlsxError::SourceUnavailable(format!("cannot open {}: {}", self.path.display(), e))
        })?;
        Ok(Box::new(ReadChunks::new(file, self.chunk_size)))
    }

    fn describe(&self) -> SourceInfo {
        SourceInfo {
            kind: SourceKind::Local,
            size: std::fs::metadata(&self.path).ok().map(|m| m.len()),
            content_type: Some(XLSX_CONTENT_TYPE.to_string()),
            origin: self.path.display().to_string(),
        }
    }
}
