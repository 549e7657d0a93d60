//! Error types for the sheetstream library

use thiserror::Error;

/// Result type alias for sheetstream operations
pub type Result<T> = std::result::Result<T, XlsxError>;

/// Main error type for all streaming read operations
#[derive(Error, Debug)]
pub enum XlsxError {
    /// The byte source could not be opened or re-opened
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source string could not be resolved to a source implementation
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// Malformed ZIP container (bad signature, truncated header, inflate failure)
    #[error("ZIP format error: {0}")]
    ZipFormat(String),

    /// The archive uses a compression method other than store or deflate
    #[error("Unsupported ZIP compression method: {0}")]
    UnsupportedCompression(u16),

    /// Malformed XML in a workbook part
    #[error("XML format error in {part}: {message}")]
    XmlFormat { part: String, message: String },

    /// Named sheet not present in the workbook
    #[error("Sheet '{sheet}' not found in workbook or metadata missing")]
    SheetNotFound { sheet: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl XlsxError {
    pub(crate) fn xml(part: &str, err: impl std::fmt::Display) -> Self {
        XlsxError::XmlFormat {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

/// Recover an [`XlsxError`] smuggled through an [`std::io::Error`] by the
/// `Read` adapters; anything else stays an IO error.
pub(crate) fn unwrap_io(err: std::io::Error) -> XlsxError {
    match err.downcast::<XlsxError>() {
        Ok(inner) => inner,
        Err(err) => XlsxError::Io(err),
    }
}
