//! CSV encoding with RFC 4180 behavior

use crate::types::CellValue;

/// Encodes rows of cell values as CSV lines.
///
/// Minimal quoting: a field is quoted only when it contains the delimiter,
/// the quote character, or a line break, with embedded quotes doubled. Lines
/// are terminated with `\r\n`. `Empty` cells serialize as empty fields;
/// booleans as `true`/`false`; numerics in their shortest round-trip form.
pub struct CsvEncoder {
    delimiter: u8,
    quote_char: u8,
}

impl Default for CsvEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvEncoder {
    pub fn new() -> Self {
        CsvEncoder {
            delimiter: b',',
            quote_char: b'"',
        }
    }

    /// Use a custom delimiter and quote character.
    pub fn with_dialect(delimiter: u8, quote_char: u8) -> Self {
        CsvEncoder {
            delimiter,
            quote_char,
        }
    }

    /// Encode one row, including the line terminator, into `buffer`.
    pub fn encode_row(&self, row: &[CellValue], buffer: &mut Vec<u8>) {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                buffer.push(self.delimiter);
            }
            self.encode_field(&cell.to_field(), buffer);
        }
        buffer.extend_from_slice(b"\r\n");
    }

    fn encode_field(&self, field: &str, buffer: &mut Vec<u8>) {
        if self.needs_quoting(field) {
            buffer.push(self.quote_char);
            for byte in field.bytes() {
                if byte == self.quote_char {
                    buffer.push(self.quote_char);
                    buffer.push(self.quote_char);
                } else {
                    buffer.push(byte);
                }
            }
            buffer.push(self.quote_char);
        } else {
            buffer.extend_from_slice(field.as_bytes());
        }
    }

    fn needs_quoting(&self, field: &str) -> bool {
        field
            .bytes()
            .any(|b| b == self.delimiter || b == self.quote_char || b == b'\n' || b == b'\r')
    }
}
