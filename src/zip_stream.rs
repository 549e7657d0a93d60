//! Forward-only streaming ZIP decoder
//!
//! Scans local file headers in archive order instead of seeking to the
//! central directory, so it works over non-seekable byte streams (HTTP
//! bodies, S3 objects). Each entry's body is inflated on demand; the body
//! must be fully drained before the next entry is available, and
//! [`ZipStream::next_part`] drains any leftover automatically.

use std::io::Read;

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{Result, XlsxError};

/// ZIP local file header signature (`PK\x03\x04`)
const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;

/// ZIP central directory signature (`PK\x01\x02`)
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;

/// ZIP end of central directory signature (`PK\x05\x06`)
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

/// Optional data descriptor signature (`PK\x07\x08`)
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

/// General-purpose flag bit 3: sizes deferred to a trailing data descriptor
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General-purpose flag bit 11: filename is UTF-8
const FLAG_UTF8_NAME: u16 = 1 << 11;

const INPUT_BUF_SIZE: usize = 32 * 1024;

/// Header of the entry currently positioned for reading.
#[derive(Debug, Clone)]
pub struct PartInfo {
    /// Entry name as stored in the archive (e.g. `xl/workbook.xml`)
    pub name: String,
    /// Declared uncompressed size, unknown when the entry uses a data
    /// descriptor
    pub size_hint: Option<u64>,
}

enum BodyState {
    /// No entry open (before the first header or after the last)
    Idle,
    /// Stored entry: raw passthrough of `remaining` bytes
    Stored { remaining: u64 },
    /// Deflated entry with live inflate state
    Deflate {
        inflate: Box<Decompress>,
        /// Compressed bytes left, `None` when deferred to a descriptor
        compressed_remaining: Option<u64>,
        has_descriptor: bool,
    },
    /// Body delivered and trailer consumed; waiting for `next_part`
    Finished,
}

/// Streaming decoder over a ZIP archive presented as a [`Read`].
pub struct ZipStream<R: Read> {
    input: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    input_eof: bool,
    entries_done: bool,
    state: BodyState,
}

impl<R: Read> ZipStream<R> {
    pub fn new(input: R) -> Self {
        ZipStream {
            input,
            buf: vec![0u8; INPUT_BUF_SIZE],
            start: 0,
            end: 0,
            input_eof: false,
            entries_done: false,
            state: BodyState::Idle,
        }
    }

    /// Advance to the next local file entry.
    ///
    /// Any unread body bytes of the current entry are drained first. Returns
    /// `Ok(None)` once the central directory (or end of stream) is reached.
    pub fn next_part(&mut self) -> Result<Option<PartInfo>> {
        if self.entries_done {
            return Ok(None);
        }
        self.drain_body()?;

        let signature = match self.try_read_u32()? {
            Some(sig) => sig,
            None => {
                self.entries_done = true;
                return Ok(None);
            }
        };

        match signature {
            LOCAL_FILE_HEADER_SIGNATURE => {}
            CENTRAL_DIRECTORY_SIGNATURE | END_OF_CENTRAL_DIRECTORY_SIGNATURE => {
                // Entry data is over; nothing in the trailing records is
                // needed for a forward scan.
                self.entries_done = true;
                return Ok(None);
            }
            other => {
                return Err(XlsxError::ZipFormat(format!(
                    "unexpected signature 0x{other:08x} where a local file header was expected"
                )));
            }
        }

        let mut header = [0u8; 26];
        self.read_exact_buffered(&mut header)?;

        let flags = u16::from_le_bytes([header[2], header[3]]);
        let method = u16::from_le_bytes([header[4], header[5]]);
        let compressed_size = u32::from_le_bytes([header[14], header[15], header[16], header[17]]);
        let uncompressed_size =
            u32::from_le_bytes([header[18], header[19], header[20], header[21]]);
        let name_len = u16::from_le_bytes([header[22], header[23]]) as usize;
        let extra_len = u16::from_le_bytes([header[24], header[25]]) as usize;

        let mut name_bytes = vec![0u8; name_len];
        self.read_exact_buffered(&mut name_bytes)?;
        self.skip(extra_len as u64)?;

        let name = decode_entry_name(&name_bytes, flags & FLAG_UTF8_NAME != 0);
        let has_descriptor = flags & FLAG_DATA_DESCRIPTOR != 0;

        self.state = match method {
            METHOD_STORED => {
                if has_descriptor {
                    // A stored entry with deferred sizes has no detectable
                    // boundary in a forward scan.
                    return Err(XlsxError::ZipFormat(format!(
                        "stored entry '{name}' declares a data descriptor"
                    )));
                }
                BodyState::Stored {
                    remaining: u64::from(compressed_size),
                }
            }
            METHOD_DEFLATE => BodyState::Deflate {
                inflate: Box::new(Decompress::new(false)),
                compressed_remaining: if has_descriptor {
                    None
                } else {
                    Some(u64::from(compressed_size))
                },
                has_descriptor,
            },
            other => return Err(XlsxError::UnsupportedCompression(other)),
        };

        let size_hint = if has_descriptor {
            None
        } else {
            Some(u64::from(uncompressed_size))
        };
        log::debug!("zip entry '{}' (method {}, size {:?})", name, method, size_hint);

        Ok(Some(PartInfo { name, size_hint }))
    }

    /// Read decompressed bytes of the current entry's body.
    ///
    /// Returns 0 once the body is exhausted.
    pub fn read_body(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        match &mut self.state {
            BodyState::Idle | BodyState::Finished => Ok(0),
            BodyState::Stored { remaining } => {
                if *remaining == 0 {
                    self.state = BodyState::Finished;
                    return Ok(0);
                }
                let want = (*remaining).min(out.len() as u64) as usize;
                let available = self.ensure_input()?;
                if available == 0 {
                    return Err(XlsxError::ZipFormat(
                        "truncated stored entry body".to_string(),
                    ));
                }
                let n = want.min(available);
                out[..n].copy_from_slice(&self.buf[self.start..self.start + n]);
                self.start += n;
                if let BodyState::Stored { remaining } = &mut self.state {
                    *remaining -= n as u64;
                    if *remaining == 0 {
                        self.state = BodyState::Finished;
                    }
                }
                Ok(n)
            }
            BodyState::Deflate { .. } => self.read_deflate_body(out),
        }
    }

    /// Borrowing [`Read`] view of the current entry's body.
    pub fn body(&mut self) -> PartBody<'_, R> {
        PartBody { zip: self }
    }

    /// Consume the stream, keeping only the current entry's body.
    ///
    /// Used when a single entry is streamed to the end of its consumer (the
    /// worksheet pass); the remainder of the archive is never touched.
    pub fn into_body(self) -> OwnedPartBody<R> {
        OwnedPartBody { zip: self }
    }

    fn read_deflate_body(&mut self, out: &mut [u8]) -> Result<usize> {
        loop {
            let available = self.ensure_input()?;

            let (consumed, produced, status) = {
                let (inflate, compressed_remaining) = match &mut self.state {
                    BodyState::Deflate {
                        inflate,
                        compressed_remaining,
                        ..
                    } => (inflate, compressed_remaining),
                    _ => unreachable!(),
                };

                let limit = match compressed_remaining {
                    Some(rem) => available.min(*rem as usize),
                    None => available,
                };
                let input = &self.buf[self.start..self.start + limit];

                let before_in = inflate.total_in();
                let before_out = inflate.total_out();
                let status = inflate
                    .decompress(input, out, FlushDecompress::None)
                    .map_err(|e| XlsxError::ZipFormat(format!("inflate failed: {e}")))?;
                let consumed = (inflate.total_in() - before_in) as usize;
                let produced = (inflate.total_out() - before_out) as usize;

                if let Some(rem) = compressed_remaining {
                    *rem -= consumed as u64;
                }
                (consumed, produced, status)
            };

            self.start += consumed;

            if status == Status::StreamEnd {
                self.finish_deflate()?;
                return Ok(produced);
            }
            if produced > 0 {
                return Ok(produced);
            }

            // No output and no stream end: the inflater needs more input.
            if consumed == 0 {
                let exhausted = match &self.state {
                    BodyState::Deflate {
                        compressed_remaining: Some(0),
                        ..
                    } => true,
                    _ => self.input_eof && self.start == self.end,
                };
                if exhausted {
                    return Err(XlsxError::ZipFormat(
                        "truncated deflate stream".to_string(),
                    ));
                }
                if status == Status::BufError {
                    return Err(XlsxError::ZipFormat("deflate stream stalled".to_string()));
                }
            }
        }
    }

    /// Consume the post-body trailer after the inflate state reports done.
    fn finish_deflate(&mut self) -> Result<()> {
        let (leftover, has_descriptor) = match &self.state {
            BodyState::Deflate {
                compressed_remaining,
                has_descriptor,
                ..
            } => (compressed_remaining.unwrap_or(0), *has_descriptor),
            _ => unreachable!(),
        };
        // Inflate state (and its window) is released here, before the next
        // entry is opened.
        self.state = BodyState::Finished;

        // Declared compressed size may overshoot the deflate terminator by
        // alignment padding in sloppy writers; stay aligned with the headers.
        self.skip(leftover)?;

        if has_descriptor {
            let first = self.read_u32()?;
            if first == DATA_DESCRIPTOR_SIGNATURE {
                self.skip(12)?;
            } else {
                // Unsigned descriptor form: `first` was the CRC itself.
                self.skip(8)?;
            }
        }
        Ok(())
    }

    fn drain_body(&mut self) -> Result<()> {
        let mut scratch = [0u8; 4096];
        loop {
            if self.read_body(&mut scratch)? == 0 {
                self.state = BodyState::Idle;
                return Ok(());
            }
        }
    }

    /// Make at least one input byte available unless the stream is at EOF.
    /// Returns the number of contiguous buffered bytes.
    fn ensure_input(&mut self) -> Result<usize> {
        if self.start == self.end && !self.input_eof {
            self.start = 0;
            let n = self.input.read(&mut self.buf)?;
            self.end = n;
            if n == 0 {
                self.input_eof = true;
            }
        }
        Ok(self.end - self.start)
    }

    fn read_exact_buffered(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            let available = self.ensure_input()?;
            if available == 0 {
                return Err(XlsxError::ZipFormat("truncated header".to_string()));
            }
            let n = available.min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&self.buf[self.start..self.start + n]);
            self.start += n;
            filled += n;
        }
        Ok(())
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_exact_buffered(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Like [`read_u32`], but a clean EOF before the first byte yields `None`.
    fn try_read_u32(&mut self) -> Result<Option<u32>> {
        if self.ensure_input()? == 0 {
            return Ok(None);
        }
        self.read_u32().map(Some)
    }

    fn skip(&mut self, mut n: u64) -> Result<()> {
        while n > 0 {
            let available = self.ensure_input()?;
            if available == 0 {
                return Err(XlsxError::ZipFormat("truncated archive".to_string()));
            }
            let step = (available as u64).min(n) as usize;
            self.start += step;
            n -= step as u64;
        }
        Ok(())
    }
}

/// Borrowed [`Read`] over the current entry body.
pub struct PartBody<'a, R: Read> {
    zip: &'a mut ZipStream<R>,
}

impl<R: Read> Read for PartBody<'_, R> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        self.zip.read_body(out).map_err(std::io::Error::other)
    }
}

/// Owned [`Read`] over a single entry body (consumes the decoder).
pub struct OwnedPartBody<R: Read> {
    zip: ZipStream<R>,
}

impl<R: Read> Read for OwnedPartBody<R> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        self.zip.read_body(out).map_err(std::io::Error::other)
    }
}

fn decode_entry_name(bytes: &[u8], utf8: bool) -> String {
    if utf8 {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    match std::str::from_utf8(bytes) {
        // ASCII names (the overwhelming majority) are identical in CP437.
        Ok(s) if s.is_ascii() => s.to_string(),
        _ => bytes.iter().map(|&b| cp437_char(b)).collect(),
    }
}

fn cp437_char(byte: u8) -> char {
    const HIGH: [char; 128] = [
        'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', 'É', 'æ',
        'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', 'á', 'í', 'ó', 'ú',
        'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', '░', '▒', '▓', '│', '┤', '╡',
        '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', '└', '┴', '┬', '├', '─', '┼', '╞', '╟',
        '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘',
        '┌', '█', '▄', '▌', '▐', '▀', 'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ',
        '∞', 'φ', 'ε', '∩', '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²',
        '■', '\u{a0}',
    ];
    if byte < 0x80 {
        byte as char
    } else {
        HIGH[(byte - 0x80) as usize]
    }
}
