//! Adapter presenting a chunked byte stream as a pull-style reader

use std::collections::VecDeque;
use std::io::{self, Read};

use crate::source::ChunkStream;

/// Wraps an iterator of byte chunks as a [`Read`] implementation.
///
/// The XML and ZIP layers want `read(n)`; sources produce chunks of whatever
/// size the transport hands back. This adapter buffers at most one partially
/// consumed chunk plus whatever the iterator yields next, so peak memory is
/// bounded by the source chunk size.
pub struct ChunkReader {
    chunks: ChunkStream,
    buffer: VecDeque<u8>,
    done: bool,
}

impl ChunkReader {
    pub fn new(chunks: ChunkStream) -> Self {
        ChunkReader {
            chunks,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        if self.done {
            return Ok(());
        }
        match self.chunks.next() {
            Some(Ok(chunk)) => {
                self.buffer.extend(chunk);
                Ok(())
            }
            Some(Err(e)) => {
                self.done = true;
                Err(e)
            }
            None => {
                self.done = true;
                Ok(())
            }
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.buffer.is_empty() && !self.done {
            self.fill()?;
        }
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let (front, _) = self.buffer.as_slices();
        let n = front.len().min(out.len());
        out[..n].copy_from_slice(&front[..n]);
        self.buffer.drain(..n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(parts: &[&[u8]]) -> ChunkStream {
        let owned: Vec<io::Result<Vec<u8>>> = parts.iter().map(|p| Ok(p.to_vec())).collect();
        Box::new(owned.into_iter())
    }

    #[test]
    fn test_read_across_chunk_boundaries() {
        let mut reader = ChunkReader::new(stream_of(&[b"hel", b"lo wo", b"rld"]));
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b" world");
    }

    #[test]
    fn test_short_read_at_eof() {
        let mut reader = ChunkReader::new(stream_of(&[b"ab"]));
        let mut buf = [0u8; 8];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ab");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_error_is_propagated() {
        let chunks: Vec<io::Result<Vec<u8>>> = vec![
            Ok(b"ok".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "lost")),
        ];
        let mut reader = ChunkReader::new(Box::new(chunks.into_iter()));
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert!(reader.read(&mut buf).is_err());
    }
}
