//! Amazon S3 source
//!
//! Blocking wrappers around the async AWS SDK: a current session builds its
//! own tokio runtime, streams `get_object` body bytes, and resolves
//! `head_object` for metadata.

use std::io;
use std::pin::Pin;

use aws_sdk_s3::Client;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::runtime::Runtime;

use crate::error::{Result, XlsxError};
use crate::source::{ByteSource, ChunkStream, SourceInfo, SourceKind, DEFAULT_CHUNK_SIZE};

/// Streams an XLSX object from S3.
pub struct S3Source {
    bucket: String,
    key: String,
    region: Option<String>,
    chunk_size: usize,
}

impl S3Source {
    pub fn new(bucket: &str, key: &str) -> Self {
        S3Source {
            bucket: bucket.to_string(),
            key: key.to_string(),
            region: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the AWS region instead of relying on the default provider
    /// chain.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    fn runtime(&self) -> Result<Runtime> {
        Runtime::new()
            .map_err(|e| XlsxError::SourceUnavailable(format!("tokio runtime: {e}")))
    }

    async fn client(&self) -> Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(ref region) = self.region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region.clone()));
        }
        Client::new(&loader.load().await)
    }

    fn origin(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

impl ByteSource for S3Source {
    fn open_stream(&self) -> Result<ChunkStream> {
        let runtime = self.runtime()?;
        let body = runtime
            .block_on(async {
                self.client()
                    .await
                    .get_object()
                    .bucket(&self.bucket)
                    .key(&self.key)
                    .send()
                    .await
            })
            .map_err(|e| {
                XlsxError::SourceUnavailable(format!("GET {} failed: {}", self.origin(), e))
            })?
            .body;

        Ok(Box::new(S3Chunks {
            runtime,
            reader: Box::pin(body.into_async_read()),
            chunk_size: self.chunk_size,
            failed: false,
        }))
    }

    fn describe(&self) -> SourceInfo {
        let mut size = None;
        let mut content_type = None;

        match self.runtime() {
            Ok(runtime) => {
                let head = runtime.block_on(async {
                    self.client()
                        .await
                        .head_object()
                        .bucket(&self.bucket)
                        .key(&self.key)
                        .send()
                        .await
                });
                match head {
                    Ok(output) => {
                        size = output.content_length().and_then(|n| u64::try_from(n).ok());
                        content_type = output.content_type().map(str::to_string);
                    }
                    Err(e) => {
                        log::warn!("could not retrieve metadata for {}: {}", self.origin(), e);
                    }
                }
            }
            Err(e) => log::warn!("could not retrieve metadata for {}: {}", self.origin(), e),
        }

        SourceInfo {
            kind: SourceKind::ObjectStore,
            size,
            content_type,
            origin: self.origin(),
        }
    }
}

/// Pulls body chunks by blocking on the async reader, one chunk per `next`.
struct S3Chunks {
    runtime: Runtime,
    reader: Pin<Box<dyn AsyncRead + Send>>,
    chunk_size: usize,
    failed: bool,
}

impl Iterator for S3Chunks {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut chunk = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < chunk.len() {
            match self.runtime.block_on(self.reader.read(&mut chunk[filled..])) {
                Ok(0) => break,
                Ok(n) => filled += n,
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
