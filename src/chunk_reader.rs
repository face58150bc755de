//! Chunked reading of raw trace bytes into blobs
//!
//! The trace source hands out bytes through any [`std::io::Read`]. The reader
//! cuts it into [`TraceBlob`]s of at most `chunk_size` bytes, one fresh
//! allocation per chunk, which the pipeline then turns into views.

use crate::blob::{BlobRecycler, TraceBlob};
use crate::blob_view::{TraceBlobView, MAX_VIEW_LENGTH};
use crate::config::IngestConfig;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while reading trace chunks
#[derive(Error, Debug)]
pub enum ChunkReadError {
    #[error("Invalid chunk size {size}: must be between 1 and {max} bytes")]
    InvalidChunkSize { size: usize, max: usize },

    #[error("IO error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for chunk reading operations
pub type Result<T> = std::result::Result<T, ChunkReadError>;

/// Splits a byte source into owned trace blobs
///
/// # Example
/// ```
/// use tracefold::chunk_reader::ChunkReader;
///
/// let source: &[u8] = b"abcdefg";
/// let mut reader = ChunkReader::new(source, 3).unwrap();
///
/// let sizes: Vec<usize> = reader
///     .by_ref()
///     .map(|view| view.unwrap().len())
///     .collect();
/// assert_eq!(sizes, vec![3, 3, 1]);
/// assert_eq!(reader.bytes_read(), 7);
/// ```
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    recycler: Option<Arc<dyn BlobRecycler>>,
    bytes_read: u64,
    chunks_read: u64,
    finished: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Create a reader producing chunks of at most `chunk_size` bytes
    pub fn new(reader: R, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_size > MAX_VIEW_LENGTH {
            return Err(ChunkReadError::InvalidChunkSize {
                size: chunk_size,
                max: MAX_VIEW_LENGTH,
            });
        }

        Ok(Self {
            reader,
            chunk_size,
            recycler: None,
            bytes_read: 0,
            chunks_read: 0,
            finished: false,
        })
    }

    /// Create a reader using the configured chunk size
    pub fn from_config(reader: R, config: &IngestConfig) -> Result<Self> {
        Self::new(reader, config.chunk_size)
    }

    /// Attach `recycler` to every blob produced by this reader
    pub fn with_recycler(mut self, recycler: Arc<dyn BlobRecycler>) -> Self {
        self.recycler = Some(recycler);
        self
    }

    /// Read the next chunk, or `None` at end of input
    pub fn next_blob(&mut self) -> Result<Option<TraceBlob>> {
        if self.finished {
            return Ok(None);
        }

        let mut data = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < self.chunk_size {
            match self.reader.read(&mut data[filled..]) {
                Ok(0) => {
                    self.finished = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    self.finished = true;
                    return Err(ChunkReadError::Io {
                        offset: self.bytes_read + filled as u64,
                        source,
                    });
                }
            }
        }

        if filled == 0 {
            return Ok(None);
        }

        if filled < self.chunk_size {
            // a short final chunk must not pin a full chunk's capacity
            data.truncate(filled);
            data.shrink_to_fit();
        }
        self.bytes_read += filled as u64;
        self.chunks_read += 1;
        tracing::trace!(chunk = self.chunks_read, size = filled, "read trace chunk");

        let blob = TraceBlob::take_ownership(data);
        Ok(Some(match &self.recycler {
            Some(recycler) => blob.with_recycler(Arc::clone(recycler)),
            None => blob,
        }))
    }

    /// Read the next chunk and hand it straight to a view
    pub fn next_view(&mut self) -> Result<Option<TraceBlobView>> {
        Ok(self.next_blob()?.map(TraceBlobView::new))
    }

    /// Total bytes read so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Total chunks produced so far
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<TraceBlobView>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_view().transpose()
    }
}
