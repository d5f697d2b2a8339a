//! Block reader over a local byte source.

use std::io;
use std::path::Path;

use chunkstream_protocol::ChunkSize;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Reads a byte source in blocks of exactly `chunk_size` bytes, except the
/// last.
///
/// Every block but the final one is full even when the underlying reads
/// return short counts. Once the end of the source (or a read error) has
/// been seen the reader yields nothing more.
pub struct SourceReader<R = File> {
    reader: R,
    chunk_size: usize,
    offset: u64,
    done: bool,
}

impl SourceReader<File> {
    /// Opens the file at `path` for block reading.
    pub async fn open(path: &Path, chunk_size: ChunkSize) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::new(file, chunk_size))
    }
}

impl<R> SourceReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R, chunk_size: ChunkSize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.get(),
            offset: 0,
            done: false,
        }
    }

    /// Reads the next block. Returns `None` at end of source.
    pub async fn next_block(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }

        let mut block = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < block.len() {
            match self.reader.read(&mut block[filled..]).await {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        block.truncate(filled);
        self.offset += filled as u64;
        Ok(Some(block))
    }

    /// Bytes read so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}
