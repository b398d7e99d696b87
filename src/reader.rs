use crate::error::IngestError;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use zstd::stream::read::Decoder as ZstdDecoder;

/// Published ratio between the uncompressed and compressed archive sizes.
pub const ZSTD_COMPRESSION_RATIO: f64 = 7.1;

pub type ArchiveInput = Box<dyn Read + Send>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionMode {
    Plain,
    Zstd,
}

impl CompressionMode {
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        let normalized = raw.trim();
        if normalized.eq_ignore_ascii_case("zstd") || normalized.eq_ignore_ascii_case("zst") {
            Ok(Self::Zstd)
        } else if normalized.eq_ignore_ascii_case("plain")
            || normalized.eq_ignore_ascii_case("none")
        {
            Ok(Self::Plain)
        } else {
            Err(IngestError::InvalidConfig(format!(
                "Invalid compression value '{}'. Supported values: 'zstd' or 'plain'.",
                normalized
            )))
        }
    }

    /// Guesses the mode from the file extension, defaulting to zstd.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pgn") => Self::Plain,
            _ => Self::Zstd,
        }
    }
}

pub fn open_archive(
    path: &Path,
    compression: CompressionMode,
) -> Result<ArchiveInput, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::OpenArchive {
        path: path.to_path_buf(),
        source,
    })?;

    match compression {
        CompressionMode::Plain => Ok(Box::new(file)),
        CompressionMode::Zstd => ZstdDecoder::new(file)
            .map(|decoder| Box::new(decoder) as ArchiveInput)
            .map_err(|source| IngestError::OpenArchive {
                path: path.to_path_buf(),
                source,
            }),
    }
}

pub fn estimate_uncompressed_size(compressed_len: u64, compression: CompressionMode) -> u64 {
    match compression {
        CompressionMode::Plain => compressed_len,
        CompressionMode::Zstd => (compressed_len as f64 * ZSTD_COMPRESSION_RATIO) as u64,
    }
}

/// Pull-based source of decompressed chunks.
///
/// `next_chunk` yields `None` at end of stream. Any read error is returned
/// as-is; the decoder cannot be resumed after one.
pub struct ChunkSource<R> {
    inner: R,
    buf: Vec<u8>,
    bytes_read: u64,
}

impl<R: Read> ChunkSource<R> {
    pub fn new(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            buf: vec![0; chunk_size.max(1)],
            bytes_read: 0,
        }
    }

    pub fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    self.bytes_read += n as u64;
                    return Ok(Some(&self.buf[..n]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
