use crate::error::IngestError;
use crate::reader::CompressionMode;
use crate::writer::ListFormat;

pub const DEFAULT_BATCH_SIZE: usize = 125_000;
pub const DEFAULT_CHUNK_SIZE: usize = 4096;
/// Present in every move list that carries both an evaluation and a clock.
pub const DEFAULT_MOVE_MARKER: &str = "] [%clk ";
pub const DEFAULT_SHARD_PREFIX: &str = "data_";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestConfig {
    /// Rows per shard before it is flushed.
    pub batch_size: usize,
    /// Bytes requested from the decompressor per pull.
    pub chunk_size: usize,
    pub compression: CompressionMode,
    /// Blocks without this literal are not games worth parsing.
    pub move_marker: String,
    /// Drop blocks without the move marker instead of writing an empty row for them.
    pub skip_unparsed: bool,
    pub list_format: ListFormat,
    /// Shards are named `<prefix><index>.csv`.
    pub shard_prefix: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            compression: CompressionMode::Zstd,
            move_marker: DEFAULT_MOVE_MARKER.to_string(),
            skip_unparsed: true,
            list_format: ListFormat::Python,
            shard_prefix: DEFAULT_SHARD_PREFIX.to_string(),
        }
    }
}

impl IngestConfig {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.batch_size == 0 {
            return Err(IngestError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.move_marker.is_empty() {
            return Err(IngestError::InvalidConfig(
                "move_marker must not be empty".to_string(),
            ));
        }
        if self.shard_prefix.contains(['/', '\\']) {
            return Err(IngestError::InvalidConfig(format!(
                "shard_prefix '{}' must not contain path separators",
                self.shard_prefix
            )));
        }
        Ok(())
    }
}
