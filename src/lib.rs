//! Streams a zstd-compressed chess game archive into fixed-size CSV shards.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let shards = chess_shards::ingest(
//!     Path::new("external/lichess_db_standard_rated_2017-03.pgn.zst"),
//!     Path::new("raw/lichess_db_standard_rated_2017-03"),
//!     chess_shards::DEFAULT_BATCH_SIZE,
//! )?;
//! println!("wrote {} shards", shards);
//! # Ok::<(), chess_shards::IngestError>(())
//! ```

mod log;

pub mod config;
pub mod discovery;
pub mod error;
pub mod header;
pub mod moves;
pub mod pipeline;
pub mod reader;
pub mod splitter;
pub mod types;
pub mod writer;

pub use config::{DEFAULT_BATCH_SIZE, IngestConfig};
pub use discovery::{archive_output_dir, ingest_all, resolve_archive_paths};
pub use error::{AnnotationTruncation, HeaderParseError, HeaderParseReason, IngestError};
pub use header::extract_headers;
pub use moves::parse_moves;
pub use pipeline::{IngestSummary, ingest, ingest_reader, ingest_with_config};
pub use reader::CompressionMode;
pub use splitter::{Candidate, RecordSplitter};
pub use types::{HeaderField, HeaderFields, MoveAnnotations, ParsedRecord, RawRecord};
pub use writer::{ListFormat, ShardWriter, shard_columns};
