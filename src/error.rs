use std::fmt;
use std::io;
use std::path::PathBuf;

/// Fatal failures that abort an ingestion run.
///
/// Archive and write failures carry the index of the last shard that was
/// completely written, so a caller can resume from the next one.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to open archive '{}': {source}", .path.display())]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "corrupt archive (last completed shard: {}): {source}",
        ShardIndex(.last_completed_shard)
    )]
    CorruptArchive {
        last_completed_shard: Option<usize>,
        #[source]
        source: io::Error,
    },

    #[error(
        "failed to write shard '{}' (last completed shard: {}): {source}",
        .path.display(),
        ShardIndex(.last_completed_shard)
    )]
    WriteFailure {
        last_completed_shard: Option<usize>,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(
        "'{}' already holds shard '{}' from an earlier run; delete it to ingest again",
        .dir.display(),
        .existing.display()
    )]
    ShardsExist {
        dir: PathBuf,
        existing: PathBuf,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid archive pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl IngestError {
    /// Index of the last shard fully persisted before the failure, if the
    /// failure happened mid-run.
    pub fn last_completed_shard(&self) -> Option<usize> {
        match self {
            Self::CorruptArchive {
                last_completed_shard,
                ..
            }
            | Self::WriteFailure {
                last_completed_shard,
                ..
            } => *last_completed_shard,
            _ => None,
        }
    }
}

struct ShardIndex<'a>(&'a Option<usize>);

impl fmt::Display for ShardIndex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(index) => write!(f, "{}", index),
            None => f.write_str("none"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeaderParseReason {
    MissingBrackets,
    MissingSeparator,
    UnbalancedQuotes,
}

impl fmt::Display for HeaderParseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::MissingBrackets => "tag line is not enclosed in brackets",
            Self::MissingSeparator => "no space between tag name and value",
            Self::UnbalancedQuotes => "tag value is not enclosed in quotes",
        };
        f.write_str(reason)
    }
}

/// A malformed tag line. The record it belongs to is dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed tag line {line_number} ({reason}): {line:?}")]
pub struct HeaderParseError {
    pub line_number: usize,
    pub line: String,
    pub reason: HeaderParseReason,
}

/// The point at which a move list stopped matching the annotation layout.
/// Plies parsed before it are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("annotations truncated at ply {ply} ({token_count} tokens)")]
pub struct AnnotationTruncation {
    pub ply: usize,
    pub token_count: usize,
}
