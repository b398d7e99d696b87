use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::log;
use crate::types::{HeaderField, ParsedRecord};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const SHARD_COLUMN_COUNT: usize = 16;

/// How the per-ply sequences are rendered into a single CSV field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListFormat {
    /// `['e4', None]`, readable with Python's `ast.literal_eval`.
    Python,
    /// `["e4",null]`
    Json,
}

impl ListFormat {
    pub fn render<'a>(self, values: impl Iterator<Item = Option<&'a str>>) -> String {
        match self {
            Self::Python => {
                let mut out = String::from("[");
                for (idx, value) in values.enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    match value {
                        Some(value) => {
                            out.push('\'');
                            for c in value.chars() {
                                if matches!(c, '\'' | '\\') {
                                    out.push('\\');
                                }
                                out.push(c);
                            }
                            out.push('\'');
                        }
                        None => out.push_str("None"),
                    }
                }
                out.push(']');
                out
            }
            Self::Json => {
                let values: Vec<Option<&str>> = values.collect();
                serde_json::to_string(&values).unwrap_or_else(|_| "[]".to_string())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ColumnSource {
    Header(HeaderField),
    Moves,
    Evaluations,
    Clocks,
}

struct ShardColumnDef {
    name: &'static str,
    source: ColumnSource,
}

static SHARD_COLUMNS: [ShardColumnDef; SHARD_COLUMN_COUNT] = [
    ShardColumnDef {
        name: "Event",
        source: ColumnSource::Header(HeaderField::Event),
    },
    ShardColumnDef {
        name: "Site",
        source: ColumnSource::Header(HeaderField::Site),
    },
    ShardColumnDef {
        name: "White",
        source: ColumnSource::Header(HeaderField::White),
    },
    ShardColumnDef {
        name: "Black",
        source: ColumnSource::Header(HeaderField::Black),
    },
    ShardColumnDef {
        name: "Result",
        source: ColumnSource::Header(HeaderField::Result),
    },
    ShardColumnDef {
        name: "WhiteElo",
        source: ColumnSource::Header(HeaderField::WhiteElo),
    },
    ShardColumnDef {
        name: "BlackElo",
        source: ColumnSource::Header(HeaderField::BlackElo),
    },
    ShardColumnDef {
        name: "WhiteRatingDiff",
        source: ColumnSource::Header(HeaderField::WhiteRatingDiff),
    },
    ShardColumnDef {
        name: "BlackRatingDiff",
        source: ColumnSource::Header(HeaderField::BlackRatingDiff),
    },
    ShardColumnDef {
        name: "ECO",
        source: ColumnSource::Header(HeaderField::Eco),
    },
    ShardColumnDef {
        name: "Opening",
        source: ColumnSource::Header(HeaderField::Opening),
    },
    ShardColumnDef {
        name: "TimeControl",
        source: ColumnSource::Header(HeaderField::TimeControl),
    },
    ShardColumnDef {
        name: "Termination",
        source: ColumnSource::Header(HeaderField::Termination),
    },
    ShardColumnDef {
        name: "chess_moves_list",
        source: ColumnSource::Moves,
    },
    ShardColumnDef {
        name: "evaluations_list",
        source: ColumnSource::Evaluations,
    },
    ShardColumnDef {
        name: "times_list",
        source: ColumnSource::Clocks,
    },
];

/// Column names shared by every shard, in file order.
pub fn shard_columns() -> impl Iterator<Item = &'static str> {
    SHARD_COLUMNS.iter().map(|column| column.name)
}

impl ColumnSource {
    fn value(self, record: &ParsedRecord, format: ListFormat) -> Option<String> {
        match self {
            Self::Header(field) => record.headers.get(field).map(str::to_string),
            Self::Moves => record
                .moves
                .as_ref()
                .map(|m| format.render(m.moves().iter().map(|s| Some(s.as_str())))),
            Self::Evaluations => record
                .moves
                .as_ref()
                .map(|m| format.render(m.evaluations().iter().map(|e| e.as_deref()))),
            Self::Clocks => record
                .moves
                .as_ref()
                .map(|m| format.render(m.clocks().iter().map(|c| c.as_deref()))),
        }
    }
}

/// Rows waiting for the next shard, stored column by column.
struct Batch {
    columns: [Vec<Option<String>>; SHARD_COLUMN_COUNT],
    rows: usize,
}

impl Batch {
    fn new() -> Self {
        Self {
            columns: Default::default(),
            rows: 0,
        }
    }

    fn push(&mut self, record: &ParsedRecord, format: ListFormat) {
        for (column, def) in self.columns.iter_mut().zip(SHARD_COLUMNS.iter()) {
            column.push(def.source.value(record, format));
        }
        self.rows += 1;
    }

    fn row(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(move |column| column[idx].as_deref().unwrap_or(""))
    }

    /// Empties every column while keeping its allocation.
    fn clear(&mut self) {
        for column in self.columns.iter_mut() {
            column.clear();
        }
        self.rows = 0;
    }

    fn len(&self) -> usize {
        self.rows
    }
}

/// First file in `dir` named like a shard (`<prefix><index>.csv`, or its
/// temporary `.csv.tmp`), in name order. A missing `dir` holds none.
pub fn find_existing_shard(dir: &Path, prefix: &str) -> io::Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut shards = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(name) = name.to_str()
            && let Some(rest) = name.strip_prefix(prefix)
            && let Some(index) = rest
                .strip_suffix(".csv")
                .or_else(|| rest.strip_suffix(".csv.tmp"))
            && !index.is_empty()
            && index.bytes().all(|b| b.is_ascii_digit())
        {
            shards.push(entry.path());
        }
    }
    shards.sort();
    Ok(shards.into_iter().next())
}

/// Accumulates records and writes them as numbered CSV shards.
pub struct ShardWriter {
    dir: PathBuf,
    prefix: String,
    batch_size: usize,
    list_format: ListFormat,
    batch: Batch,
    next_index: usize,
}

impl ShardWriter {
    pub fn new(dir: &Path, config: &IngestConfig) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: config.shard_prefix.clone(),
            batch_size: config.batch_size.max(1),
            list_format: config.list_format,
            batch: Batch::new(),
            next_index: 0,
        }
    }

    pub fn append(&mut self, record: &ParsedRecord) {
        self.batch.push(record, self.list_format);
    }

    /// Writes the batch as a new shard once it holds `batch_size` rows.
    pub fn maybe_flush(&mut self) -> Result<bool, IngestError> {
        if self.batch.len() < self.batch_size {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Writes whatever is left, even an empty batch, and returns the number
    /// of shards written.
    pub fn finish(mut self) -> Result<usize, IngestError> {
        self.flush()?;
        Ok(self.next_index)
    }

    pub fn shard_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}{}.csv", self.prefix, index))
    }

    pub fn last_completed_shard(&self) -> Option<usize> {
        self.next_index.checked_sub(1)
    }

    pub fn pending_rows(&self) -> usize {
        self.batch.len()
    }

    fn flush(&mut self) -> Result<(), IngestError> {
        let path = self.shard_path(self.next_index);
        let rows = self.batch.len();

        self.write_shard(&path)
            .map_err(|source| IngestError::WriteFailure {
                last_completed_shard: self.last_completed_shard(),
                path: path.clone(),
                source,
            })?;

        log::info(format!(
            "Wrote shard {} ({} rows) to '{}'",
            self.next_index,
            rows,
            path.display()
        ));

        self.next_index += 1;
        self.batch.clear();
        Ok(())
    }

    /// Writes to a temporary name first so a failed write never leaves a
    /// partial file under the shard's final name.
    fn write_shard(&self, path: &Path) -> Result<(), csv::Error> {
        let tmp_path = path.with_extension("csv.tmp");

        let mut writer = csv::Writer::from_path(&tmp_path)?;
        writer.write_record(shard_columns())?;
        for idx in 0..self.batch.len() {
            writer.write_record(self.batch.row(idx))?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
