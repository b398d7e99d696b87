use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::header::extract_headers;
use crate::log;
use crate::moves::parse_moves;
use crate::reader::{ChunkSource, CompressionMode, estimate_uncompressed_size, open_archive};
use crate::splitter::{Candidate, RecordSplitter};
use crate::types::{ParsedRecord, RawRecord};
use crate::writer::{ShardWriter, find_existing_shard};
use smallvec::SmallVec;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Counters for one ingestion run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub shard_count: usize,
    /// Parsed games written as rows.
    pub records_written: u64,
    /// Games dropped because of a malformed tag line.
    pub records_skipped: u64,
    /// Games whose move list stopped parsing part way through.
    pub annotation_truncations: u64,
    /// Empty rows written for blocks without annotations.
    pub placeholder_rows: u64,
    /// Blocks that never became a record.
    pub candidates_discarded: u64,
    /// Decompressed bytes consumed.
    pub bytes_read: u64,
}

/// Converts one archive into CSV shards under `destination_dir` and returns
/// the number of shards written.
pub fn ingest(
    source: &Path,
    destination_dir: &Path,
    batch_size: usize,
) -> Result<usize, IngestError> {
    let config = IngestConfig {
        compression: CompressionMode::from_path(source),
        ..IngestConfig::with_batch_size(batch_size)
    };
    ingest_with_config(source, destination_dir, &config).map(|summary| summary.shard_count)
}

pub fn ingest_with_config(
    source: &Path,
    destination_dir: &Path,
    config: &IngestConfig,
) -> Result<IngestSummary, IngestError> {
    config.validate()?;

    let input = open_archive(source, config.compression)?;
    if let Ok(metadata) = fs::metadata(source) {
        let estimated = estimate_uncompressed_size(metadata.len(), config.compression);
        log::info(format!(
            "Reading '{}': estimated uncompressed size ~{:.1}GB",
            source.display(),
            estimated as f64 / (1024.0 * 1024.0 * 1024.0)
        ));
    }

    ingest_reader(input, destination_dir, config)
}

/// Runs the pipeline over an already decompressed byte stream.
pub fn ingest_reader<R: Read>(
    input: R,
    destination_dir: &Path,
    config: &IngestConfig,
) -> Result<IngestSummary, IngestError> {
    config.validate()?;
    let destination_error = |source: io::Error| IngestError::WriteFailure {
        last_completed_shard: None,
        path: destination_dir.to_path_buf(),
        source: source.into(),
    };
    if let Some(existing) = find_existing_shard(destination_dir, &config.shard_prefix)
        .map_err(destination_error)?
    {
        return Err(IngestError::ShardsExist {
            dir: destination_dir.to_path_buf(),
            existing,
        });
    }
    fs::create_dir_all(destination_dir).map_err(destination_error)?;

    let mut chunks = ChunkSource::new(input, config.chunk_size);
    let mut splitter = RecordSplitter::new(config.move_marker.as_bytes());
    let mut writer = ShardWriter::new(destination_dir, config);
    let mut summary = IngestSummary::default();
    let mut ordinal: u64 = 0;

    loop {
        let chunk = match chunks.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(source) => {
                log::error(format!("Decompression failed: {}", source));
                return Err(IngestError::CorruptArchive {
                    last_completed_shard: writer.last_completed_shard(),
                    source,
                });
            }
        };
        splitter.push(chunk);

        while let Some(candidate) = splitter.next_candidate() {
            match candidate {
                Candidate::Record(raw) => {
                    ordinal += 1;
                    let Some(record) = parse_record(&raw, ordinal, &mut summary) else {
                        continue;
                    };
                    writer.append(&record);
                    summary.records_written += 1;
                }
                Candidate::Unparsed if config.skip_unparsed => continue,
                Candidate::Unparsed => {
                    writer.append(&ParsedRecord::placeholder());
                    summary.placeholder_rows += 1;
                }
            }
            writer.maybe_flush()?;
        }
    }

    let trailing = splitter.finish();
    if trailing > 0 {
        log::debug(format!(
            "Dropped {} trailing bytes without a closing blank line",
            trailing
        ));
    }

    summary.candidates_discarded = splitter.discarded() as u64;
    summary.bytes_read = chunks.bytes_read();
    summary.shard_count = writer.finish()?;

    log::info(format!(
        "Ingested {} records into {} shards ({} skipped, {} truncated, {} bytes read)",
        summary.records_written,
        summary.shard_count,
        summary.records_skipped,
        summary.annotation_truncations,
        summary.bytes_read
    ));

    Ok(summary)
}

/// Extracts headers then moves. A tag block error drops the record; a
/// truncated move list keeps it.
fn parse_record(
    raw: &RawRecord,
    ordinal: u64,
    summary: &mut IngestSummary,
) -> Option<ParsedRecord> {
    let mut diagnostics: SmallVec<[String; 2]> = SmallVec::new();

    let headers = match extract_headers(&raw.header) {
        Ok(headers) => headers,
        Err(err) => {
            summary.records_skipped += 1;
            log::warn(format!("Skipping record {}: {}", ordinal, err));
            return None;
        }
    };
    if headers.is_empty() {
        diagnostics.push("no known tags".to_string());
    }

    let moves = parse_moves(&raw.body);
    if let Some(truncation) = moves.truncation() {
        summary.annotation_truncations += 1;
        diagnostics.push(truncation.to_string());
    }

    if !diagnostics.is_empty() {
        log::warn(format!("Record {}: {}", ordinal, diagnostics.join("; ")));
    }

    Some(ParsedRecord::new(headers, moves))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::shard_columns;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn game(event: &str, white_elo: &str) -> String {
        format!(
            "[Event \"{event}\"]\n[Site \"https://lichess.org/x\"]\n[WhiteElo \"{white_elo}\"]\n[BlackElo \"1600\"]\n[Result \"1-0\"]\n\n1. e4 {{ [%eval 0.2] [%clk 0:05:00] }} 1... e5 {{ [%eval 0.25] [%clk 0:05:00] }} 2. Qh5 {{ [%clk 0:04:58] }} 1-0\n\n"
        )
    }

    fn games(count: usize) -> String {
        (0..count)
            .map(|idx| game(&format!("Rated Blitz {idx}"), "1500"))
            .collect()
    }

    fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.records().map(Result::unwrap).collect()
    }

    fn config(batch_size: usize) -> IngestConfig {
        IngestConfig {
            chunk_size: 7,
            ..IngestConfig::with_batch_size(batch_size)
        }
    }

    #[test]
    fn test_ingest_zstd_archive_end_to_end() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("lichess_db_standard_rated_2017-03.pgn.zst");
        let compressed = zstd::encode_all(games(5).as_bytes(), 3).unwrap();
        fs::write(&archive, compressed).unwrap();
        let out = dir.path().join("shards");

        let shard_count = ingest(&archive, &out, 2).unwrap();

        assert_eq!(shard_count, 3);
        let counts: Vec<usize> = (0..3)
            .map(|idx| read_rows(&out.join(format!("data_{idx}.csv"))).len())
            .collect();
        assert_eq!(counts, [2, 2, 1]);

        let rows = read_rows(&out.join("data_0.csv"));
        assert_eq!(&rows[0][0], "Rated Blitz 0");
        assert_eq!(&rows[0][13], "['e4', 'e5', 'Qh5']");
        assert_eq!(&rows[0][14], "['0.2', '0.25', None]");
        assert_eq!(&rows[0][15], "['0:05:00', '0:05:00', '0:04:58']");
    }

    #[test]
    fn test_every_shard_has_identical_header() {
        let dir = TempDir::new().unwrap();
        let summary = ingest_reader(Cursor::new(games(7)), dir.path(), &config(3)).unwrap();
        assert_eq!(summary.shard_count, 3);

        let expected: Vec<&str> = shard_columns().collect();
        for idx in 0..summary.shard_count {
            let path = dir.path().join(format!("data_{idx}.csv"));
            let mut reader = csv::Reader::from_path(path).unwrap();
            let header: Vec<String> = reader
                .headers()
                .unwrap()
                .iter()
                .map(str::to_string)
                .collect();
            assert_eq!(header, expected);
        }
    }

    #[test]
    fn test_header_scenario_leaves_unlisted_fields_empty() {
        let dir = TempDir::new().unwrap();
        let input = "[Event \"Rated Blitz\"]\n[WhiteElo \"1500\"]\n[BlackElo \"1600\"]\n\n1. e4 { [%eval 0.2] [%clk 0:05:00] } 1-0\n\n";

        ingest_reader(Cursor::new(input), dir.path(), &config(10)).unwrap();

        let rows = read_rows(&dir.path().join("data_0.csv"));
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(&row[0], "Rated Blitz");
        assert_eq!(&row[5], "1500");
        assert_eq!(&row[6], "1600");
        for idx in [1, 2, 3, 4, 7, 8, 9, 10, 11, 12] {
            assert_eq!(&row[idx], "", "column {idx} should be empty");
        }
    }

    #[test]
    fn test_archive_without_marker_still_writes_one_shard() {
        let dir = TempDir::new().unwrap();
        let input = "[Event \"Casual\"]\n\n1. e4 e5 2. Nf3 1-0\n\n[Event \"Casual\"]\n\n1. d4 d5 0-1\n\n";

        let summary = ingest_reader(Cursor::new(input), dir.path(), &config(10)).unwrap();

        assert_eq!(summary.shard_count, 1);
        assert_eq!(summary.records_written, 0);
        assert_eq!(summary.candidates_discarded, 4);
        assert!(read_rows(&dir.path().join("data_0.csv")).is_empty());
    }

    #[test]
    fn test_unparsed_blocks_become_placeholder_rows_when_not_skipped() {
        let dir = TempDir::new().unwrap();
        let input = format!("{}[Event \"Casual\"]\n\n1. e4 e5 1-0\n\n", game("Rated", "1500"));
        let config = IngestConfig {
            skip_unparsed: false,
            ..config(10)
        };

        let summary = ingest_reader(Cursor::new(input), dir.path(), &config).unwrap();

        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.placeholder_rows, 1);
        let rows = read_rows(&dir.path().join("data_0.csv"));
        assert_eq!(rows.len(), 2);
        assert!(rows[1].iter().all(str::is_empty));
    }

    #[test]
    fn test_malformed_header_skips_only_that_record() {
        let dir = TempDir::new().unwrap();
        let broken = "[Event \"Broken]\n\n1. e4 { [%eval 0.2] [%clk 0:05:00] } 1-0\n\n";
        let input = format!("{}{}{}", game("first", "1500"), broken, game("third", "1700"));

        let summary = ingest_reader(Cursor::new(input), dir.path(), &config(10)).unwrap();

        assert_eq!(summary.records_written, 2);
        assert_eq!(summary.records_skipped, 1);
        let rows = read_rows(&dir.path().join("data_0.csv"));
        let events: Vec<&str> = rows.iter().map(|row| &row[0]).collect();
        assert_eq!(events, ["first", "third"]);
    }

    #[test]
    fn test_truncated_annotations_keep_the_record() {
        let dir = TempDir::new().unwrap();
        let input = "[Event \"Partial\"]\n\n1. e4 { [%eval 0.2] [%clk 0:05:00] } 1... e5 2. Nf3 { [%eval 0.2] [%clk 0:04:59] } 1-0\n\n";

        let summary = ingest_reader(Cursor::new(input), dir.path(), &config(10)).unwrap();

        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.annotation_truncations, 1);
        let rows = read_rows(&dir.path().join("data_0.csv"));
        assert_eq!(&rows[0][13], "['e4']");
        assert_eq!(&rows[0][14], "['0.2']");
        assert_eq!(&rows[0][15], "['0:05:00']");
    }

    #[test]
    fn test_rerun_produces_identical_shards() {
        let input = games(9);
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();

        let a = ingest_reader(Cursor::new(input.clone()), first.path(), &config(4)).unwrap();
        let b = ingest_reader(Cursor::new(input), second.path(), &config(4)).unwrap();

        assert_eq!(a, b);
        for idx in 0..a.shard_count {
            let name = format!("data_{idx}.csv");
            assert_eq!(
                fs::read(first.path().join(&name)).unwrap(),
                fs::read(second.path().join(&name)).unwrap()
            );
        }
    }

    #[test]
    fn test_chunk_size_does_not_change_output() {
        let input = games(6);
        let small = TempDir::new().unwrap();
        let large = TempDir::new().unwrap();

        ingest_reader(Cursor::new(input.clone()), small.path(), &config(4)).unwrap();
        let large_config = IngestConfig {
            chunk_size: 1 << 16,
            ..config(4)
        };
        ingest_reader(Cursor::new(input), large.path(), &large_config).unwrap();

        for name in ["data_0.csv", "data_1.csv"] {
            assert_eq!(
                fs::read(small.path().join(name)).unwrap(),
                fs::read(large.path().join(name)).unwrap()
            );
        }
    }

    #[test]
    fn test_rerun_into_directory_with_shards_is_refused() {
        let dir = TempDir::new().unwrap();
        let first = ingest_reader(Cursor::new(games(3)), dir.path(), &config(1)).unwrap();
        assert_eq!(first.shard_count, 4);

        let err = ingest_reader(Cursor::new(games(3)), dir.path(), &config(10)).unwrap_err();

        match err {
            IngestError::ShardsExist { dir: refused, existing } => {
                assert_eq!(refused, dir.path());
                assert_eq!(existing, dir.path().join("data_0.csv"));
            }
            other => panic!("unexpected error: {other}"),
        }
        let files = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 4);
        assert_eq!(read_rows(&dir.path().join("data_3.csv")).len(), 0);
    }

    #[test]
    fn test_directory_with_other_files_is_accepted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.txt"), b"notes").unwrap();

        let summary = ingest_reader(Cursor::new(games(2)), dir.path(), &config(10)).unwrap();

        assert_eq!(summary.shard_count, 1);
        assert_eq!(read_rows(&dir.path().join("data_0.csv")).len(), 2);
    }

    /// Yields `good` and then fails like a decoder hitting a bad frame.
    struct FailingReader {
        good: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.good.read(buf)? {
                0 => Err(io::Error::other("Unknown frame descriptor")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_corrupt_stream_reports_last_completed_shard() {
        let dir = TempDir::new().unwrap();
        let reader = FailingReader {
            good: Cursor::new(games(5).into_bytes()),
        };

        let err = ingest_reader(reader, dir.path(), &config(2)).unwrap_err();

        assert!(matches!(err, IngestError::CorruptArchive { .. }));
        assert_eq!(err.last_completed_shard(), Some(1));
        assert!(dir.path().join("data_1.csv").exists());
        assert!(!dir.path().join("data_2.csv").exists());
    }

    #[test]
    fn test_corrupt_zstd_archive_is_fatal() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.pgn.zst");
        fs::write(&archive, b"this is not zstd").unwrap();

        let err = ingest(&archive, &dir.path().join("out"), 10).unwrap_err();

        assert!(matches!(err, IngestError::CorruptArchive { .. }));
        assert_eq!(err.last_completed_shard(), None);
    }

    #[test]
    fn test_plain_archive_via_config() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("games.pgn");
        fs::write(&archive, games(3)).unwrap();
        let config = IngestConfig {
            compression: CompressionMode::Plain,
            ..IngestConfig::default()
        };

        let summary = ingest_with_config(&archive, &dir.path().join("out"), &config).unwrap();

        assert_eq!(summary.shard_count, 1);
        assert_eq!(summary.records_written, 3);
        assert_eq!(summary.bytes_read, games(3).len() as u64);
    }

    #[test]
    fn test_zero_batch_size_is_rejected_before_reading() {
        let dir = TempDir::new().unwrap();
        let config = IngestConfig::with_batch_size(0);
        let err = ingest_reader(Cursor::new(games(1)), dir.path(), &config).unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_parsed_sequences_have_equal_length() {
        let raw = RawRecord {
            header: b"[Event \"x\"]".to_vec(),
            body: b"1. e4 { [%eval 0.2] [%clk 0:05:00] } 1... e5 { [%clk 0:05:00] } 2. d4 { [%eval 0.1] } 1-0".to_vec(),
        };
        let mut summary = IngestSummary::default();

        let record = parse_record(&raw, 1, &mut summary).unwrap();
        let moves = record.moves.unwrap();

        assert_eq!(moves.len(), 3);
        assert_eq!(moves.evaluations().len(), moves.len());
        assert_eq!(moves.clocks().len(), moves.len());
    }
}
