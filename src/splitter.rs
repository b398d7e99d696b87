use crate::types::RawRecord;

const DELIMITER: &[u8] = b"\n\n";

/// A blank-line separated block that was not held back as a tag block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// A move list containing the marker, paired with the tag block before it.
    Record(RawRecord),
    /// A non-tag block without the marker.
    Unparsed,
}

/// Splits a byte stream on blank lines, keeping a partial block buffered
/// across chunk boundaries.
///
/// A game in the archive is a tag block and a move list, each terminated by a
/// blank line. Tag blocks are held back until the next block arrives; a move
/// list with the marker consumes the held tag block.
pub struct RecordSplitter {
    buffer: Vec<u8>,
    /// Start of the unconsumed bytes in `buffer`.
    start: usize,
    /// Delimiter search resumes here; everything before it was scanned.
    scanned: usize,
    pending_header: Option<Vec<u8>>,
    marker: Vec<u8>,
    discarded: usize,
}

impl RecordSplitter {
    pub fn new(marker: &[u8]) -> Self {
        Self {
            buffer: Vec::with_capacity(64 * 1024),
            start: 0,
            scanned: 0,
            pending_header: None,
            marker: marker.to_vec(),
            discarded: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.start > 0 {
            self.buffer.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete block that is either a record or an unparsed block.
    /// Returns `None` once the buffer holds no further delimiter.
    pub fn next_candidate(&mut self) -> Option<Candidate> {
        while let Some(end) = self.find_delimiter() {
            let segment = self.buffer[self.start..end].trim_ascii();
            let candidate = if segment.is_empty() {
                None
            } else if contains(segment, &self.marker) {
                let header = self.pending_header.take().unwrap_or_default();
                Some(Candidate::Record(RawRecord {
                    header,
                    body: segment.to_vec(),
                }))
            } else if segment.starts_with(b"[") {
                if self.pending_header.replace(segment.to_vec()).is_some() {
                    self.discarded += 1;
                }
                None
            } else {
                self.discarded += 1;
                if self.pending_header.take().is_some() {
                    self.discarded += 1;
                }
                Some(Candidate::Unparsed)
            };

            self.start = end + DELIMITER.len();
            self.scanned = self.start;

            if candidate.is_some() {
                return candidate;
            }
        }
        None
    }

    /// Ends the stream. Returns the number of trailing bytes dropped because
    /// no delimiter followed them.
    pub fn finish(&mut self) -> usize {
        if self.pending_header.take().is_some() {
            self.discarded += 1;
        }
        let trailing = self.buffer.len() - self.start;
        self.buffer.clear();
        self.start = 0;
        self.scanned = 0;
        trailing
    }

    /// Blocks that never became records: orphaned tag blocks and unmarked blocks.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len() - self.start
    }

    fn find_delimiter(&mut self) -> Option<usize> {
        let from = self.scanned.max(self.start);
        match find(&self.buffer[from..], DELIMITER) {
            Some(offset) => Some(from + offset),
            None => {
                // A delimiter may straddle the next chunk boundary.
                self.scanned = self
                    .buffer
                    .len()
                    .saturating_sub(DELIMITER.len() - 1)
                    .max(self.start);
                None
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}
