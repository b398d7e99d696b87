use crate::error::AnnotationTruncation;

pub const HEADER_FIELD_COUNT: usize = 13;

/// Tags carried into every shard, in canonical column order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HeaderField {
    Event = 0,
    Site = 1,
    White = 2,
    Black = 3,
    Result = 4,
    WhiteElo = 5,
    BlackElo = 6,
    WhiteRatingDiff = 7,
    BlackRatingDiff = 8,
    Eco = 9,
    Opening = 10,
    TimeControl = 11,
    Termination = 12,
}

impl HeaderField {
    pub const ALL: [HeaderField; HEADER_FIELD_COUNT] = [
        Self::Event,
        Self::Site,
        Self::White,
        Self::Black,
        Self::Result,
        Self::WhiteElo,
        Self::BlackElo,
        Self::WhiteRatingDiff,
        Self::BlackRatingDiff,
        Self::Eco,
        Self::Opening,
        Self::TimeControl,
        Self::Termination,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn tag_name(self) -> &'static str {
        match self {
            Self::Event => "Event",
            Self::Site => "Site",
            Self::White => "White",
            Self::Black => "Black",
            Self::Result => "Result",
            Self::WhiteElo => "WhiteElo",
            Self::BlackElo => "BlackElo",
            Self::WhiteRatingDiff => "WhiteRatingDiff",
            Self::BlackRatingDiff => "BlackRatingDiff",
            Self::Eco => "ECO",
            Self::Opening => "Opening",
            Self::TimeControl => "TimeControl",
            Self::Termination => "Termination",
        }
    }

    pub fn from_tag_name(name: &str) -> Option<Self> {
        let field = match name {
            "Event" => Self::Event,
            "Site" => Self::Site,
            "White" => Self::White,
            "Black" => Self::Black,
            "Result" => Self::Result,
            "WhiteElo" => Self::WhiteElo,
            "BlackElo" => Self::BlackElo,
            "WhiteRatingDiff" => Self::WhiteRatingDiff,
            "BlackRatingDiff" => Self::BlackRatingDiff,
            "ECO" => Self::Eco,
            "Opening" => Self::Opening,
            "TimeControl" => Self::TimeControl,
            "Termination" => Self::Termination,
            _ => return None,
        };
        Some(field)
    }
}

/// Header values of one game, one slot per [`HeaderField`].
///
/// Every known field is always present; tags missing from the source stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    values: [Option<String>; HEADER_FIELD_COUNT],
}

impl HeaderFields {
    pub fn get(&self, field: HeaderField) -> Option<&str> {
        self.values[field.index()].as_deref()
    }

    /// Later occurrences of the same tag overwrite earlier ones.
    pub fn set(&mut self, field: HeaderField, value: String) {
        self.values[field.index()] = Some(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (HeaderField, Option<&str>)> {
        HeaderField::ALL
            .iter()
            .map(|&field| (field, self.values[field.index()].as_deref()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// Per-ply move tokens with their evaluation and clock annotations.
///
/// The three sequences always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveAnnotations {
    moves: Vec<String>,
    evaluations: Vec<Option<String>>,
    clocks: Vec<Option<String>>,
    truncation: Option<AnnotationTruncation>,
}

impl MoveAnnotations {
    pub fn push(&mut self, san: &str, evaluation: Option<&str>, clock: Option<&str>) {
        self.moves.push(san.to_string());
        self.evaluations.push(evaluation.map(str::to_string));
        self.clocks.push(clock.map(str::to_string));
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn evaluations(&self) -> &[Option<String>] {
        &self.evaluations
    }

    pub fn clocks(&self) -> &[Option<String>] {
        &self.clocks
    }

    /// Where the move list stopped being parseable, if it did.
    pub fn truncation(&self) -> Option<AnnotationTruncation> {
        self.truncation
    }

    pub(crate) fn mark_truncated(&mut self, truncation: AnnotationTruncation) {
        self.truncation = Some(truncation);
    }
}

/// A game split out of the archive: its tag block and its move list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub header: Vec<u8>,
    pub body: Vec<u8>,
}

/// One shard row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    pub headers: HeaderFields,
    pub moves: Option<MoveAnnotations>,
}

impl ParsedRecord {
    pub fn new(headers: HeaderFields, moves: MoveAnnotations) -> Self {
        Self {
            headers,
            moves: Some(moves),
        }
    }

    /// Row emitted for a block without annotations when those are not skipped.
    /// Every column is empty.
    pub fn placeholder() -> Self {
        Self::default()
    }
}
