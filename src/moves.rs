use crate::error::AnnotationTruncation;
use crate::types::MoveAnnotations;
use smallvec::SmallVec;

/// Separates the move number from the ply that follows it (`"12. "`, `"12... "`).
pub const MOVE_NUMBER_SEPARATOR: &str = ". ";
pub const EVAL_KEYWORD: &str = "[%eval";

type PlyTokens<'a> = SmallVec<[&'a str; 8]>;

/// Token layouts of a ply group, by token count.
///
/// `e4 { [%eval 0.17] [%clk 0:03:00] } 1..` has eight tokens,
/// `e4 { [%clk 0:03:00] } 1..` has six.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PlyShape {
    EvalAndClock,
    SingleAnnotation,
}

impl PlyShape {
    fn classify(token_count: usize) -> Option<Self> {
        match token_count {
            8 => Some(Self::EvalAndClock),
            6 => Some(Self::SingleAnnotation),
            _ => None,
        }
    }

    fn resolve<'a>(self, tokens: &PlyTokens<'a>) -> (Option<&'a str>, Option<&'a str>) {
        match self {
            Self::EvalAndClock => (
                Some(strip_bracket(tokens[3])),
                Some(strip_bracket(tokens[5])),
            ),
            Self::SingleAnnotation if tokens[2] == EVAL_KEYWORD => {
                (Some(strip_bracket(tokens[3])), None)
            }
            Self::SingleAnnotation => (None, Some(strip_bracket(tokens[3]))),
        }
    }
}

#[derive(Debug)]
enum ParseState<'a> {
    AwaitingMove,
    AwaitingEvalOrClock {
        tokens: PlyTokens<'a>,
        shape: PlyShape,
    },
    Truncated(AnnotationTruncation),
}

/// Consumes ply groups one at a time. Once a group does not fit a known
/// layout the parser stays truncated and ignores further input.
struct AnnotationParser<'a> {
    state: ParseState<'a>,
    annotations: MoveAnnotations,
}

impl<'a> AnnotationParser<'a> {
    fn new() -> Self {
        Self {
            state: ParseState::AwaitingMove,
            annotations: MoveAnnotations::default(),
        }
    }

    fn is_truncated(&self) -> bool {
        matches!(self.state, ParseState::Truncated(_))
    }

    fn feed(&mut self, group: &'a str) {
        loop {
            let state = std::mem::replace(&mut self.state, ParseState::AwaitingMove);
            self.state = match state {
                ParseState::AwaitingMove => {
                    let tokens: PlyTokens<'a> = group.split(' ').collect();
                    match PlyShape::classify(tokens.len()) {
                        Some(shape) => ParseState::AwaitingEvalOrClock { tokens, shape },
                        None => ParseState::Truncated(AnnotationTruncation {
                            ply: self.annotations.len() + 1,
                            token_count: tokens.len(),
                        }),
                    }
                }
                ParseState::AwaitingEvalOrClock { tokens, shape } => {
                    let (evaluation, clock) = shape.resolve(&tokens);
                    self.annotations.push(tokens[0], evaluation, clock);
                    ParseState::AwaitingMove
                }
                truncated @ ParseState::Truncated(_) => truncated,
            };

            if !matches!(self.state, ParseState::AwaitingEvalOrClock { .. }) {
                return;
            }
        }
    }

    fn finish(self) -> MoveAnnotations {
        let mut annotations = self.annotations;
        if let ParseState::Truncated(truncation) = self.state {
            annotations.mark_truncated(truncation);
        }
        annotations
    }
}

/// Strips a trailing `]` left over from splitting `[%clk 0:03:00]` on spaces.
fn strip_bracket(token: &str) -> &str {
    token.strip_suffix(']').unwrap_or(token)
}

/// `!` and `?` move assessments carry no information for the parser.
fn strip_assessments(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .filter(|c| !matches!(c, '!' | '?'))
        .collect()
}

/// Parses a move list into per-ply move, evaluation and clock values.
///
/// Text before the first move number is ignored. Parsing stops at the first
/// ply whose layout is not recognized; plies before it are kept and the
/// stopping point is recorded as the truncation.
pub fn parse_moves(body: &[u8]) -> MoveAnnotations {
    let text = strip_assessments(body);
    let mut parser = AnnotationParser::new();

    for group in text.split(MOVE_NUMBER_SEPARATOR).skip(1) {
        parser.feed(group);
        if parser.is_truncated() {
            break;
        }
    }

    parser.finish()
}
