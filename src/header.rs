use crate::error::{HeaderParseError, HeaderParseReason};
use crate::types::{HeaderField, HeaderFields};
use regex::Regex;
use std::sync::LazyLock;

static TAG_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\[([^\s\[\]"]+) "(.*)"\]$"#).expect("valid tag line regex"));

/// Parses a tag block (`[Name "Value"]` per line) into the known header fields.
///
/// Unknown tags are ignored and a repeated tag keeps its last value. Any
/// malformed line rejects the whole block.
pub fn extract_headers(block: &[u8]) -> Result<HeaderFields, HeaderParseError> {
    let text = String::from_utf8_lossy(block);
    let mut headers = HeaderFields::default();

    for (idx, raw_line) in text.split('\n').enumerate() {
        let line = raw_line.trim_end_matches('\r').trim();
        if line.is_empty() {
            continue;
        }

        let (name, value) = parse_tag_line(line).map_err(|reason| HeaderParseError {
            line_number: idx + 1,
            line: line.to_string(),
            reason,
        })?;

        if let Some(field) = HeaderField::from_tag_name(name) {
            headers.set(field, value.to_string());
        }
    }

    Ok(headers)
}

fn parse_tag_line(line: &str) -> Result<(&str, &str), HeaderParseReason> {
    if let Some(caps) = TAG_LINE_RE.captures(line)
        && let (Some(name), Some(value)) = (caps.get(1), caps.get(2))
    {
        return Ok((name.as_str(), value.as_str()));
    }

    Err(classify_malformed(line))
}

fn classify_malformed(line: &str) -> HeaderParseReason {
    let Some(inner) = line
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        return HeaderParseReason::MissingBrackets;
    };

    match inner.split_once(' ') {
        None => HeaderParseReason::MissingSeparator,
        Some((name, _)) if name.is_empty() => HeaderParseReason::MissingSeparator,
        Some(_) => HeaderParseReason::UnbalancedQuotes,
    }
}
