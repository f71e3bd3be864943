//! Decoder for the `git log` text protocol described in [`super::wire`].

use super::classify::DiffSignals;
use super::wire::{CHUNK_SEPARATOR, FIELD_SEPARATOR, HEADER_FIELDS, MESSAGE_END, MESSAGE_START};
use crate::model::CommitRecord;
use chrono::{DateTime, FixedOffset, TimeZone};
use thiserror::Error;
use tracing::{debug, warn};

/// Recoverable problems with a single chunk or line. A chunk carrying one of
/// these (other than [`ParseError::UnrecognizedLine`]) is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("header has {found} fields, expected {HEADER_FIELDS}")]
    MissingFields { found: usize },
    #[error("message start sentinel missing")]
    MissingMessageStart,
    #[error("message end sentinel missing")]
    MissingMessageEnd,
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("unrecognized diff line '{0}'")]
    UnrecognizedLine(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// Zero-based chunk position in the input.
    pub chunk: usize,
    pub commit_id: Option<String>,
    pub error: ParseError,
}

#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub commits: Vec<CommitRecord>,
    pub warnings: Vec<ParseWarning>,
}

/// Parse a complete protocol blob.
pub fn parse(blob: &str) -> ParseOutcome {
    let mut parser = StreamParser::new();
    let mut commits = Vec::new();
    for line in blob.lines() {
        if let Some(record) = parser.push_line(line) {
            commits.push(record);
        }
    }
    if let Some(record) = parser.finish() {
        commits.push(record);
    }
    ParseOutcome {
        commits,
        warnings: parser.into_warnings(),
    }
}

#[derive(Debug, Clone)]
struct Header {
    commit_id: String,
    parent_ids: Vec<String>,
    author_name: String,
    author_email: String,
    committed_at: DateTime<FixedOffset>,
}

#[derive(Debug)]
struct PendingChunk {
    index: usize,
    commit_id: Option<String>,
    header: Result<Header, ParseError>,
    message: String,
    message_closed: bool,
    signals: DiffSignals,
}

impl PendingChunk {
    // The end sentinel only counts at the end of a line, so message text
    // may quote it.
    fn push_message_line(&mut self, line: &str) {
        match line.strip_suffix(MESSAGE_END) {
            Some(text) => {
                self.message.push_str(text);
                self.message_closed = true;
            }
            None => {
                self.message.push_str(line);
                self.message.push('\n');
            }
        }
    }
}

/// Incremental parser fed one line at a time.
#[derive(Debug, Default)]
pub struct StreamParser {
    current: Option<PendingChunk>,
    chunks_seen: usize,
    warnings: Vec<ParseWarning>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator). Returns the previous commit
    /// once a new chunk header closes it.
    pub fn push_line(&mut self, line: &str) -> Option<CommitRecord> {
        let in_message = self
            .current
            .as_ref()
            .is_some_and(|c| !c.message_closed && c.header.is_ok());

        if line.starts_with(CHUNK_SEPARATOR) && (!in_message || is_complete_header(line)) {
            let finished = self.current.take().and_then(|chunk| self.finalize(chunk));
            self.begin_chunk(line);
            return finished;
        }

        let Some(chunk) = self.current.as_mut() else {
            if !line.trim().is_empty() {
                debug!("ignoring text before first commit chunk");
            }
            return None;
        };

        if chunk.header.is_err() {
            return None;
        }

        if !chunk.message_closed {
            chunk.push_message_line(line);
            return None;
        }

        Self::push_signal(chunk, line, &mut self.warnings);
        None
    }

    /// Flush the last open chunk.
    pub fn finish(&mut self) -> Option<CommitRecord> {
        self.current.take().and_then(|chunk| self.finalize(chunk))
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ParseWarning> {
        self.warnings
    }

    fn push_signal(chunk: &mut PendingChunk, line: &str, warnings: &mut Vec<ParseWarning>) {
        if !chunk.signals.push_line(line) {
            let warning = ParseWarning {
                chunk: chunk.index,
                commit_id: chunk.commit_id.clone(),
                error: ParseError::UnrecognizedLine(line.to_string()),
            };
            warn!(chunk = chunk.index, "skipping line: {}", warning.error);
            warnings.push(warning);
        }
    }

    fn begin_chunk(&mut self, line: &str) {
        let index = self.chunks_seen;
        self.chunks_seen += 1;

        let body = &line[CHUNK_SEPARATOR.len()..];
        let (header_part, message_part) = match body.find(MESSAGE_START) {
            Some(pos) => (&body[..pos], Some(&body[pos + MESSAGE_START.len()..])),
            None => (body, None),
        };

        let fields: Vec<&str> = header_part.split(FIELD_SEPARATOR).collect();
        let commit_id = fields
            .first()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let header = match message_part {
            None => Err(ParseError::MissingMessageStart),
            Some(_) => parse_header(&fields),
        };

        let mut chunk = PendingChunk {
            index,
            commit_id,
            header,
            message: String::new(),
            message_closed: false,
            signals: DiffSignals::new(),
        };

        if let (Some(message), true) = (message_part, chunk.header.is_ok()) {
            chunk.push_message_line(message);
        }

        self.current = Some(chunk);
    }

    fn finalize(&mut self, chunk: PendingChunk) -> Option<CommitRecord> {
        let outcome = chunk.header.and_then(|header| {
            if chunk.message_closed {
                Ok(header)
            } else {
                Err(ParseError::MissingMessageEnd)
            }
        });

        match outcome {
            Ok(header) => Some(CommitRecord::new(
                header.commit_id,
                header.parent_ids,
                header.author_name,
                header.author_email,
                header.committed_at,
                &chunk.message,
                chunk.signals.into_file_changes(),
            )),
            Err(error) => {
                warn!(
                    chunk = chunk.index,
                    commit = chunk.commit_id.as_deref().unwrap_or("<unknown>"),
                    "dropping malformed commit chunk: {error}"
                );
                self.warnings.push(ParseWarning {
                    chunk: chunk.index,
                    commit_id: chunk.commit_id,
                    error,
                });
                None
            }
        }
    }
}

/// A separator line inside a message only starts a new chunk when it is a
/// full header: every field separator plus the message start sentinel.
fn is_complete_header(line: &str) -> bool {
    let body = &line[CHUNK_SEPARATOR.len()..];
    match body.find(MESSAGE_START) {
        Some(pos) => body[..pos].matches(FIELD_SEPARATOR).count() >= HEADER_FIELDS,
        None => false,
    }
}

fn parse_header(fields: &[&str]) -> Result<Header, ParseError> {
    let trailing_empty = fields.len() > HEADER_FIELDS && fields.last() == Some(&"");
    let non_trailing = fields.len() - usize::from(trailing_empty);
    if non_trailing < HEADER_FIELDS {
        return Err(ParseError::MissingFields { found: non_trailing });
    }

    let commit_id = fields[0].trim();
    if commit_id.is_empty() {
        return Err(ParseError::MissingFields { found: 0 });
    }

    Ok(Header {
        commit_id: commit_id.to_string(),
        parent_ids: fields[1].split_whitespace().map(str::to_string).collect(),
        author_name: fields[2].to_string(),
        author_email: fields[3].to_string(),
        committed_at: parse_timestamp(fields[4])?,
    })
}

/// `<ISO-8601>\t<epoch>`: the epoch fixes the instant, the ISO form the
/// original UTC offset.
fn parse_timestamp(field: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let invalid = || ParseError::InvalidTimestamp(field.to_string());
    let (iso, epoch) = field.split_once('\t').ok_or_else(invalid)?;
    let iso = DateTime::parse_from_rfc3339(iso.trim()).map_err(|_| invalid())?;
    let epoch: i64 = epoch.trim().parse().map_err(|_| invalid())?;
    iso.offset().timestamp_opt(epoch, 0).single().ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeType;
    use pretty_assertions::assert_eq;

    fn header(id: &str, parents: &str, ts: &str) -> String {
        format!(
            "{CHUNK_SEPARATOR}{id}{FIELD_SEPARATOR}{parents}{FIELD_SEPARATOR}Ada{FIELD_SEPARATOR}ada@example.com{FIELD_SEPARATOR}{ts}{FIELD_SEPARATOR}{MESSAGE_START}"
        )
    }

    const TS: &str = "2024-03-01T10:00:00+02:00\t1709280000";

    fn chunk(id: &str, parents: &str, message: &str, diff: &[&str]) -> String {
        let mut out = format!("{}{message}{MESSAGE_END}\n\n", header(id, parents, TS));
        for line in diff {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    #[test]
    fn parses_well_formed_chunks_in_order() {
        let blob = [
            chunk("bbb", "aaa", "second\n\nbody text\n", &["M\tf.txt", "1\t0\tf.txt"]),
            chunk("aaa", "", "first\n", &["A\tf.txt", "2\t0\tf.txt"]),
        ]
        .concat();

        let outcome = parse(&blob);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.commits.len(), 2);

        let second = &outcome.commits[0];
        assert_eq!(second.commit_id, "bbb");
        assert_eq!(second.parent_ids, vec!["aaa".to_string()]);
        assert_eq!(second.author_name, "Ada");
        assert_eq!(second.message, "second\n\nbody text");
        assert_eq!(second.committed_at.timestamp(), 1_709_280_000);
        assert_eq!(second.committed_at.offset().local_minus_utc(), 7200);
        assert_eq!(second.file_changes[0].change_type, ChangeType::Modify);

        let first = &outcome.commits[1];
        assert!(first.is_root());
        assert_eq!(first.file_changes[0].additions, 2);
    }

    #[test]
    fn separator_inside_message_is_text() {
        let message = format!("subject\n{CHUNK_SEPARATOR} not a header\nmore");
        let blob = [
            chunk("ccc", "bbb", &message, &["M\tx", "1\t1\tx"]),
            chunk("bbb", "", "root", &["A\tx", "1\t0\tx"]),
        ]
        .concat();

        let outcome = parse(&blob);
        assert_eq!(outcome.commits.len(), 2);
        assert!(outcome.commits[0].message.contains("not a header"));
    }

    #[test]
    fn drops_chunk_without_message_end() {
        let broken = format!("{}unterminated message\n", header("bad", "", TS));
        let blob = [
            chunk("one", "two", "ok", &[]),
            broken,
            chunk("two", "", "also ok", &["A\tf", "1\t0\tf"]),
        ]
        .concat();

        let outcome = parse(&blob);
        let ids: Vec<_> = outcome.commits.iter().map(|c| c.commit_id.as_str()).collect();
        assert_eq!(ids, ["one", "two"]);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].error, ParseError::MissingMessageEnd);
        assert_eq!(outcome.warnings[0].commit_id.as_deref(), Some("bad"));
    }

    #[test]
    fn drops_chunk_with_missing_fields() {
        let short =
            format!("{CHUNK_SEPARATOR}abc{FIELD_SEPARATOR}{MESSAGE_START}msg{MESSAGE_END}\n");
        let blob = [short, chunk("good", "", "fine", &[])].concat();

        let outcome = parse(&blob);
        assert_eq!(outcome.commits.len(), 1);
        assert_eq!(outcome.commits[0].commit_id, "good");
        assert!(matches!(outcome.warnings[0].error, ParseError::MissingFields { .. }));
    }

    #[test]
    fn drops_chunk_with_bad_timestamp() {
        let bad = format!("{}msg{MESSAGE_END}\n", header("late", "", "yesterday\tnope"));
        let outcome = parse(&[bad, chunk("good", "", "fine", &[])].concat());
        assert_eq!(outcome.commits.len(), 1);
        assert!(matches!(outcome.warnings[0].error, ParseError::InvalidTimestamp(_)));
    }

    #[test]
    fn drops_chunk_without_message_start() {
        let bad = format!(
            "{CHUNK_SEPARATOR}a{FIELD_SEPARATOR}{FIELD_SEPARATOR}n{FIELD_SEPARATOR}e{FIELD_SEPARATOR}{TS}\nA\tf\n"
        );
        let outcome = parse(&[bad, chunk("good", "", "fine", &[])].concat());
        assert_eq!(outcome.commits.len(), 1);
        assert_eq!(outcome.warnings[0].error, ParseError::MissingMessageStart);
    }

    #[test]
    fn unrecognized_lines_are_reported_but_keep_the_commit() {
        let blob = chunk("abc", "", "msg", &["A\tf", "garbage", "1\t0\tf"]);
        let outcome = parse(&blob);
        assert_eq!(outcome.commits.len(), 1);
        assert_eq!(outcome.commits[0].file_changes.len(), 1);
        assert!(matches!(outcome.warnings[0].error, ParseError::UnrecognizedLine(_)));
    }

    #[test]
    fn end_sentinel_inside_message_text_is_kept() {
        let message = format!("quote {MESSAGE_END} here\nsecond line");
        let outcome = parse(&chunk("q", "", &message, &["A\tf", "1\t0\tf"]));
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.commits[0].message, message);
        assert_eq!(outcome.commits[0].file_changes.len(), 1);
    }

    #[test]
    fn empty_commit_has_no_file_changes() {
        let outcome = parse(&chunk("e", "d", "empty", &[]));
        assert_eq!(outcome.commits.len(), 1);
        assert!(outcome.commits[0].file_changes.is_empty());
    }

    #[test]
    fn one_record_per_well_formed_chunk() {
        let blob: String = (0..25)
            .map(|i| chunk(&format!("c{i:02}"), "", &format!("commit {i}"), &["A\tf", "1\t0\tf"]))
            .collect();
        let outcome = parse(&blob);
        assert_eq!(outcome.commits.len(), blob.matches(CHUNK_SEPARATOR).count());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn stream_parser_emits_when_next_chunk_starts() {
        let blob = [chunk("b", "a", "two", &[]), chunk("a", "", "one", &[])].concat();
        let mut parser = StreamParser::new();
        let mut emitted = Vec::new();
        for line in blob.lines() {
            if let Some(record) = parser.push_line(line) {
                emitted.push(record.commit_id);
            }
        }
        assert_eq!(emitted, ["b"]);
        assert_eq!(parser.finish().map(|r| r.commit_id).as_deref(), Some("a"));
        assert!(parser.warnings().is_empty());
    }
}
