use crate::error::{GitrankError, Result};
use crate::filter::PathFilter;
use crate::model::{CommitRecord, DateRange};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use std::time::Duration;

/// Separator between author alternatives, e.g. `alice|bob@corp`.
pub const AUTHOR_SEPARATOR: char = '|';

/// Unvalidated query parameters as they arrive from the command line.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub since: Option<String>,
    pub until: Option<String>,
    pub author: Option<String>,
    pub grep: Option<String>,
    pub merged_only: bool,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
}

/// Validated filter criteria shared by every commit data source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitQuery {
    pub range: DateRange,
    pub authors: Vec<String>,
    pub grep: Option<String>,
    pub merged_only: bool,
    pub paths: PathFilter,
}

impl CommitQuery {
    /// A query with no filters at all.
    pub fn all() -> Self {
        Self::default()
    }

    /// Validate raw arguments. Every configuration problem surfaces here,
    /// before any repository is touched.
    pub fn resolve(args: &QueryArgs) -> Result<Self> {
        Self::resolve_at(args, Utc::now())
    }

    pub fn resolve_at(args: &QueryArgs, now: DateTime<Utc>) -> Result<Self> {
        let since = args
            .since
            .as_deref()
            .map(|s| parse_date(s, DateBound::Start, now))
            .transpose()?;
        let until = args
            .until
            .as_deref()
            .map(|u| parse_date(u, DateBound::End, now))
            .transpose()?;

        if let (Some(s), Some(u)) = (since, until) {
            if s > u {
                return Err(GitrankError::InvalidDate(format!(
                    "Invalid range: since ({s}) is after until ({u})"
                )));
            }
        }

        let mut range = DateRange::new();
        if let Some(s) = since {
            range = range.with_since(s);
        }
        if let Some(u) = until {
            range = range.with_until(u);
        }

        let authors = match args.author.as_deref() {
            Some(raw) => {
                let alternatives: Vec<String> = raw
                    .split(AUTHOR_SEPARATOR)
                    .map(|a| a.trim().to_lowercase())
                    .filter(|a| !a.is_empty())
                    .collect();
                if alternatives.is_empty() {
                    return Err(GitrankError::Config(format!(
                        "author filter '{raw}' has no non-empty alternatives"
                    )));
                }
                alternatives
            }
            None => Vec::new(),
        };

        let grep = args
            .grep
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_lowercase);

        let include = clean_prefixes(&args.include_paths);
        let exclude = clean_prefixes(&args.exclude_paths);
        if let Some(both) = include.iter().find(|p| exclude.contains(p)) {
            return Err(GitrankError::Config(format!(
                "path prefix '{both}' is both included and excluded"
            )));
        }

        Ok(Self {
            range,
            authors,
            grep,
            merged_only: args.merged_only,
            paths: PathFilter::new(include, exclude),
        })
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn matches_author(&self, name: &str, email: &str) -> bool {
        if self.authors.is_empty() {
            return true;
        }
        let name = name.to_lowercase();
        let email = email.to_lowercase();
        self.authors
            .iter()
            .any(|alt| name.contains(alt.as_str()) || email.contains(alt.as_str()))
    }

    pub fn matches_subject(&self, message: &str) -> bool {
        match &self.grep {
            Some(needle) => message
                .lines()
                .next()
                .unwrap_or("")
                .to_lowercase()
                .contains(needle.as_str()),
            None => true,
        }
    }

    /// Commit-level predicate (dates, author, subject). Path filtering is
    /// applied separately by [`CommitQuery::finish`].
    pub fn matches(&self, record: &CommitRecord) -> bool {
        self.range.contains(&record.committed_at)
            && self.matches_author(&record.author_name, &record.author_email)
            && self.matches_subject(&record.message)
    }

    /// Apply the full query to an extracted record, returning the record to
    /// emit, if any.
    pub fn finish(&self, record: CommitRecord) -> Option<CommitRecord> {
        if !self.matches(&record) {
            return None;
        }
        self.paths.filter_record(record)
    }
}

fn clean_prefixes(prefixes: &[String]) -> Vec<String> {
    prefixes
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateBound {
    Start,
    End,
}

fn parse_date(input: &str, bound: DateBound, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();

    // RFC3339
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    // YYYY-MM-DD, inclusive of the whole day when used as an upper bound
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let time = match bound {
            DateBound::Start => date.and_hms_opt(0, 0, 0),
            DateBound::End => date.and_hms_opt(23, 59, 59),
        };
        if let Some(datetime) = time {
            return Ok(Utc.from_utc_datetime(&datetime));
        }
    }

    if let Some(duration) = parse_natural_duration(trimmed) {
        let delta = ChronoDuration::from_std(duration)
            .map_err(|_| GitrankError::InvalidDate(format!("Duration overflow for '{input}'")))?;
        return now
            .checked_sub_signed(delta)
            .ok_or_else(|| GitrankError::InvalidDate(format!("Duration overflow for '{input}'")));
    }

    Err(GitrankError::InvalidDate(format!(
        "'{input}' is not an RFC3339 timestamp, a YYYY-MM-DD date, or a relative age"
    )))
}

fn parse_natural_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();

    for (suffix, unit) in [
        ("days ago", 86400),
        ("day ago", 86400),
        ("weeks ago", 7 * 86400),
        ("week ago", 7 * 86400),
        ("months ago", 30 * 86400),
        ("month ago", 30 * 86400),
        ("years ago", 365 * 86400),
        ("year ago", 365 * 86400),
    ] {
        if let Some(count) = input.strip_suffix(suffix) {
            if let Ok(n) = count.trim().parse::<u64>() {
                return Some(Duration::from_secs(n * unit));
            }
        }
    }

    // "90d", "2weeks", "1y 6months"
    humantime::parse_duration(input.trim_start_matches('-')).ok()
}
