use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeType {
    Add,
    Modify,
    Delete,
    Rename,
    Copy,
    Unknown,
}

impl ChangeType {
    /// Map a git name-status code (`A`, `M`, `R087`, ...) to a change type.
    pub fn from_status_code(code: &str) -> Self {
        match code.chars().next() {
            Some('A') => ChangeType::Add,
            Some('M') | Some('T') => ChangeType::Modify,
            Some('D') => ChangeType::Delete,
            Some('R') => ChangeType::Rename,
            Some('C') => ChangeType::Copy,
            _ => ChangeType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Add => "Add",
            ChangeType::Modify => "Modify",
            ChangeType::Delete => "Delete",
            ChangeType::Rename => "Rename",
            ChangeType::Copy => "Copy",
            ChangeType::Unknown => "Unknown",
        }
    }

    pub fn carries_old_path(&self) -> bool {
        matches!(self, ChangeType::Rename | ChangeType::Copy)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub old_path: Option<String>,
    pub additions: u32,
    pub deletions: u32,
    pub change_type: ChangeType,
    pub is_binary: bool,
}

impl FileChange {
    /// Build a change, normalizing the fields the change type constrains.
    /// Only renames and copies keep an old path, a deletion never adds
    /// lines, and binary files carry no line counts.
    pub fn new(
        path: String,
        old_path: Option<String>,
        additions: u32,
        deletions: u32,
        change_type: ChangeType,
        is_binary: bool,
    ) -> Self {
        let old_path = if change_type.carries_old_path() { old_path } else { None };
        let (additions, deletions) = if is_binary {
            (0, 0)
        } else if change_type == ChangeType::Delete {
            (0, deletions)
        } else {
            (additions, deletions)
        };

        Self {
            path,
            old_path,
            additions,
            deletions,
            change_type,
            is_binary,
        }
    }

    pub fn total(&self) -> u64 {
        self.additions as u64 + self.deletions as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_id: String,
    pub parent_ids: Vec<String>,
    pub author_name: String,
    pub author_email: String,
    pub committed_at: DateTime<FixedOffset>,
    pub message: String,
    pub file_changes: Vec<FileChange>,
}

impl CommitRecord {
    /// Assemble a record. File changes are sorted by path and deduplicated
    /// on it (the last change for a path wins). The message is stored with
    /// `\n` line endings and no trailing whitespace.
    pub fn new(
        commit_id: String,
        parent_ids: Vec<String>,
        author_name: String,
        author_email: String,
        committed_at: DateTime<FixedOffset>,
        message: &str,
        mut file_changes: Vec<FileChange>,
    ) -> Self {
        file_changes.reverse();
        file_changes.sort_by(|a, b| a.path.cmp(&b.path));
        file_changes.dedup_by(|a, b| a.path == b.path);

        Self {
            commit_id,
            parent_ids,
            author_name,
            author_email,
            committed_at,
            message: normalize_message(message),
            file_changes,
        }
    }

    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    pub fn timestamp(&self) -> i64 {
        self.committed_at.timestamp()
    }

    pub fn with_file_changes(mut self, file_changes: Vec<FileChange>) -> Self {
        self.file_changes = file_changes;
        self
    }
}

fn normalize_message(message: &str) -> String {
    message.replace("\r\n", "\n").trim_end().to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new() -> Self {
        Self { since: None, until: None }
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn contains<Tz: chrono::TimeZone>(&self, timestamp: &DateTime<Tz>) -> bool {
        let timestamp = timestamp.with_timezone(&Utc);
        if let Some(since) = self.since {
            if timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if timestamp > until {
                return false;
            }
        }
        true
    }
}
