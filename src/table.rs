use crate::model::{ChangeType, CommitRecord};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One (commit, file change) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTableRow {
    pub commit_hash: String,
    pub parent_hashes: Vec<String>,
    pub author_name: String,
    pub author_email: String,
    pub commit_date: DateTime<FixedOffset>,
    pub commit_timestamp: i64,
    pub commit_message: String,
    pub file_path: String,
    pub change_type: ChangeType,
    pub additions: u32,
    pub deletions: u32,
    pub old_file_path: Option<String>,
}

/// Flattened view of a commit sequence, one row per file change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTable {
    rows: Vec<CommitTableRow>,
}

impl CommitTable {
    /// Commits without file changes produce no rows at all.
    pub fn from_records(records: &[CommitRecord]) -> Self {
        let rows = records
            .iter()
            .flat_map(|record| {
                record.file_changes.iter().map(move |fc| CommitTableRow {
                    commit_hash: record.commit_id.clone(),
                    parent_hashes: record.parent_ids.clone(),
                    author_name: record.author_name.clone(),
                    author_email: record.author_email.clone(),
                    commit_date: record.committed_at,
                    commit_timestamp: record.timestamp(),
                    commit_message: record.message.clone(),
                    file_path: fc.path.clone(),
                    change_type: fc.change_type,
                    additions: fc.additions,
                    deletions: fc.deletions,
                    old_file_path: fc.old_path.clone(),
                })
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[CommitTableRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CommitTableRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommitTableRow> {
        self.rows.iter()
    }

    /// Number of distinct commits represented.
    pub fn commit_count(&self) -> usize {
        let mut hashes: Vec<&str> = self.rows.iter().map(|r| r.commit_hash.as_str()).collect();
        hashes.sort_unstable();
        hashes.dedup();
        hashes.len()
    }

    /// Rows in a backend-independent order: timestamp, parents, then path.
    pub fn canonical_rows(&self) -> Vec<CommitTableRow> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            a.commit_timestamp
                .cmp(&b.commit_timestamp)
                .then_with(|| a.parent_hashes.cmp(&b.parent_hashes))
                .then_with(|| a.commit_hash.cmp(&b.commit_hash))
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        rows
    }
}

impl<'a> IntoIterator for &'a CommitTable {
    type Item = &'a CommitTableRow;
    type IntoIter = std::slice::Iter<'a, CommitTableRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
