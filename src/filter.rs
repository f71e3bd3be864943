use crate::model::{CommitRecord, FileChange};

/// Include/exclude path-prefix filter applied to the file changes of a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PathFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// True when at least one prefix list is non-empty.
    pub fn is_active(&self) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }

    pub fn keeps(&self, path: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|p| path.starts_with(p.as_str()));
        let excluded = self.exclude.iter().any(|p| path.starts_with(p.as_str()));
        included && !excluded
    }

    pub fn apply(&self, changes: Vec<FileChange>) -> Vec<FileChange> {
        if !self.is_active() {
            return changes;
        }
        changes.into_iter().filter(|fc| self.keeps(&fc.path)).collect()
    }

    /// Filter a record's changes. Returns `None` when an active filter
    /// removed every change, in which case the commit must not be emitted.
    pub fn filter_record(&self, mut record: CommitRecord) -> Option<CommitRecord> {
        if !self.is_active() {
            return Some(record);
        }
        let kept = self.apply(std::mem::take(&mut record.file_changes));
        if kept.is_empty() {
            None
        } else {
            Some(record.with_file_changes(kept))
        }
    }
}
