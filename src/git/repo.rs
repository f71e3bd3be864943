use super::classify::{classify_change, TreeChange};
use super::{CommitDataSource, DEFAULT_BRANCH_CANDIDATES, DEFAULT_REMOTE};
use crate::error::{GitrankError, Result};
use crate::model::{CommitRecord, FileChange};
use crate::progress::{no_progress, ProgressSink};
use crate::query::CommitQuery;
use chrono::{DateTime, FixedOffset, TimeZone};
use gix::object::tree::diff::ChangeDetached;
use gix::revision::walk::Sorting;
use gix::traverse::commit::simple::CommitTimeOrder;
use gix::{discover, ObjectId, Repository};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Extracts history in-process by walking repository objects with gix.
pub struct LibrarySource {
    path: PathBuf,
    progress: Arc<dyn ProgressSink>,
}

impl LibrarySource {
    /// Use the repository containing `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            progress: no_progress(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    fn open(&self) -> Result<Repository> {
        Ok(discover(&self.path)?)
    }
}

impl CommitDataSource for LibrarySource {
    fn name(&self) -> &'static str {
        "library"
    }

    fn get_commits(&self, query: &CommitQuery) -> Result<Vec<CommitRecord>> {
        let repo = self.open()?;
        RepoWalker::new(&repo, DEFAULT_BRANCH_CANDIDATES, self.progress.as_ref()).collect(query)
    }
}

/// Where a walk starts and whether it follows first parents only.
#[derive(Debug, Clone, Copy)]
struct WalkStart {
    tip: ObjectId,
    first_parent: bool,
}

/// Commit walk shared by the library and remote backends.
pub(crate) struct RepoWalker<'a> {
    repo: &'a Repository,
    branch_candidates: &'a [&'a str],
    progress: &'a dyn ProgressSink,
}

impl<'a> RepoWalker<'a> {
    pub(crate) fn new(
        repo: &'a Repository,
        branch_candidates: &'a [&'a str],
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            repo,
            branch_candidates,
            progress,
        }
    }

    pub(crate) fn collect(&self, query: &CommitQuery) -> Result<Vec<CommitRecord>> {
        let start = self.resolve_start(query)?;

        let mut platform = self
            .repo
            .rev_walk([start.tip])
            .sorting(Sorting::ByCommitTime(CommitTimeOrder::NewestFirst));
        if start.first_parent {
            platform = platform.first_parent_only();
        }
        let walk = platform.all()?;

        self.progress.start("Walking commits");
        let mut commits = Vec::new();
        let mut visited = 0usize;

        for info in walk {
            let info = info
                .map_err(|e| GitrankError::git_repo(format!("revision walk entry failed: {e}")))?;
            visited += 1;

            let commit = self.repo.find_commit(info.id)?;
            let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.detach()).collect();
            if query.merged_only && parents.len() < 2 {
                continue;
            }

            let committed_at = commit_time(&commit)?;
            if !query.range.contains(&committed_at) {
                continue;
            }

            let author = commit.author()?;
            let author_name = author.name.to_string();
            let author_email = author.email.to_string();
            if !query.matches_author(&author_name, &author_email) {
                continue;
            }

            let message = commit.message_raw()?.to_string();
            if !query.matches_subject(&message) {
                continue;
            }

            let files = self.diff_against_parent(&commit, parents.first().copied())?;
            let record = CommitRecord::new(
                info.id.to_string(),
                parents.iter().map(|id| id.to_string()).collect(),
                author_name,
                author_email,
                committed_at,
                &message,
                files,
            );

            if let Some(record) = query.paths.filter_record(record) {
                commits.push(record);
                self.progress.advance(1);
            }
        }

        self.progress.finish("Commits collected");
        debug!(visited, emitted = commits.len(), "commit walk complete");
        Ok(commits)
    }

    fn resolve_start(&self, query: &CommitQuery) -> Result<WalkStart> {
        if query.merged_only {
            for name in self.branch_candidates {
                if let Ok(id) = self.repo.rev_parse_single(*name) {
                    debug!(branch = *name, "listing merges on default branch");
                    return Ok(WalkStart {
                        tip: id.detach(),
                        first_parent: true,
                    });
                }
            }
            if self.repo.find_remote(DEFAULT_REMOTE).is_ok() {
                return Err(GitrankError::MissingBranch(format!(
                    "remote '{DEFAULT_REMOTE}' has none of {}",
                    self.branch_candidates.join(", ")
                )));
            }
            debug!("no '{DEFAULT_REMOTE}' remote, listing all merges reachable from HEAD");
        }

        let head = self
            .repo
            .head_id()
            .map_err(|e| GitrankError::git_repo(format!("failed to resolve HEAD: {e}")))?;
        Ok(WalkStart {
            tip: head.detach(),
            first_parent: false,
        })
    }

    /// Diff a commit against its first parent, or against the empty tree for
    /// a root commit.
    fn diff_against_parent(
        &self,
        commit: &gix::Commit<'_>,
        parent: Option<ObjectId>,
    ) -> Result<Vec<FileChange>> {
        let commit_tree = commit.tree()?;
        let parent_tree = match parent {
            Some(id) => Some(self.repo.find_commit(id)?.tree()?),
            None => None,
        };

        let changes: Vec<ChangeDetached> =
            self.repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)?;

        let mut files = Vec::with_capacity(changes.len());
        for change in changes {
            if let Some(file) = self.handle_change(change)? {
                files.push(file);
            }
        }
        Ok(files)
    }

    fn handle_change(&self, change: ChangeDetached) -> Result<Option<FileChange>> {
        let file = match change {
            ChangeDetached::Addition {
                id,
                location,
                entry_mode,
                ..
            } => {
                if !is_file(entry_mode) {
                    return Ok(None);
                }
                let blob = self.repo.find_object(id)?;
                classify_change(TreeChange::Added {
                    path: &location.to_string(),
                    data: &blob.data,
                })
            }
            ChangeDetached::Deletion {
                id,
                location,
                entry_mode,
                ..
            } => {
                if !is_file(entry_mode) {
                    return Ok(None);
                }
                let blob = self.repo.find_object(id)?;
                classify_change(TreeChange::Deleted {
                    path: &location.to_string(),
                    data: &blob.data,
                })
            }
            ChangeDetached::Modification {
                previous_id,
                previous_entry_mode,
                id,
                entry_mode,
                location,
                ..
            } => {
                if !is_file(entry_mode) || !is_file(previous_entry_mode) {
                    return Ok(None);
                }
                let old = self.repo.find_object(previous_id)?;
                let new = self.repo.find_object(id)?;
                classify_change(TreeChange::Modified {
                    path: &location.to_string(),
                    old: &old.data,
                    new: &new.data,
                })
            }
            ChangeDetached::Rewrite {
                source_id,
                source_entry_mode,
                source_location,
                id,
                entry_mode,
                location,
                copy,
                ..
            } => {
                if !is_file(entry_mode) || !is_file(source_entry_mode) {
                    return Ok(None);
                }
                let old = self.repo.find_object(source_id)?;
                let new = self.repo.find_object(id)?;
                classify_change(TreeChange::Rewritten {
                    source_path: &source_location.to_string(),
                    path: &location.to_string(),
                    old: &old.data,
                    new: &new.data,
                    copy,
                })
            }
        };
        Ok(Some(file))
    }
}

// Directories and submodules carry no lines of their own.
fn is_file(mode: gix::objs::tree::EntryMode) -> bool {
    !mode.is_tree() && !mode.is_commit()
}

fn commit_time(commit: &gix::Commit<'_>) -> Result<DateTime<FixedOffset>> {
    let time = commit.time()?;
    FixedOffset::east_opt(time.offset)
        .and_then(|offset| offset.timestamp_opt(time.seconds, 0).single())
        .ok_or_else(|| GitrankError::InvalidDate(format!("Invalid timestamp: {}", time.seconds)))
}
