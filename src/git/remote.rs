use super::repo::RepoWalker;
use super::CommitDataSource;
use crate::error::{GitrankError, Result};
use crate::model::{CommitRecord, DateRange};
use crate::progress::{no_progress, FetchProgress, ProgressSink};
use crate::query::CommitQuery;
use chrono::{DateTime, Duration, Utc};
use gix::Repository;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

/// Look-back window applied when a query has no lower date bound.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// A bare fetch has no remote-tracking namespace of its own, so its local
/// heads are probed after the usual remote-tracking names.
const REMOTE_BRANCH_CANDIDATES: &[&str] = &[
    "refs/remotes/origin/main",
    "refs/remotes/origin/master",
    "refs/heads/main",
    "refs/heads/master",
];

/// Fetches a repository by URL into a call-scoped temporary directory and
/// walks it in-process. Nothing outlives the call.
pub struct RemoteSource {
    url: String,
    lookback: Duration,
    progress: Arc<dyn ProgressSink>,
}

impl RemoteSource {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            lookback: Duration::days(DEFAULT_LOOKBACK_DAYS),
            progress: no_progress(),
        }
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// The date range actually queried: an explicit `since` is kept as is,
    /// a missing one becomes `now - lookback`.
    pub fn effective_range(&self, range: &DateRange, now: DateTime<Utc>) -> DateRange {
        match range.since {
            Some(_) => range.clone(),
            None => range.clone().with_since(now - self.lookback),
        }
    }

    fn fetch(&self, into: &Path) -> Result<Repository> {
        info!(url = %self.url, "fetching remote history");
        self.progress.message(&format!("Fetching {}", self.url));

        let should_interrupt = AtomicBool::new(false);
        let mut prepare = gix::prepare_clone_bare(self.url.as_str(), into)
            .map_err(|e| GitrankError::Fetch(format!("{}: {e}", self.url)))?;
        let (repo, outcome) = prepare
            .fetch_only(FetchProgress::new(Arc::clone(&self.progress)), &should_interrupt)
            .map_err(|e| GitrankError::Fetch(format!("{}: {e}", self.url)))?;

        let refs = outcome.ref_map.mappings.len();
        info!(refs, "fetch complete");
        self.progress.message(&format!("Fetched {refs} refs from {}", self.url));
        Ok(repo)
    }
}

impl CommitDataSource for RemoteSource {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn get_commits(&self, query: &CommitQuery) -> Result<Vec<CommitRecord>> {
        let query = query
            .clone()
            .with_range(self.effective_range(&query.range, Utc::now()));

        // Removed on drop, so every early return below cleans up too.
        let scratch = tempfile::Builder::new().prefix("gitrank-fetch-").tempdir()?;
        let repo = self.fetch(scratch.path())?;
        let records = RepoWalker::new(&repo, REMOTE_BRANCH_CANDIDATES, self.progress.as_ref())
            .collect(&query);

        drop(repo);
        scratch.close()?;
        records
    }
}
