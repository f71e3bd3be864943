pub mod classify;
pub mod parser;
pub mod remote;
pub mod repo;
pub mod subprocess;
pub mod wire;

pub use remote::RemoteSource;
pub use repo::LibrarySource;
pub use subprocess::GitCliSource;

use crate::error::Result;
use crate::model::CommitRecord;
use crate::query::CommitQuery;

/// Remote probed for the default branch when listing merged work.
pub const DEFAULT_REMOTE: &str = "origin";

/// Default branch references, probed in order.
pub const DEFAULT_BRANCH_CANDIDATES: &[&str] =
    &["refs/remotes/origin/main", "refs/remotes/origin/master"];

/// A strategy for extracting commit history.
///
/// Implementations return commits newest first, with the query's date,
/// author, subject and path filters already applied. Every implementation
/// must yield the same records for the same repository state.
pub trait CommitDataSource {
    /// Short identifier used in logs and report metadata.
    fn name(&self) -> &'static str;

    fn get_commits(&self, query: &CommitQuery) -> Result<Vec<CommitRecord>>;
}
