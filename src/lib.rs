//! Extract git history into per-file change records and rank authors by
//! their contribution.
//!
//! History comes from one of three interchangeable [`git::CommitDataSource`]
//! backends: the `git` executable ([`git::GitCliSource`]), an in-process
//! object walk ([`git::LibrarySource`]) or a bare fetch of a remote URL
//! ([`git::RemoteSource`]). Their output is flattened into a
//! [`table::CommitTable`] and summarized by [`stats::author_stats`].

pub mod cli;
pub mod error;
pub mod filter;
pub mod git;
pub mod model;
pub mod progress;
pub mod query;
pub mod report;
pub mod stats;
pub mod table;

pub use error::{GitrankError, Result};
pub use git::CommitDataSource;
pub use model::{ChangeType, CommitRecord, FileChange};
pub use query::{CommitQuery, QueryArgs};
