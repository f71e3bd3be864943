use thiserror::Error;

pub type Result<T> = std::result::Result<T, GitrankError>;

#[derive(Error, Debug)]
pub enum GitrankError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("git command `{command}` failed: {message}")]
    GitCommand { command: String, message: String },
    #[error("Missing branch reference: {0}")]
    MissingBranch(String),
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("Git repository error: {0}")]
    GitRepo(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Git error: {0}")]
    Git(#[from] Box<gix::open::Error>),
    #[error("Git discover error: {0}")]
    GitDiscover(#[from] Box<gix::discover::Error>),
    #[error("Object find error: {0}")]
    ObjectFind(#[from] Box<gix::object::find::existing::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
    #[error("Revision walk error: {0}")]
    RevWalk(#[from] Box<gix::revision::walk::Error>),
}

/// Coarse classification of an error for callers choosing how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Extraction,
    Io,
}

impl GitrankError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GitrankError::Config(_) | GitrankError::InvalidDate(_) => ErrorCategory::Config,
            GitrankError::Io(_) | GitrankError::Serde(_) => ErrorCategory::Io,
            _ => ErrorCategory::Extraction,
        }
    }

    pub fn git_repo(message: impl Into<String>) -> Self {
        GitrankError::GitRepo(message.into())
    }
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::open::Error> for GitrankError {
    fn from(err: gix::open::Error) -> Self {
        GitrankError::Git(Box::new(err))
    }
}

impl From<gix::discover::Error> for GitrankError {
    fn from(err: gix::discover::Error) -> Self {
        GitrankError::GitDiscover(Box::new(err))
    }
}

impl From<gix::object::find::existing::Error> for GitrankError {
    fn from(err: gix::object::find::existing::Error) -> Self {
        GitrankError::ObjectFind(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for GitrankError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        GitrankError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for GitrankError {
    fn from(err: gix::object::commit::Error) -> Self {
        GitrankError::Commit(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for GitrankError {
    fn from(err: gix::objs::decode::Error) -> Self {
        GitrankError::ObjectDecode(Box::new(err))
    }
}

impl From<gix::repository::diff_tree_to_tree::Error> for GitrankError {
    fn from(err: gix::repository::diff_tree_to_tree::Error) -> Self {
        GitrankError::DiffTreeToTree(Box::new(err))
    }
}

impl From<gix::revision::walk::Error> for GitrankError {
    fn from(err: gix::revision::walk::Error) -> Self {
        GitrankError::RevWalk(Box::new(err))
    }
}
