use crate::git::{CommitDataSource, GitCliSource, LibrarySource, RemoteSource};
use crate::progress::{no_progress, ProgressSink, SpinnerProgress};
use crate::query::QueryArgs;
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gitrank")]
#[command(about = "Git history extraction and author contribution ranking")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Run the git executable and parse its output
    Git,
    /// Walk repository objects in-process
    Library,
    /// Fetch a remote URL into a temporary store, then walk it
    Remote,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Git => "git",
            Backend::Library => "library",
            Backend::Remote => "remote",
        };
        f.write_str(name)
    }
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Path to git repository")]
    pub repo: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Backend::Git, help = "Extraction backend")]
    pub backend: Backend,

    #[arg(long, help = "Repository URL for the remote backend")]
    pub remote_url: Option<String>,

    #[arg(long, help = "Path to the git executable", default_value = "git")]
    pub git_binary: String,

    #[arg(long, help = "Start from this date (RFC3339, YYYY-MM-DD, or natural language)")]
    pub since: Option<String>,

    #[arg(long, help = "End at this date (RFC3339, YYYY-MM-DD, or natural language)")]
    pub until: Option<String>,

    #[arg(long, help = "Author name or email substring, alternatives separated by '|'")]
    pub author: Option<String>,

    #[arg(long, help = "Substring to match in the commit subject")]
    pub grep: Option<String>,

    #[arg(long, help = "Only merge commits on the default remote branch", default_value_t = false)]
    pub merged_only: bool,

    #[arg(long = "include", help = "Only count paths under this prefix (repeatable)")]
    pub include_paths: Vec<String>,

    #[arg(long = "exclude", help = "Skip paths under this prefix (repeatable)")]
    pub exclude_paths: Vec<String>,

    #[arg(long, help = "Show a progress spinner on stderr", default_value_t = false)]
    pub progress: bool,
}

impl CommonArgs {
    pub fn query_args(&self) -> QueryArgs {
        QueryArgs {
            since: self.since.clone(),
            until: self.until.clone(),
            author: self.author.clone(),
            grep: self.grep.clone(),
            merged_only: self.merged_only,
            include_paths: self.include_paths.clone(),
            exclude_paths: self.exclude_paths.clone(),
        }
    }

    pub fn repo_path(&self) -> Result<PathBuf> {
        match &self.repo {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Human-readable origin of the history, for report metadata.
    pub fn repository_label(&self) -> Result<String> {
        match (self.backend, &self.remote_url) {
            (Backend::Remote, Some(url)) => Ok(url.clone()),
            _ => Ok(self.repo_path()?.to_string_lossy().to_string()),
        }
    }

    pub fn data_source(&self) -> Result<Box<dyn CommitDataSource>> {
        let progress: Arc<dyn ProgressSink> = if self.progress {
            Arc::new(SpinnerProgress::new())
        } else {
            no_progress()
        };

        let source: Box<dyn CommitDataSource> = match self.backend {
            Backend::Git => Box::new(
                GitCliSource::new(self.repo_path()?)
                    .with_git_binary(&self.git_binary)
                    .with_progress(progress),
            ),
            Backend::Library => {
                Box::new(LibrarySource::new(self.repo_path()?).with_progress(progress))
            }
            Backend::Remote => {
                let Some(url) = &self.remote_url else {
                    bail!("--remote-url is required with --backend remote");
                };
                Box::new(RemoteSource::new(url.clone()).with_progress(progress))
            }
        };
        Ok(source)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank authors by lines changed and commit count
    Authors {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,

        #[arg(long, help = "Number of authors shown in the table", default_value_t = 50)]
        top: usize,
    },
    /// Export one row per (commit, file change)
    Export {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Authors { json, ndjson, top } => {
                crate::report::authors(&self.common, json, ndjson, top)
            }
            Commands::Export { json, ndjson } => crate::report::export(&self.common, json, ndjson),
        }
    }
}
