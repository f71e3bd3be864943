use super::parser::StreamParser;
use super::wire::log_format;
use super::{CommitDataSource, DEFAULT_BRANCH_CANDIDATES, DEFAULT_REMOTE};
use crate::error::{GitrankError, Result};
use crate::model::CommitRecord;
use crate::progress::{no_progress, ProgressSink};
use crate::query::CommitQuery;
use crossbeam_channel::bounded;
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Lines buffered between the stdout reader and the parser.
const LINE_CHANNEL_CAPACITY: usize = 1024;

/// Extracts history by running `git log` and parsing its text output.
pub struct GitCliSource {
    repo_path: PathBuf,
    git_binary: OsString,
    progress: Arc<dyn ProgressSink>,
}

/// Revision `git log` starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogStart {
    Head,
    /// Merges on the first-parent chain of a default branch.
    Branch(String),
}

impl GitCliSource {
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            git_binary: OsString::from("git"),
            progress: no_progress(),
        }
    }

    pub fn with_git_binary<S: Into<OsString>>(mut self, binary: S) -> Self {
        self.git_binary = binary.into();
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.git_binary);
        cmd.arg("-C").arg(&self.repo_path).stdin(Stdio::null());
        cmd
    }

    fn describe(args: &[String]) -> String {
        format!("git {}", args.join(" "))
    }

    /// Run a short git command, returning whether it succeeded and its stdout.
    fn run_quiet(&self, args: &[&str]) -> Result<(bool, String)> {
        let output = self
            .command()
            .args(args)
            .stderr(Stdio::null())
            .output()
            .map_err(|e| GitrankError::GitCommand {
                command: format!("git {}", args.join(" ")),
                message: e.to_string(),
            })?;
        Ok((
            output.status.success(),
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    }

    /// Pick the revision to log from, probing default branches for
    /// merged-only queries.
    pub fn resolve_start(&self, query: &CommitQuery) -> Result<LogStart> {
        if !query.merged_only {
            return Ok(LogStart::Head);
        }

        for candidate in DEFAULT_BRANCH_CANDIDATES {
            let revspec = format!("{candidate}^{{commit}}");
            let (found, _) = self.run_quiet(&["rev-parse", "--verify", "--quiet", &revspec])?;
            if found {
                debug!(branch = *candidate, "listing merges on default branch");
                return Ok(LogStart::Branch(candidate.to_string()));
            }
        }

        let (ok, remotes) = self.run_quiet(&["remote"])?;
        if ok && remotes.lines().any(|r| r.trim() == DEFAULT_REMOTE) {
            return Err(GitrankError::MissingBranch(format!(
                "remote '{DEFAULT_REMOTE}' has none of {}",
                DEFAULT_BRANCH_CANDIDATES.join(", ")
            )));
        }
        debug!("no '{DEFAULT_REMOTE}' remote, listing all merges reachable from HEAD");
        Ok(LogStart::Head)
    }

    /// Arguments for the `git log` invocation (after `git -C <repo>`).
    ///
    /// Date, author and subject filters are re-applied exactly after
    /// parsing; the author and grep arguments here only narrow the output.
    pub fn log_args(&self, query: &CommitQuery, start: &LogStart) -> Vec<String> {
        let mut args: Vec<String> = [
            "-c",
            "log.showRoot=true",
            "-c",
            "log.showSignature=false",
            "-c",
            "core.quotePath=false",
            "log",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        match start {
            LogStart::Head => args.push("HEAD".to_string()),
            LogStart::Branch(branch) => args.push(branch.clone()),
        }

        args.extend(
            [
                "--no-color",
                "--no-textconv",
                "--no-ext-diff",
                "--raw",
                "--numstat",
                "--diff-merges=first-parent",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(format!("--format={}", log_format()));

        if query.merged_only {
            args.push("--merges".to_string());
            if matches!(start, LogStart::Branch(_)) {
                args.push("--first-parent".to_string());
            }
        }

        if !query.authors.is_empty() || query.grep.is_some() {
            args.push("--regexp-ignore-case".to_string());
            args.push("--fixed-strings".to_string());
        }
        for author in &query.authors {
            args.push(format!("--author={author}"));
        }
        if let Some(grep) = &query.grep {
            args.push(format!("--grep={grep}"));
        }

        args
    }

    /// Stream `git log` output through a bounded channel into the parser.
    fn stream_log(&self, args: &[String]) -> Result<Vec<CommitRecord>> {
        let command = Self::describe(args);
        debug!(%command, "running git");

        let mut child = self
            .command()
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GitrankError::GitCommand {
                command: command.clone(),
                message: format!("failed to start {:?}: {e}", self.git_binary),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GitrankError::git_repo("git stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| GitrankError::git_repo("git stderr was not captured"))?;

        let (tx, rx) = bounded::<io::Result<String>>(LINE_CHANNEL_CAPACITY);
        let producer = thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        if buf.ends_with(b"\n") {
                            buf.pop();
                        }
                        if buf.ends_with(b"\r") {
                            buf.pop();
                        }
                        let line = String::from_utf8_lossy(&buf).into_owned();
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });
        let stderr_drain = thread::spawn(move || {
            let mut raw = Vec::new();
            let _ = BufReader::new(stderr).read_to_end(&mut raw);
            String::from_utf8_lossy(&raw).into_owned()
        });

        self.progress.start("Reading git log");
        let mut parser = StreamParser::new();
        let mut records = Vec::new();
        let mut read_error = None;
        for line in rx.iter() {
            match line {
                Ok(line) => {
                    if let Some(record) = parser.push_line(&line) {
                        records.push(record);
                        self.progress.advance(1);
                    }
                }
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
        }
        drop(rx);
        if let Some(record) = parser.finish() {
            records.push(record);
            self.progress.advance(1);
        }

        producer
            .join()
            .map_err(|_| GitrankError::git_repo("git output reader panicked"))?;
        let status = child.wait()?;
        let stderr = stderr_drain
            .join()
            .map_err(|_| GitrankError::git_repo("git stderr reader panicked"))?;

        if !status.success() {
            return Err(GitrankError::GitCommand {
                command,
                message: format!("{status}: {}", stderr.trim()),
            });
        }
        if let Some(e) = read_error {
            return Err(GitrankError::Io(e));
        }

        self.progress.finish("git log parsed");
        debug!(
            parsed = records.len(),
            warnings = parser.warnings().len(),
            "git log output parsed"
        );
        Ok(records)
    }
}

impl CommitDataSource for GitCliSource {
    fn name(&self) -> &'static str {
        "git"
    }

    fn get_commits(&self, query: &CommitQuery) -> Result<Vec<CommitRecord>> {
        let start = self.resolve_start(query)?;
        let args = self.log_args(query, &start);
        let records = self.stream_log(&args)?;
        Ok(records.into_iter().filter_map(|r| query.finish(r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryArgs;

    #[test]
    fn log_args_carry_protocol_and_prefilters() {
        let source = GitCliSource::new(".");
        let query = CommitQuery::resolve(&QueryArgs {
            author: Some("alice|bob".into()),
            grep: Some("fix".into()),
            ..Default::default()
        })
        .unwrap();

        let args = source.log_args(&query, &LogStart::Head);
        let log_at = args.iter().position(|a| a == "log").unwrap();
        assert_eq!(args[log_at + 1], "HEAD");
        assert!(args.contains(&format!("--format={}", log_format())));
        assert!(args.contains(&"--numstat".to_string()));
        assert!(args.contains(&"--raw".to_string()));
        assert!(!args.contains(&"--name-status".to_string()));
        assert!(args.contains(&"--diff-merges=first-parent".to_string()));
        assert!(args.contains(&"--author=alice".to_string()));
        assert!(args.contains(&"--author=bob".to_string()));
        assert!(args.contains(&"--grep=fix".to_string()));
        assert!(args.contains(&"--fixed-strings".to_string()));
        assert!(!args.contains(&"--merges".to_string()));
    }

    #[test]
    fn merged_only_on_branch_follows_first_parent() {
        let source = GitCliSource::new(".");
        let query = CommitQuery {
            merged_only: true,
            ..CommitQuery::all()
        };
        let start = LogStart::Branch("refs/remotes/origin/main".into());
        let args = source.log_args(&query, &start);
        assert!(args.contains(&"refs/remotes/origin/main".to_string()));
        assert!(args.contains(&"--merges".to_string()));
        assert!(args.contains(&"--first-parent".to_string()));

        let fallback = source.log_args(&query, &LogStart::Head);
        assert!(fallback.contains(&"--merges".to_string()));
        assert!(!fallback.contains(&"--first-parent".to_string()));
    }

    #[test]
    fn missing_binary_is_an_extraction_error() {
        let source = GitCliSource::new(".").with_git_binary("definitely-not-a-git-binary-7f3a");
        let err = source.get_commits(&CommitQuery::all()).unwrap_err();
        assert!(matches!(err, GitrankError::GitCommand { .. }));
    }
}
