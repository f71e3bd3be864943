#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::process::Command;

pub fn has_git() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str], date: Option<&str>) {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(dir);
    if let Some(date) = date {
        cmd.env("GIT_AUTHOR_DATE", date).env("GIT_COMMITTER_DATE", date);
    }
    let status = cmd.status().unwrap();
    assert!(status.success(), "git {args:?} failed");
}

pub fn run_git(dir: &Path, args: &[&str]) {
    git(dir, args, None);
}

pub fn init_git_repo(dir: &Path) {
    run_git(dir, &["init", "-q"]);
    run_git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    run_git(dir, &["config", "core.autocrlf", "false"]);
    run_git(dir, &["config", "core.safecrlf", "false"]);
    run_git(dir, &["config", "commit.gpgsign", "false"]);
    run_git(dir, &["config", "user.email", "you@example.com"]);
    run_git(dir, &["config", "user.name", "Your Name"]);
}

pub fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut f = File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.sync_all().unwrap();
}

/// Stage everything and commit as `author` at a fixed `date` (RFC 2822 or ISO).
pub fn commit_all(dir: &Path, author: (&str, &str), message: &str, date: &str) {
    run_git(dir, &["add", "-A"]);
    let name = format!("user.name={}", author.0);
    let email = format!("user.email={}", author.1);
    git(
        dir,
        &["-c", &name, "-c", &email, "commit", "-q", "--allow-empty", "-m", message],
        Some(date),
    );
}

/// Commit whatever is staged, keeping `message` byte for byte.
pub fn commit_staged_verbatim(dir: &Path, author: (&str, &str), message: &str, date: &str) {
    let message_file = dir.join(".git").join("FIXTURE_MSG");
    fs::write(&message_file, message).unwrap();
    let name = format!("user.name={}", author.0);
    let email = format!("user.email={}", author.1);
    let file_arg = message_file.to_string_lossy().to_string();
    let args: [&str; 9] =
        ["-c", &name, "-c", &email, "commit", "-q", "--cleanup=verbatim", "-F", &file_arg];
    git(dir, &args, Some(date));
}

pub fn head_id(dir: &Path) -> String {
    let out = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(out.status.success());
    String::from_utf8(out.stdout).unwrap().trim().to_string()
}

pub fn commit_file(dir: &Path, name: &str, content: &str, author: (&str, &str), date: &str) {
    write_file(dir, name, content);
    commit_all(dir, author, &format!("add {name}"), date);
}

pub const U1: (&str, &str) = ("User One", "u1@example.com");
pub const U2: (&str, &str) = ("User Two", "u2@example.com");

/// Root commit A (U1 adds file1.txt), B (U1 adds file2.txt), C (U2 adds a
/// line to file1.txt).
pub fn three_commit_repo(dir: &Path) {
    init_git_repo(dir);
    commit_file(dir, "file1.txt", "one\n", U1, "2024-01-01T10:00:00+00:00");
    commit_file(dir, "file2.txt", "two\n", U1, "2024-01-02T10:00:00+00:00");
    write_file(dir, "file1.txt", "one\nmore\n");
    commit_all(dir, U2, "edit file1.txt", "2024-01-03T10:00:00+00:00");
}

/// A feature branch merged with `--no-ff` into main.
pub fn merge_repo(dir: &Path) {
    init_git_repo(dir);
    commit_file(dir, "base.txt", "base\n", U1, "2024-02-01T10:00:00+00:00");
    run_git(dir, &["checkout", "-q", "-b", "feature"]);
    commit_file(dir, "feature.txt", "a\nb\nc\n", U2, "2024-02-02T10:00:00+00:00");
    run_git(dir, &["checkout", "-q", "main"]);
    commit_file(dir, "main.txt", "m\n", U1, "2024-02-03T10:00:00+00:00");
    git(
        dir,
        &[
            "-c",
            "user.name=User One",
            "-c",
            "user.email=u1@example.com",
            "merge",
            "-q",
            "--no-ff",
            "--no-edit",
            "-m",
            "Merge feature",
            "feature",
        ],
        Some("2024-02-04T10:00:00+00:00"),
    );
}

/// A merge history followed by deletes, renames, binary edits, paths git
/// quotes, a CRLF message and a submodule entry.
pub fn assorted_history_repo(dir: &Path) {
    merge_repo(dir);

    write_file(dir, "base.txt", "base\nchanged\n");
    fs::remove_file(dir.join("main.txt")).unwrap();
    commit_all(dir, U2, "edit and delete\n\nLonger body.\n", "2024-02-05T10:00:00+02:00");

    write_file(dir, "docs/old name.txt", "same\ncontent\nhere\n");
    fs::write(dir.join("blob.bin"), [0u8, 1, 2, 0, 10]).unwrap();
    commit_all(dir, U1, "add docs and blob", "2024-02-06T10:00:00-05:00");

    run_git(dir, &["mv", "docs/old name.txt", "docs/new name.txt"]);
    fs::write(dir.join("blob.bin"), [0u8, 3, 4, 0, 10, 10]).unwrap();
    commit_all(dir, U1, "rename and binary edit", "2024-02-07T10:00:00+00:00");

    write_file(dir, "café.txt", "accent\n");
    write_file(dir, "tab\tname.txt", "tab\n");
    write_file(dir, "say\"hi\".txt", "quote\n");
    commit_all(dir, U2, "paths git quotes", "2024-02-08T10:00:00+00:00");

    write_file(dir, "base.txt", "base\nchanged\nagain\n");
    run_git(dir, &["add", "base.txt"]);
    commit_staged_verbatim(dir, U2, "subj\r\n\r\nbody line\r\n", "2024-02-09T10:00:00+00:00");

    let target = format!("160000,{},vendor/sub", head_id(dir));
    write_file(dir, "after-sub.txt", "x\n");
    run_git(dir, &["add", "after-sub.txt"]);
    run_git(dir, &["update-index", "--add", "--cacheinfo", &target]);
    commit_staged_verbatim(dir, U1, "add submodule entry\n", "2024-02-10T10:00:00+00:00");
}
