//! Turning raw diff signals into [`FileChange`] records.
//!
//! The subprocess backend gets two independent signals per commit, numstat
//! lines and raw status lines, which are joined by final path. The
//! in-process backends classify tree-diff results directly and count lines
//! from blob content.

use crate::model::{ChangeType, FileChange};
use similar::{Algorithm, ChangeTag, TextDiff};
use std::collections::{BTreeMap, BTreeSet};

/// Bytes inspected when deciding whether a blob is binary, as git does.
const BINARY_PROBE_BYTES: usize = 8000;

/// Tree entry mode of a submodule commit.
const GITLINK_MODE: &str = "160000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumstatEntry {
    /// Path as printed by git, possibly in rename notation.
    pub raw_path: String,
    pub additions: u32,
    pub deletions: u32,
    pub is_binary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: String,
    pub old_path: Option<String>,
    pub change_type: ChangeType,
}

/// `<additions>\t<deletions>\t<path>`, counts may be `-` for binary files.
pub fn parse_numstat_line(line: &str) -> Option<NumstatEntry> {
    let mut parts = line.splitn(3, '\t');
    let added = parts.next()?;
    let deleted = parts.next()?;
    let path = parts.next()?;
    if path.is_empty() {
        return None;
    }

    let (additions, deletions, is_binary) = match (parse_count(added)?, parse_count(deleted)?) {
        (Some(a), Some(d)) => (a, d, false),
        _ => (0, 0, true),
    };

    Some(NumstatEntry {
        raw_path: unquote_path(path),
        additions,
        deletions,
        is_binary,
    })
}

// Outer None: not a count at all. Inner None: the binary marker.
fn parse_count(field: &str) -> Option<Option<u32>> {
    if field == super::wire::BINARY_MARKER {
        return Some(None);
    }
    field.parse::<u32>().ok().map(Some)
}

/// `<code>\t<path>` or `<code>\t<old>\t<new>` for renames and copies.
pub fn parse_status_line(line: &str) -> Option<StatusEntry> {
    let mut parts = line.split('\t');
    let code = parts.next()?;
    if !is_status_code(code) {
        return None;
    }
    let first = parts.next().filter(|p| !p.is_empty())?;
    let second = parts.next().filter(|p| !p.is_empty());

    let change_type = ChangeType::from_status_code(code);
    let entry = match second {
        Some(new_path) => StatusEntry {
            path: unquote_path(new_path),
            old_path: Some(unquote_path(first)),
            change_type,
        },
        None if change_type.carries_old_path() => return None,
        None => StatusEntry {
            path: unquote_path(first),
            old_path: None,
            change_type,
        },
    };
    Some(entry)
}

/// A `--raw` diff line with the status it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub status: StatusEntry,
    /// Either side is a submodule commit rather than a file.
    pub gitlink: bool,
}

/// `:<old mode> <new mode> <old id> <new id> <code>\t<path>[\t<new path>]`
pub fn parse_raw_line(line: &str) -> Option<RawEntry> {
    let (meta, paths) = line.strip_prefix(':')?.split_once('\t')?;
    let fields: Vec<&str> = meta.split(' ').collect();
    let [old_mode, new_mode, _, _, code] = fields.as_slice() else {
        return None;
    };
    let status = parse_status_line(&format!("{code}\t{paths}"))?;
    Some(RawEntry {
        status,
        gitlink: *old_mode == GITLINK_MODE || *new_mode == GITLINK_MODE,
    })
}

fn is_status_code(code: &str) -> bool {
    let mut chars = code.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase()) && chars.all(|c| c.is_ascii_digit())
}

/// Accumulates the diff lines that follow one commit header.
#[derive(Debug, Default, Clone)]
pub struct DiffSignals {
    numstat: Vec<NumstatEntry>,
    status: Vec<StatusEntry>,
    gitlinks: BTreeSet<String>,
}

impl DiffSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a line to the numstat or status signal. Returns false for a
    /// non-blank line that is neither.
    pub fn push_line(&mut self, line: &str) -> bool {
        if line.trim().is_empty() {
            return true;
        }
        if let Some(raw) = parse_raw_line(line) {
            if raw.gitlink {
                self.gitlinks.insert(raw.status.path);
            } else {
                self.status.push(raw.status);
            }
            true
        } else if let Some(entry) = parse_numstat_line(line) {
            self.numstat.push(entry);
            true
        } else if let Some(entry) = parse_status_line(line) {
            self.status.push(entry);
            true
        } else {
            false
        }
    }

    /// Merged changes, without submodule entries.
    pub fn into_file_changes(self) -> Vec<FileChange> {
        let gitlinks = self.gitlinks;
        merge_signals(self.numstat, self.status)
            .into_iter()
            .filter(|change| !gitlinks.contains(&change.path))
            .collect()
    }
}

/// Join numstat and name-status entries into one change per final path.
pub fn merge_signals(numstat: Vec<NumstatEntry>, status: Vec<StatusEntry>) -> Vec<FileChange> {
    let status_map: BTreeMap<String, (ChangeType, Option<String>)> = status
        .into_iter()
        .map(|s| (s.path, (s.change_type, s.old_path)))
        .collect();

    let mut counts: BTreeMap<String, (u32, u32, bool)> = BTreeMap::new();
    for entry in numstat {
        let path = if status_map.contains_key(&entry.raw_path) {
            entry.raw_path
        } else {
            resolve_rename_notation(&entry.raw_path)
                .map(|(_, new)| new)
                .unwrap_or(entry.raw_path)
        };
        counts.insert(path, (entry.additions, entry.deletions, entry.is_binary));
    }

    let paths: BTreeSet<&String> = counts.keys().chain(status_map.keys()).collect();
    paths
        .into_iter()
        .map(|path| {
            let (additions, deletions, is_binary) =
                counts.get(path).copied().unwrap_or((0, 0, false));
            let (change_type, old_path) = status_map
                .get(path)
                .cloned()
                .unwrap_or((ChangeType::Unknown, None));
            FileChange::new(path.clone(), old_path, additions, deletions, change_type, is_binary)
        })
        .collect()
}

/// Resolve git's numstat rename notation into `(old, new)`:
/// `old => new` and `dir/{old => new}/file`.
pub fn resolve_rename_notation(raw: &str) -> Option<(String, String)> {
    if let (Some(open), Some(close)) = (raw.find('{'), raw.rfind('}')) {
        if open < close {
            if let Some((old, new)) = raw[open + 1..close].split_once(" => ") {
                let prefix = &raw[..open];
                let suffix = &raw[close + 1..];
                return Some((join_parts(prefix, old, suffix), join_parts(prefix, new, suffix)));
            }
        }
    }
    raw.split_once(" => ")
        .map(|(old, new)| (old.to_string(), new.to_string()))
}

fn join_parts(prefix: &str, middle: &str, suffix: &str) -> String {
    let joined = format!("{prefix}{middle}{suffix}").replace("//", "/");
    joined.trim_start_matches('/').to_string()
}

/// Undo git's C-style path quoting (`"tab\there"`). Unquoted paths pass
/// through unchanged.
pub fn unquote_path(path: &str) -> String {
    if path.len() < 2 || !path.starts_with('"') || !path.ends_with('"') {
        return path.to_string();
    }

    let inner = path[1..path.len() - 1].as_bytes();
    let mut out = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        let b = inner[i];
        if b != b'\\' || i + 1 == inner.len() {
            out.push(b);
            i += 1;
            continue;
        }
        let next = inner[i + 1];
        let simple = match next {
            b'n' => Some(b'\n'),
            b't' => Some(b'\t'),
            b'r' => Some(b'\r'),
            b'a' => Some(0x07),
            b'b' => Some(0x08),
            b'f' => Some(0x0c),
            b'v' => Some(0x0b),
            b'"' => Some(b'"'),
            b'\\' => Some(b'\\'),
            _ => None,
        };
        if let Some(byte) = simple {
            out.push(byte);
            i += 2;
            continue;
        }
        let octal = &inner[i + 1..(i + 4).min(inner.len())];
        if octal.len() == 3 && octal.iter().all(|d| (b'0'..=b'7').contains(d)) {
            let value = octal.iter().fold(0u32, |acc, d| acc * 8 + (d - b'0') as u32);
            out.push(value as u8);
            i += 4;
        } else {
            out.push(b);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub fn is_binary(data: &[u8]) -> bool {
    data.iter().take(BINARY_PROBE_BYTES).any(|&b| b == 0)
}

/// Line count the way numstat reports an added or deleted file: every
/// newline-terminated line plus a trailing unterminated one.
pub fn count_lines(data: &[u8]) -> u32 {
    let newlines = data.iter().filter(|&&b| b == b'\n').count();
    let trailing = usize::from(!data.is_empty() && !data.ends_with(b"\n"));
    (newlines + trailing) as u32
}

/// Inserted and removed lines between two text blobs.
pub fn line_diff(old: &[u8], new: &[u8]) -> (u32, u32) {
    let old_text = String::from_utf8_lossy(old);
    let new_text = String::from_utf8_lossy(new);
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(old_text.as_ref(), new_text.as_ref());

    let mut added = 0u32;
    let mut deleted = 0u32;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => deleted += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, deleted)
}

/// A tree-diff result with the blob content it refers to.
#[derive(Debug, Clone, Copy)]
pub enum TreeChange<'a> {
    Added {
        path: &'a str,
        data: &'a [u8],
    },
    Deleted {
        path: &'a str,
        data: &'a [u8],
    },
    Modified {
        path: &'a str,
        old: &'a [u8],
        new: &'a [u8],
    },
    Rewritten {
        source_path: &'a str,
        path: &'a str,
        old: &'a [u8],
        new: &'a [u8],
        copy: bool,
    },
}

/// Classify a structural tree change into a [`FileChange`].
pub fn classify_change(change: TreeChange<'_>) -> FileChange {
    match change {
        TreeChange::Added { path, data } => {
            let binary = is_binary(data);
            let lines = if binary { 0 } else { count_lines(data) };
            FileChange::new(path.to_string(), None, lines, 0, ChangeType::Add, binary)
        }
        TreeChange::Deleted { path, data } => {
            let binary = is_binary(data);
            let lines = if binary { 0 } else { count_lines(data) };
            FileChange::new(path.to_string(), None, 0, lines, ChangeType::Delete, binary)
        }
        TreeChange::Modified { path, old, new } => {
            let binary = is_binary(old) || is_binary(new);
            let (added, deleted) = if binary { (0, 0) } else { line_diff(old, new) };
            FileChange::new(path.to_string(), None, added, deleted, ChangeType::Modify, binary)
        }
        TreeChange::Rewritten {
            source_path,
            path,
            old,
            new,
            copy,
        } => {
            let binary = is_binary(old) || is_binary(new);
            let (added, deleted) = if binary { (0, 0) } else { line_diff(old, new) };
            let change_type = if copy { ChangeType::Copy } else { ChangeType::Rename };
            FileChange::new(
                path.to_string(),
                Some(source_path.to_string()),
                added,
                deleted,
                change_type,
                binary,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn signals(lines: &[&str]) -> Vec<FileChange> {
        let mut s = DiffSignals::new();
        for line in lines {
            assert!(s.push_line(line), "unrecognized line {line:?}");
        }
        s.into_file_changes()
    }

    #[test]
    fn joins_numstat_and_status_by_path() {
        let changes = signals(&[
            "M\tsrc/lib.rs",
            "A\tREADME.md",
            "3\t1\tsrc/lib.rs",
            "10\t0\tREADME.md",
        ]);
        assert_eq!(
            changes,
            vec![
                FileChange::new("README.md".into(), None, 10, 0, ChangeType::Add, false),
                FileChange::new("src/lib.rs".into(), None, 3, 1, ChangeType::Modify, false),
            ]
        );
    }

    #[test]
    fn joins_raw_and_numstat_output() {
        let blob = "\
:100644 100644 8baef1b 4b825dc M\tsrc/lib.rs
:000000 100644 0000000 d00491f A\tREADME.md
:100644 100644 5716ca5 5716ca5 R100\told.txt\tnew.txt
:100644 000000 e69de29 0000000 D\tgone.txt
:000000 160000 0000000 1234567 A\tvendor/sub

3\t1\tsrc/lib.rs
10\t0\tREADME.md
0\t0\told.txt => new.txt
0\t2\tgone.txt
1\t0\tvendor/sub
";
        let changes = signals(&blob.lines().collect::<Vec<_>>());
        let summary: Vec<_> = changes
            .iter()
            .map(|c| (c.path.as_str(), c.change_type, c.additions, c.deletions))
            .collect();
        assert_eq!(
            summary,
            [
                ("README.md", ChangeType::Add, 10, 0),
                ("gone.txt", ChangeType::Delete, 0, 2),
                ("new.txt", ChangeType::Rename, 0, 0),
                ("src/lib.rs", ChangeType::Modify, 3, 1),
            ]
        );
        assert_eq!(changes[2].old_path.as_deref(), Some("old.txt"));
    }

    #[test]
    fn raw_line_flags_submodule_entries() {
        let entry = parse_raw_line(":160000 160000 aaaaaaa bbbbbbb M\tdeps/lib").unwrap();
        assert!(entry.gitlink);
        assert_eq!(entry.status.path, "deps/lib");

        let file = parse_raw_line(":100755 100644 aaaaaaa bbbbbbb M\t\"caf\\303\\251\"").unwrap();
        assert!(!file.gitlink);
        assert_eq!(file.status.path, "café");
        assert_eq!(parse_raw_line("M\tplain"), None);
    }

    #[test]
    fn pure_rename_has_zero_counts() {
        let changes = signals(&["R100\told.txt\tnew.txt", "0\t0\told.txt => new.txt"]);
        assert_eq!(changes.len(), 1);
        let fc = &changes[0];
        assert_eq!(fc.path, "new.txt");
        assert_eq!(fc.old_path.as_deref(), Some("old.txt"));
        assert_eq!(fc.change_type, ChangeType::Rename);
        assert_eq!((fc.additions, fc.deletions), (0, 0));
    }

    #[test]
    fn rename_without_numstat_defaults_to_zero() {
        let changes = signals(&["R097\ta/x.rs\tb/x.rs"]);
        assert_eq!(changes[0].change_type, ChangeType::Rename);
        assert_eq!((changes[0].additions, changes[0].deletions), (0, 0));
    }

    #[test]
    fn brace_rename_notation_resolves_to_final_path() {
        let changes = signals(&[
            "R080\tsrc/old/mod.rs\tsrc/new/mod.rs",
            "2\t1\tsrc/{old => new}/mod.rs",
        ]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "src/new/mod.rs");
        assert_eq!((changes[0].additions, changes[0].deletions), (2, 1));

        assert_eq!(
            resolve_rename_notation("{ => lib}/a.rs"),
            Some(("a.rs".to_string(), "lib/a.rs".to_string()))
        );
        assert_eq!(
            resolve_rename_notation("lib/{sub => }/a.rs"),
            Some(("lib/sub/a.rs".to_string(), "lib/a.rs".to_string()))
        );
        assert_eq!(resolve_rename_notation("plain.rs"), None);
    }

    #[test]
    fn binary_marker_maps_to_zero() {
        let changes = signals(&["A\tlogo.png", "-\t-\tlogo.png"]);
        assert_eq!(changes[0].change_type, ChangeType::Add);
        assert!(changes[0].is_binary);
        assert_eq!((changes[0].additions, changes[0].deletions), (0, 0));
    }

    #[test]
    fn numstat_without_status_is_unknown() {
        let changes = signals(&["4\t2\torphan.rs"]);
        assert_eq!(changes[0].change_type, ChangeType::Unknown);
        assert_eq!((changes[0].additions, changes[0].deletions), (4, 2));
    }

    #[test]
    fn rejects_garbage_lines() {
        let mut s = DiffSignals::new();
        assert!(!s.push_line("not a diff line"));
        assert!(!s.push_line("x\ty\tz"));
        assert!(!s.push_line("R100\tonly-one-path"));
        assert!(s.push_line(""));
        assert!(!s.push_line(":100644 100644 abc M\tshort.rs"));
        assert!(s.into_file_changes().is_empty());
    }

    #[test]
    fn unquotes_git_paths() {
        assert_eq!(unquote_path("plain.txt"), "plain.txt");
        assert_eq!(unquote_path("\"tab\\there\""), "tab\there");
        assert_eq!(unquote_path("\"caf\\303\\251.txt\""), "café.txt");
        assert_eq!(unquote_path("\"say \\\"hi\\\"\""), "say \"hi\"");
    }

    #[test]
    fn counts_lines_like_numstat() {
        assert_eq!(count_lines(b""), 0);
        assert_eq!(count_lines(b"one\n"), 1);
        assert_eq!(count_lines(b"one\ntwo"), 2);
        assert_eq!(count_lines(b"\n\n"), 2);
    }

    #[test]
    fn line_diff_counts_inserts_and_deletes() {
        assert_eq!(line_diff(b"a\nb\nc\n", b"a\nb\nc\nd\n"), (1, 0));
        assert_eq!(line_diff(b"a\nb\nc\n", b"a\nc\n"), (0, 1));
        assert_eq!(line_diff(b"a\nb\n", b"a\nB\n"), (1, 1));
        assert_eq!(line_diff(b"a", b"a\n"), (1, 1));
    }

    #[test]
    fn classifies_structural_changes() {
        let add = classify_change(TreeChange::Added { path: "f.txt", data: b"x\ny\n" });
        assert_eq!((add.change_type, add.additions, add.deletions), (ChangeType::Add, 2, 0));

        let del = classify_change(TreeChange::Deleted { path: "f.txt", data: b"x\ny\n" });
        assert_eq!((del.change_type, del.additions, del.deletions), (ChangeType::Delete, 0, 2));

        let bin = classify_change(TreeChange::Modified {
            path: "b.bin",
            old: b"\0\x01",
            new: b"\0\x02",
        });
        assert!(bin.is_binary);
        assert_eq!((bin.additions, bin.deletions), (0, 0));

        let ren = classify_change(TreeChange::Rewritten {
            source_path: "a.txt",
            path: "b.txt",
            old: b"same\n",
            new: b"same\n",
            copy: false,
        });
        assert_eq!(ren.change_type, ChangeType::Rename);
        assert_eq!(ren.old_path.as_deref(), Some("a.txt"));
        assert_eq!((ren.additions, ren.deletions), (0, 0));
    }
}
