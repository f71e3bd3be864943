use crate::table::CommitTable;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Contribution statistics for one author email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorStat {
    pub email: String,
    pub name: String,
    pub added: u64,
    pub deleted: u64,
    pub total: u64,
    pub commit_count: u64,
    /// Rank by `total`, 1-based, ties share the first position of the group.
    pub rank: usize,
    /// Rank by `commit_count`, same tie rule.
    pub commit_rank: usize,
    pub diff_decile: u8,
    pub commit_decile: u8,
}

#[derive(Default)]
struct AuthorAccum<'a> {
    email: &'a str,
    name: &'a str,
    added: u64,
    deleted: u64,
    commits: HashSet<&'a str>,
}

/// Group rows by author email (case-insensitively, keeping the first
/// spelling seen). Rank and decile fields are left at zero.
pub fn aggregate(table: &CommitTable) -> Vec<AuthorStat> {
    let mut order: Vec<String> = Vec::new();
    let mut by_email: HashMap<String, AuthorAccum<'_>> = HashMap::new();

    for row in table {
        let key = row.author_email.to_lowercase();
        let entry = by_email.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            AuthorAccum {
                email: &row.author_email,
                name: &row.author_name,
                ..Default::default()
            }
        });
        entry.added += row.additions as u64;
        entry.deleted += row.deletions as u64;
        entry.commits.insert(&row.commit_hash);
    }

    order
        .into_iter()
        .filter_map(|key| by_email.remove(&key))
        .map(|acc| AuthorStat {
            email: acc.email.to_string(),
            name: acc.name.to_string(),
            added: acc.added,
            deleted: acc.deleted,
            total: acc.added + acc.deleted,
            commit_count: acc.commits.len() as u64,
            rank: 0,
            commit_rank: 0,
            diff_decile: 0,
            commit_decile: 0,
        })
        .collect()
}

/// Populate ranks and decile bands. The result is ordered by diff rank.
pub fn rank_and_band(mut stats: Vec<AuthorStat>) -> Vec<AuthorStat> {
    let n = stats.len();
    if n == 0 {
        return stats;
    }

    stats.sort_by(|a, b| b.commit_count.cmp(&a.commit_count).then_with(|| a.email.cmp(&b.email)));
    let commit_ranks = competition_ranks(stats.iter().map(|s| s.commit_count));
    for (stat, rank) in stats.iter_mut().zip(commit_ranks) {
        stat.commit_rank = rank;
        stat.commit_decile = decile(rank, n);
    }

    stats.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.email.cmp(&b.email)));
    let diff_ranks = competition_ranks(stats.iter().map(|s| s.total));
    for (stat, rank) in stats.iter_mut().zip(diff_ranks) {
        stat.rank = rank;
        stat.diff_decile = decile(rank, n);
    }

    stats
}

/// Aggregate and rank in one step.
pub fn author_stats(table: &CommitTable) -> Vec<AuthorStat> {
    rank_and_band(aggregate(table))
}

/// Ranks for values already sorted descending: a value keeps the previous
/// rank unless strictly smaller, then takes its 1-based position.
fn competition_ranks(values: impl Iterator<Item = u64>) -> Vec<usize> {
    let mut ranks = Vec::new();
    let mut previous: Option<(u64, usize)> = None;
    for (idx, value) in values.enumerate() {
        let rank = match previous {
            Some((prev_value, prev_rank)) if value >= prev_value => prev_rank,
            _ => idx + 1,
        };
        ranks.push(rank);
        previous = Some((value, rank));
    }
    ranks
}

/// `min(10, ceil(rank * 10 / n))`
pub fn decile(rank: usize, n: usize) -> u8 {
    if n == 0 {
        return 10;
    }
    let banded = (rank * 10).div_ceil(n);
    banded.clamp(1, 10) as u8
}
