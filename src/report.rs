use crate::cli::CommonArgs;
use crate::query::CommitQuery;
use crate::stats::{author_stats, AuthorStat};
use crate::table::{CommitTable, CommitTableRow};
use crate::model::SCHEMA_VERSION;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct ReportOutput<T: Serialize> {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub repository: String,
    pub backend: String,
    pub since: Option<String>,
    pub until: Option<String>,
    pub entries: Vec<T>,
}

fn load_table(common: &CommonArgs) -> Result<CommitTable> {
    let query = CommitQuery::resolve(&common.query_args()).context("Invalid query")?;
    let source = common.data_source()?;
    let commits = source
        .get_commits(&query)
        .with_context(|| format!("Failed to extract commits with the {} backend", source.name()))?;
    debug!(backend = source.name(), commits = commits.len(), "commits extracted");
    Ok(CommitTable::from_records(&commits))
}

fn envelope<T: Serialize>(common: &CommonArgs, entries: Vec<T>) -> Result<ReportOutput<T>> {
    Ok(ReportOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        repository: common.repository_label()?,
        backend: common.backend.to_string(),
        since: common.since.clone(),
        until: common.until.clone(),
        entries,
    })
}

fn output_ndjson<T: Serialize>(entries: &[T]) -> Result<()> {
    for e in entries {
        println!("{}", serde_json::to_string(e)?);
    }
    Ok(())
}

pub fn authors(common: &CommonArgs, json: bool, ndjson: bool, top: usize) -> Result<()> {
    let table = load_table(common)?;
    let stats = author_stats(&table);

    if json {
        println!("{}", serde_json::to_string_pretty(&envelope(common, stats)?)?);
    } else if ndjson {
        output_ndjson(&stats)?;
    } else {
        output_author_table(&stats, top);
    }
    Ok(())
}

fn output_author_table(stats: &[AuthorStat], top: usize) {
    if stats.is_empty() {
        println!("No commits matched");
        return;
    }

    println!(
        "{:>4} {:<40} {:>8} {:>8} {:>8} {:>7} {:>6} {:>6}",
        style("Rank").bold(),
        style("Author").bold(),
        style("Added").bold(),
        style("Deleted").bold(),
        style("Total").bold(),
        style("Commits").bold(),
        style("DiffD").bold(),
        style("CommD").bold()
    );
    println!("{}", "─".repeat(94));
    for s in stats.iter().take(top) {
        println!(
            "{:>4} {:<40} {:>8} {:>8} {:>8} {:>7} {:>6} {:>6}",
            s.rank,
            truncate(&format!("{} <{}>", s.name, s.email), 40),
            s.added,
            s.deleted,
            s.total,
            s.commit_count,
            s.diff_decile,
            s.commit_decile
        );
    }
    if stats.len() > top {
        println!("\n... and {} more authors", stats.len() - top);
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

pub fn export(common: &CommonArgs, json: bool, ndjson: bool) -> Result<()> {
    let table = load_table(common)?;

    if json {
        let rows = table.into_rows();
        println!("{}", serde_json::to_string_pretty(&envelope(common, rows)?)?);
    } else if ndjson {
        output_ndjson(table.rows())?;
    } else {
        output_summary(table.rows());
    }
    Ok(())
}

fn output_summary(rows: &[CommitTableRow]) {
    println!("{}", style("Export Summary").bold());
    println!("{}", "─".repeat(50));

    let commits: HashSet<_> = rows.iter().map(|r| &r.commit_hash).collect();
    let total_added: u64 = rows.iter().map(|r| r.additions as u64).sum();
    let total_deleted: u64 = rows.iter().map(|r| r.deletions as u64).sum();
    let unique_authors: HashSet<_> = rows.iter().map(|r| r.author_email.to_lowercase()).collect();

    println!("Total commits: {}", style(commits.len()).cyan());
    println!("Total file changes: {}", style(rows.len()).cyan());
    println!("Total lines added: {}", style(total_added).green());
    println!("Total lines deleted: {}", style(total_deleted).red());
    println!("Unique authors: {}", style(unique_authors.len()).yellow());

    let first = rows.iter().map(|r| r.commit_date).min();
    let last = rows.iter().map(|r| r.commit_date).max();
    if let (Some(first), Some(last)) = (first, last) {
        println!(
            "Date range: {} to {}",
            style(first.format("%Y-%m-%d")).dim(),
            style(last.format("%Y-%m-%d")).dim()
        );
    }

    println!("\nUse --json or --ndjson flags to export the raw rows.");
}
