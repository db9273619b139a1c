//! Terminal rendering for stage updates, sources and history.

use shared::events::{StageRecord, StageStatus};
use shared::research::{HistoryEntry, SearchResult};

pub fn stage_line(record: &StageRecord) -> String {
    let marker = match record.status {
        StageStatus::Pending => " ",
        StageStatus::Active => ">",
        StageStatus::Completed => "✓",
        StageStatus::Error => "✗",
    };
    let mut line = format!(
        "[{}] {}. {}: {}",
        marker,
        record.index + 1,
        record.stage.display_name(),
        record.title
    );
    for detail in record.detail.lines().filter(|l| !l.trim().is_empty()) {
        line.push_str("\n      ");
        line.push_str(detail);
    }
    line
}

/// Numbered source list matching the `[n]` markers in the answer.
pub fn sources(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {} ({})\n    {}", i + 1, r.title, r.source, r.url))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No research history yet.".to_string();
    }
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "{}. {} ({}, {} sources)",
                i + 1,
                e.question,
                e.timestamp.format("%Y-%m-%d %H:%M"),
                e.sources.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
