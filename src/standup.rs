//! Markdown standup report built from recent completions and today's plan.

use chrono::{Duration, NaiveDate};

use crate::filters::date_part;
use crate::integrations::toggl::{total_hours_on, TimeEntry};
use crate::models::Task;

/// Tasks listed per section
pub const MAX_ITEMS: usize = 10;

/// Build the report. `completed` should already be newest-first (the
/// Completed view order); only tasks completed on or after
/// `today - days_back` are listed.
pub fn generate_report(
    completed: &[&Task],
    today_tasks: &[&Task],
    time_entries: Option<&[TimeEntry]>,
    days_back: i64,
    today: NaiveDate,
) -> String {
    let cutoff = (today - Duration::days(days_back)).format("%Y-%m-%d").to_string();
    let today_str = today.format("%Y-%m-%d").to_string();
    let mut lines: Vec<String> = Vec::new();

    lines.push("## Yesterday".to_string());
    lines.push(String::new());
    let recent: Vec<&&Task> = completed
        .iter()
        .filter(|t| {
            t.completed_at
                .as_deref()
                .is_some_and(|c| date_part(c) >= cutoff.as_str())
        })
        .take(MAX_ITEMS)
        .collect();
    if recent.is_empty() {
        lines.push("- No tasks completed".to_string());
    } else {
        lines.extend(recent.iter().map(|t| format!("- {}", t.title)));
    }

    if let Some(entries) = time_entries {
        let yesterday = today - Duration::days(1);
        let yesterday_str = yesterday.format("%Y-%m-%d").to_string();
        if entries.iter().any(|e| e.day() == yesterday_str) {
            lines.push(String::new());
            lines.push(format!(
                "_Total tracked time: {:.1}h_",
                total_hours_on(entries, yesterday)
            ));
        }
    }
    lines.push(String::new());

    lines.push("## Today".to_string());
    lines.push(String::new());
    if today_tasks.is_empty() {
        lines.push("- No tasks scheduled".to_string());
    } else {
        for task in today_tasks.iter().take(MAX_ITEMS) {
            let overdue = task
                .due_date
                .as_deref()
                .is_some_and(|d| date_part(d) < today_str.as_str());
            let prefix = if overdue { "- [ ] ⚠️" } else { "- [ ]" };
            lines.push(format!("{} {}", prefix, task.title));
        }
    }
    lines.push(String::new());

    lines.push("## Blockers".to_string());
    lines.push(String::new());
    lines.push("- None".to_string());

    lines.join("\n")
}

/// Strip the markdown so the report pastes cleanly into chat
pub fn format_for_clipboard(report: &str) -> String {
    report
        .replace("## ", "")
        .replace("- [ ] ", "- ")
        .replace('_', "")
}
