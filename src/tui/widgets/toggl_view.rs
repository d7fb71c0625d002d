use chrono::{DateTime, Utc};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::integrations::toggl::{
    TimeEntry, duration_by_day, duration_by_project, format_hours, group_by_project, running_entry,
};
use crate::tui::app::App;
use crate::tui::widgets::color::parse_color;

/// Entries grouped under their project, with the running timer on top
pub(crate) fn entry_lines(entries: &[TimeEntry], now: DateTime<Utc>) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(running) = running_entry(entries) {
        lines.push(format!(
            "▶ {} ({}, {})",
            running.description.as_deref().unwrap_or("(no description)"),
            running.project_label(),
            format_hours(running.elapsed_hours(now))
        ));
        lines.push(String::new());
    }
    for (project, group) in group_by_project(entries) {
        lines.push(project);
        for entry in group.iter().filter(|e| !e.is_running()) {
            lines.push(format!(
                "  {} {} {}",
                entry.day(),
                format_hours(entry.hours()),
                entry.description.as_deref().unwrap_or("(no description)")
            ));
        }
    }
    lines
}

/// Totals per day (newest first) and per project
pub(crate) fn summary_lines(entries: &[TimeEntry]) -> Vec<String> {
    let mut lines = vec!["By day".to_string()];
    for (day, hours) in duration_by_day(entries).iter().rev() {
        lines.push(format!("  {}  {}", day, format_hours(*hours)));
    }
    lines.push(String::new());
    lines.push("By project".to_string());
    let by_project = duration_by_project(entries);
    for (project, hours) in &by_project {
        lines.push(format!("  {}  {}", project, format_hours(*hours)));
    }
    lines.push(String::new());
    lines.push(format!("Total  {}", format_hours(by_project.values().sum())));
    lines
}

fn styled(lines: Vec<String>, heading: Style) -> Vec<Line<'static>> {
    lines
        .into_iter()
        .map(|l| {
            if l.is_empty() || l.starts_with(' ') {
                Line::from(l)
            } else {
                Line::styled(l, heading)
            }
        })
        .collect()
}

pub fn render_toggl_view(f: &mut Frame, area: Rect, app: &App) {
    let active_theme = app.config.get_active_theme();
    let fg = Style::default().fg(parse_color(&active_theme.fg));
    let heading = Style::default()
        .fg(parse_color(&active_theme.accent))
        .add_modifier(Modifier::BOLD);
    let remote = &app.state.integrations.toggl;

    let notice = if remote.loading {
        Some("Loading...".to_string())
    } else if let Some(ref e) = remote.error {
        Some(format!("Toggl: {}", e))
    } else if remote.data.is_empty() {
        Some("No time entries in the last week".to_string())
    } else {
        None
    };
    if let Some(text) = notice {
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Toggl"))
            .style(fg)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let entries = Paragraph::new(styled(entry_lines(&remote.data, Utc::now()), heading))
        .block(Block::default().borders(Borders::ALL).title("Time Entries"))
        .style(fg);
    f.render_widget(entries, columns[0]);

    let summary = Paragraph::new(styled(summary_lines(&remote.data), heading))
        .block(Block::default().borders(Borders::ALL).title("Summary"))
        .style(fg);
    f.render_widget(summary, columns[1]);
}
