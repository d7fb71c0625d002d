use chrono::{NaiveDateTime, NaiveDate};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::models::Project;
use crate::review::{STALE_PROJECT_DAYS, stale_projects, tasks_needing_review, tasks_without_project};
use crate::state::AppState;
use crate::tui::app::App;
use crate::tui::widgets::color::parse_color;

/// Summary lines for the weekly review: stale projects, then unfiled tasks
pub(crate) fn review_lines(state: &AppState, today: NaiveDate, now: NaiveDateTime) -> Vec<String> {
    let projects: Vec<Project> = state.projects().into_iter().cloned().collect();
    let stale = stale_projects(&projects, state.tasks(), now, STALE_PROJECT_DAYS);
    let pending = tasks_needing_review(state.tasks(), today).len();

    let mut lines = vec![
        format!("{} task(s) need attention", pending),
        String::new(),
        format!("Stale projects ({})", stale.len()),
    ];
    if stale.is_empty() {
        lines.push("  none".to_string());
    }
    for entry in &stale {
        let line = match entry.last_activity {
            Some(last) => {
                let days = (today - last.date()).num_days();
                format!("  {} ({}d ago)", entry.project.name, days)
            }
            None => format!("  {} (no open tasks)", entry.project.name),
        };
        lines.push(line);
    }

    let unfiled = tasks_without_project(state.tasks());
    lines.push(String::new());
    lines.push(format!("Tasks without a project ({})", unfiled.len()));
    lines.extend(unfiled.iter().take(10).map(|t| format!("  {}", t.title)));
    if unfiled.len() > 10 {
        lines.push(format!("  ... and {} more", unfiled.len() - 10));
    }
    lines
}

pub fn render_review_panel(f: &mut Frame, area: Rect, app: &App) {
    if area.width < 2 || area.height < 2 {
        return;
    }
    let active_theme = app.config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let accent = parse_color(&active_theme.accent);

    let now = chrono::Local::now().naive_local();
    let lines: Vec<Line> = review_lines(&app.state, app.today, now)
        .into_iter()
        .map(|l| {
            if l.starts_with(' ') || l.is_empty() {
                Line::from(l)
            } else {
                Line::styled(l, Style::default().fg(accent).add_modifier(Modifier::BOLD))
            }
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Weekly Review"))
        .style(Style::default().fg(fg_color))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::service::{NewTask, TaskService};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_review_lines() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let now = today.and_hms_opt(12, 0, 0).unwrap();
        let service = TaskService::default();

        let mut project = Project {
            id: "p1".to_string(),
            name: "Garage".to_string(),
            description: None,
            color: None,
            icon: None,
            order_index: 1.0,
            is_inbox: false,
            created_at: "2024-05-01T09:00:00".to_string(),
            updated_at: "2024-05-01T09:00:00".to_string(),
            deleted: false,
        };
        let mut state = AppState::default();
        let mut fields = NewTask::titled("Sort tools");
        fields.project_id = Some(project.id.clone());
        let mut task = service.create_task(fields).unwrap();
        task.created_at = "2024-06-01T10:00:00".to_string();
        task.updated_at = "2024-06-05T10:00:00".to_string();
        state.upsert_task(task);

        let mut fields = NewTask::titled("Call plumber");
        fields.status = TaskStatus::Active;
        state.upsert_task(service.create_task(fields).unwrap());

        state.upsert_project(project.clone());
        project.id = "p2".to_string();
        project.name = "Empty".to_string();
        state.upsert_project(project);

        assert_eq!(
            review_lines(&state, today, now),
            vec![
                "1 task(s) need attention",
                "",
                "Stale projects (2)",
                "  Garage (10d ago)",
                "  Empty (no open tasks)",
                "",
                "Tasks without a project (1)",
                "  Call plumber",
            ]
        );
    }
}
