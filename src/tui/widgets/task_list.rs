use chrono::NaiveDate;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Scrollbar, ScrollbarOrientation, ScrollbarState};

use crate::filters::date_part;
use crate::models::{Task, TaskPriority, TaskStatus};
use crate::state::AppState;
use crate::tui::app::{App, Focus};
use crate::tui::widgets::color::parse_color;
use crate::utils::format_relative_date;

/// One list row: status mark, title, then the optional badges
pub(crate) fn task_row(task: &Task, state: &AppState, today: NaiveDate) -> String {
    let mark = if task.status == TaskStatus::Completed { "✓" } else { "○" };
    let mut row = format!("{} {}", mark, task.title);

    let bangs = match task.priority {
        TaskPriority::High => "!!!",
        TaskPriority::Medium => "!!",
        TaskPriority::Low => "!",
        TaskPriority::None => "",
    };
    if !bangs.is_empty() {
        row.push(' ');
        row.push_str(bangs);
    }
    if let Some(ref due) = task.due_date {
        row.push_str(&format!(" [{}]", format_relative_date(due, today)));
    }
    for name in state.tag_names(task) {
        row.push_str(&format!(" #{}", name));
    }
    if let Some(project) = task.project_id.as_deref().and_then(|id| state.project(id)) {
        row.push_str(&format!(" @{}", project.name));
    }
    row
}

fn is_overdue(task: &Task, today: &str) -> bool {
    task.status.is_open() && task.due_date.as_deref().is_some_and(|d| date_part(d) < today)
}

pub fn render_task_list(f: &mut Frame, area: Rect, app: &mut App) {
    let active_theme = app.config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let accent = parse_color(&active_theme.accent);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let highlight_fg = parse_color(&active_theme.highlight_fg);

    // 2 for borders, 1 for the scrollbar
    let max_width = area.width.saturating_sub(3) as usize;
    let today = app.today.format("%Y-%m-%d").to_string();

    let tasks = app.current_tasks();
    let total = tasks.len();
    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
            let mut row = task_row(task, &app.state, app.today);
            if row.chars().count() > max_width {
                row = row.chars().take(max_width.saturating_sub(3)).collect::<String>() + "...";
            }
            let style = if is_overdue(task, &today) {
                Style::default().fg(accent)
            } else if !task.status.is_open() {
                Style::default().fg(fg_color).add_modifier(Modifier::DIM)
            } else {
                Style::default().fg(fg_color)
            };
            ListItem::new(Line::from(Span::styled(row, style)))
        })
        .collect();

    let list_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let list_area = list_areas[0];
    let scrollbar_area = list_areas[1];

    let title = if total == 0 {
        app.state.view_title()
    } else {
        let position = app.list_state.selected().map(|i| i + 1).unwrap_or(0);
        format!("{} ({} of {})", app.state.view_title(), position, total)
    };
    let border_style = if app.focus == Focus::List {
        Style::default().fg(accent)
    } else {
        Style::default().fg(fg_color)
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title).border_style(border_style))
        .style(Style::default().fg(fg_color))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg));

    f.render_stateful_widget(list, list_area, &mut app.list_state);

    let visible_items = list_area.height.saturating_sub(2) as usize;
    if total > visible_items && scrollbar_area.width > 0 && list_area.height > 2 {
        let scrollbar_inner_area = Rect::new(
            scrollbar_area.x,
            list_area.y + 1,
            scrollbar_area.width,
            list_area.height.saturating_sub(2),
        );
        let selected_index = app.list_state.selected().unwrap_or(0);
        let scroll_position = selected_index.saturating_sub(visible_items.saturating_sub(1));
        let mut scrollbar_state = ScrollbarState::new(total)
            .viewport_content_length(visible_items)
            .position(scroll_position);
        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"))
            .track_symbol(Some("│"))
            .thumb_symbol("█");
        f.render_stateful_widget(scrollbar, scrollbar_inner_area, &mut scrollbar_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{NewProject, NewTask, TaskService};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_task_row_badges() {
        let service = TaskService::default();
        let mut state = AppState::default();
        let project = service
            .create_project(NewProject {
                name: "Work".to_string(),
                ..Default::default()
            })
            .unwrap();
        let tag = service.create_tag("urgent", None).unwrap();
        let mut fields = NewTask::titled("Send invoice");
        fields.priority = TaskPriority::High;
        fields.due_date = Some("2024-06-16".to_string());
        fields.project_id = Some(project.id.clone());
        fields.tags = vec![tag.id.clone(), "dangling".to_string()];
        let task = service.create_task(fields).unwrap();
        state.upsert_project(project);
        state.upsert_tag(tag);

        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(
            task_row(&task, &state, today),
            "○ Send invoice !!! [Tomorrow] #urgent @Work"
        );

        let done = service.complete_task(&task);
        assert!(task_row(&done, &AppState::default(), today).starts_with("✓ Send invoice !!!"));
    }

    #[test]
    fn test_overdue_only_when_open() {
        let service = TaskService::default();
        let mut fields = NewTask::titled("Late");
        fields.due_date = Some("2024-06-01".to_string());
        let task = service.create_task(fields).unwrap();
        assert!(is_overdue(&task, "2024-06-15"));
        assert!(!is_overdue(&task, "2024-06-01"));
        assert!(!is_overdue(&service.complete_task(&task), "2024-06-15"));
    }
}
