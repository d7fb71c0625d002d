use chrono::NaiveDate;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, List, ListItem};

use crate::state::{AppState, View};
use crate::tui::app::{App, Focus};
use crate::tui::widgets::color::parse_color;

/// Sidebar label for one view, with its task count where it has one
pub(crate) fn sidebar_label(state: &AppState, view: &View, today: NaiveDate) -> String {
    match view {
        View::GitHub | View::Toggl => view.title().to_string(),
        View::Project(id) => {
            let name = state.project(id).map(|p| p.name.as_str()).unwrap_or("?");
            format!("● {} ({})", name, state.count(view, today))
        }
        View::Tag(id) => {
            let name = state.tag(id).map(|t| t.name.as_str()).unwrap_or("?");
            format!("# {} ({})", name, state.count(view, today))
        }
        fixed => format!("{} ({})", fixed.title(), state.count(fixed, today)),
    }
}

pub fn render_sidebar(f: &mut Frame, area: Rect, app: &mut App) {
    let active_theme = app.config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let accent = parse_color(&active_theme.accent);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let highlight_fg = parse_color(&active_theme.highlight_fg);
    let max_width = area.width.saturating_sub(2) as usize;

    let list_items: Vec<ListItem> = app
        .sidebar_items()
        .iter()
        .map(|view| {
            let mut label = sidebar_label(&app.state, view, app.today);
            if label.chars().count() > max_width {
                label = label.chars().take(max_width.saturating_sub(3)).collect::<String>() + "...";
            }
            let style = match view {
                View::Project(_) | View::Tag(_) => Style::default().fg(accent),
                _ => Style::default().fg(fg_color),
            };
            ListItem::new(label).style(style)
        })
        .collect();

    let border_style = if app.focus == Focus::Sidebar {
        Style::default().fg(accent)
    } else {
        Style::default().fg(fg_color)
    };
    let list = List::new(list_items)
        .block(Block::default().borders(Borders::ALL).title("Views").border_style(border_style))
        .highlight_style(
            Style::default()
                .fg(highlight_fg)
                .bg(highlight_bg)
                .add_modifier(Modifier::BOLD),
        );

    f.render_stateful_widget(list, area, &mut app.sidebar_list_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{NewProject, NewTask, TaskService};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sidebar_labels() {
        let service = TaskService::default();
        let mut state = AppState::default();
        let project = service
            .create_project(NewProject {
                name: "Home".to_string(),
                ..Default::default()
            })
            .unwrap();
        let tag = service.create_tag("errand", None).unwrap();
        let mut task = NewTask::titled("Fix sink");
        task.project_id = Some(project.id.clone());
        task.tags = vec![tag.id.clone()];
        state.upsert_task(service.create_task(task).unwrap());
        let project_view = View::Project(project.id.clone());
        let tag_view = View::Tag(tag.id.clone());
        state.upsert_project(project);
        state.upsert_tag(tag);

        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(sidebar_label(&state, &View::Inbox, today), "Inbox (1)");
        assert_eq!(sidebar_label(&state, &View::GitHub, today), "GitHub");
        assert_eq!(sidebar_label(&state, &project_view, today), "● Home (1)");
        assert_eq!(sidebar_label(&state, &tag_view, today), "# errand (1)");
        assert_eq!(sidebar_label(&state, &View::Tag("gone".into()), today), "# ? (0)");
    }
}
