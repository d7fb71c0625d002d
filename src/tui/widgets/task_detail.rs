use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::models::Task;
use crate::state::AppState;
use crate::tui::app::App;
use crate::tui::widgets::color::parse_color;

/// Label/value pairs shown for a task, empty fields left out
pub(crate) fn detail_fields(task: &Task, state: &AppState) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("Status", task.status.to_string()),
        ("Priority", task.priority.to_string()),
    ];
    if let Some(ref due) = task.due_date {
        fields.push(("Due", due.clone()));
    }
    if let Some(ref start) = task.start_date {
        fields.push(("Start", start.clone()));
    }
    if let Some(ref project_id) = task.project_id {
        let name = state
            .project(project_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("(missing {})", project_id));
        fields.push(("Project", name));
    }
    let tags = state.tag_names(task);
    if !tags.is_empty() {
        fields.push(("Tags", tags.join(", ")));
    }
    if let Some(kind) = task.kind {
        fields.push(("Kind", kind.to_string()));
    }
    if let Some(size) = task.size {
        fields.push(("Size", size.to_string()));
    }
    if let Some(ref assignee) = task.assignee {
        fields.push(("Assignee", assignee.clone()));
    }
    if let Some(ref url) = task.context_url {
        fields.push(("Link", url.clone()));
    }
    if let Some(ref rule) = task.repeat_rule {
        fields.push(("Repeats", rule.clone()));
    }
    let reminders: Vec<&str> = state.reminders_for(&task.id).iter().map(|r| r.at.as_str()).collect();
    if !reminders.is_empty() {
        fields.push(("Reminders", reminders.join(", ")));
    }
    if let Some(ref completed) = task.completed_at {
        fields.push(("Completed", completed.clone()));
    }
    fields.push(("Created", task.created_at.clone()));
    fields.push(("Id", task.id.clone()));
    fields
}

pub fn render_task_detail(f: &mut Frame, area: Rect, app: &App) {
    if area.width < 2 || area.height < 2 {
        return;
    }
    let active_theme = app.config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let accent = parse_color(&active_theme.accent);
    let block = Block::default().borders(Borders::ALL).title("Details");

    let Some(task) = app.selected_task() else {
        let paragraph = Paragraph::new("No task selected")
            .block(block)
            .style(Style::default().fg(fg_color));
        f.render_widget(paragraph, area);
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(
            task.title.clone(),
            Style::default().fg(fg_color).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for (label, value) in detail_fields(task, &app.state) {
        lines.push(Line::from(vec![
            Span::styled(format!("{}: ", label), Style::default().fg(accent)),
            Span::raw(value),
        ]));
    }
    if let Some(ref notes) = task.notes {
        lines.push(Line::from(""));
        lines.extend(notes.lines().map(|l| Line::from(l.to_string())));
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(fg_color))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}
