use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::models::TaskPriority;
use crate::state::AppState;
use crate::tui::app::{App, TaskField, TaskForm};
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::editor::Editor;
use crate::tui::widgets::help::popup_area;

/// Text shown for a choice field, with arrows hinting Left/Right
pub(crate) fn choice_text(form: &TaskForm, field: TaskField, state: &AppState) -> String {
    let value = match field {
        TaskField::Priority => match form.priority {
            TaskPriority::None => "None".to_string(),
            other => {
                let name = other.to_string();
                let mut chars = name.chars();
                chars
                    .next()
                    .map(|c| c.to_uppercase().collect::<String>() + chars.as_str())
                    .unwrap_or_default()
            }
        },
        TaskField::Project => form
            .project_id
            .as_deref()
            .map(|id| {
                state
                    .project(id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| format!("(missing {})", id))
            })
            .unwrap_or_else(|| "None".to_string()),
        _ => String::new(),
    };
    format!("◀ {} ▶", value)
}

fn field_height(field: TaskField) -> Constraint {
    match field {
        TaskField::Notes => Constraint::Min(5),
        _ => Constraint::Length(3),
    }
}

/// Draw one editor in a bordered box, scrolled so the cursor stays visible.
/// Returns the cursor position when the field is active.
fn render_editor(
    f: &mut Frame,
    area: Rect,
    editor: &mut Editor,
    title: &str,
    active: bool,
    style: Style,
    active_style: Style,
) -> Option<(u16, u16)> {
    let inner_height = area.height.saturating_sub(2) as usize;
    let inner_width = area.width.saturating_sub(2) as usize;
    editor.update_scroll(inner_height, inner_width);

    let lines: Vec<Line> = editor
        .visible_lines(inner_height, inner_width)
        .into_iter()
        .map(Line::from)
        .collect();
    let border = if active { active_style } else { style };
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()).border_style(border))
        .style(style);
    f.render_widget(paragraph, area);

    if active {
        editor.get_cursor_screen_pos(area)
    } else {
        None
    }
}

pub fn render_task_form(f: &mut Frame, area: Rect, app: &mut App) {
    let active_theme = app.config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let accent = parse_color(&active_theme.accent);
    let style = Style::default().fg(fg_color).bg(bg_color);
    let active_style = Style::default().fg(accent).bg(bg_color);

    let Some(mut form) = app.task_form.take() else {
        return;
    };

    let popup = popup_area(area, 70, 90);
    f.render_widget(Clear, popup);
    let title = if form.editing_task_id.is_some() { "Edit Task" } else { "New Task" };
    let outer = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_alignment(Alignment::Center)
        .style(style);
    let inner = outer.inner(popup);
    f.render_widget(outer, popup);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(TaskField::ALL.map(field_height))
        .split(inner);

    let mut cursor = None;
    for (field, row) in TaskField::ALL.iter().zip(rows.iter()) {
        let active = form.current_field == *field;
        if field.is_choice() {
            let border = if active { active_style } else { style };
            let paragraph = Paragraph::new(choice_text(&form, *field, &app.state))
                .block(Block::default().borders(Borders::ALL).title(field.label()).border_style(border))
                .style(style);
            f.render_widget(paragraph, *row);
            continue;
        }
        let editor = match field {
            TaskField::Title => &mut form.title,
            TaskField::Notes => &mut form.notes,
            TaskField::DueDate => &mut form.due_date,
            TaskField::StartDate => &mut form.start_date,
            _ => &mut form.tags,
        };
        if let Some(pos) = render_editor(f, *row, editor, field.label(), active, style, active_style) {
            cursor = Some(pos);
        }
    }
    if let Some((x, y)) = cursor {
        f.set_cursor_position(Position::new(x, y));
    }

    app.task_form = Some(form);
}

pub fn render_project_form(f: &mut Frame, area: Rect, app: &mut App) {
    let active_theme = app.config.get_active_theme();
    let style = Style::default()
        .fg(parse_color(&active_theme.fg))
        .bg(parse_color(&active_theme.bg));
    let active_style = Style::default()
        .fg(parse_color(&active_theme.accent))
        .bg(parse_color(&active_theme.bg));

    let popup = popup_area(area, 50, 20);
    let popup = Rect::new(popup.x, popup.y, popup.width, popup.height.max(3));
    f.render_widget(Clear, popup);
    if let Some((x, y)) = render_editor(f, popup, &mut app.project_name, "New Project", true, style, active_style) {
        f.set_cursor_position(Position::new(x, y));
    }
}
