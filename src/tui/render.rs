use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout as RatLayout, Position};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::state::View;
use crate::tui::app::{App, Focus, Mode, SidebarState};
use crate::tui::layout::Layout;
use crate::tui::widgets::{
    color::parse_color, confirm_delete::render_confirm_delete, form::render_project_form,
    form::render_task_form, github_view::render_github_view, help::render_help,
    review_panel::render_review_panel, sidebar::render_sidebar, standup_popup::render_standup,
    status_bar::render_status_bar, task_detail::render_task_detail, task_list::render_task_list,
    toggl_view::render_toggl_view,
};
use crate::utils::format_key_binding_for_display as display;

pub fn render(f: &mut Frame, app: &mut App, layout: &Layout) {
    let active_theme = app.config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let accent = parse_color(&active_theme.accent);
    let area = f.area();

    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title("phitodo")
        .title_alignment(Alignment::Center)
        .style(Style::default().fg(fg_color).bg(bg_color));
    f.render_widget(outer_block, area);

    render_header(f, app, layout);

    if app.sidebar_state == SidebarState::Expanded && layout.sidebar_area.width > 0 {
        render_sidebar(f, layout.sidebar_area, app);
    }

    // List and detail share the main area; integration views take all of it
    match app.state.view {
        View::GitHub if app.state.search_query.is_none() => {
            render_github_view(f, main_area(layout), app);
        }
        View::Toggl if app.state.search_query.is_none() => {
            render_toggl_view(f, main_area(layout), app);
        }
        View::Review if layout.detail_area.width > 0 && app.state.search_query.is_none() => {
            render_task_list(f, layout.list_area, app);
            let halves = RatLayout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(layout.detail_area);
            render_review_panel(f, halves[0], app);
            render_task_detail(f, halves[1], app);
        }
        _ => {
            render_task_list(f, layout.list_area, app);
            if layout.detail_area.width > 0 {
                render_task_detail(f, layout.detail_area, app);
            }
        }
    }

    render_search_box(f, app, layout, accent);

    match app.mode {
        Mode::Help => render_help(f, area, &app.config),
        Mode::TaskForm => render_task_form(f, area, app),
        Mode::ProjectForm => render_project_form(f, area, app),
        Mode::ConfirmDelete => {
            let task = app.pending_delete.as_deref().and_then(|id| app.state.task(id));
            if let Some(task) = task {
                render_confirm_delete(f, area, task, app.delete_selection, &app.config);
            }
        }
        Mode::Standup => {
            if let Some(ref report) = app.standup_report {
                render_standup(f, area, report, &app.config);
            }
        }
        Mode::Normal | Mode::Search => {}
    }

    let key_hints = get_key_hints(app);
    render_status_bar(f, layout.status_area, app.status.message.as_ref(), &key_hints, &app.config);
}

fn main_area(layout: &Layout) -> ratatui::layout::Rect {
    let list = layout.list_area;
    let detail = layout.detail_area;
    ratatui::layout::Rect::new(list.x, list.y, list.width + detail.width, list.height)
}

/// View title on the left, today's date on the right
fn render_header(f: &mut Frame, app: &App, layout: &Layout) {
    let active_theme = app.config.get_active_theme();
    let accent = parse_color(&active_theme.accent);
    let title = app.state.view_title();
    let date = app.today.format("%a %b %d, %Y").to_string();
    let width = layout.header_area.width as usize;
    let gap = width.saturating_sub(title.chars().count() + date.chars().count() + 2);

    let line = Line::from(vec![
        Span::styled(format!(" {}", title), Style::default().fg(accent).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(gap)),
        Span::raw(format!("{} ", date)),
    ]);
    f.render_widget(Paragraph::new(line), layout.header_area);
}

fn render_search_box(f: &mut Frame, app: &App, layout: &Layout, accent: ratatui::style::Color) {
    let searching = app.mode == Mode::Search;
    let query = app.state.search_query.as_deref().unwrap_or("");
    let text = if query.is_empty() && !searching {
        format!("Press {} to search", display(&app.config.key_bindings.search))
    } else {
        query.to_string()
    };
    let border = if searching {
        Style::default().fg(accent)
    } else {
        Style::default()
    };
    let paragraph = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Search")
            .border_style(border),
    );
    f.render_widget(paragraph, layout.search_area);

    if searching {
        let area = layout.search_area;
        let x = (area.x + 1 + query.chars().count() as u16).min(area.x + area.width.saturating_sub(2));
        f.set_cursor_position(Position::new(x, area.y + 1));
    }
}

fn get_key_hints(app: &App) -> Vec<String> {
    let keys = &app.config.key_bindings;
    match app.mode {
        Mode::Help => vec![format!("Esc or {}: Exit help", display(&keys.help))],
        Mode::Search => vec![
            "Enter: Keep results".to_string(),
            "Esc: Clear search".to_string(),
            "↑/↓: Move".to_string(),
        ],
        Mode::TaskForm => vec![
            "Tab/Enter: Next field".to_string(),
            "Shift+Tab: Previous field".to_string(),
            "←/→: Change choice".to_string(),
            format!("{}: Save", display(&keys.save)),
            "Esc: Cancel".to_string(),
        ],
        Mode::ProjectForm => vec!["Enter: Create project".to_string(), "Esc: Cancel".to_string()],
        Mode::ConfirmDelete => vec![
            "Enter: Confirm".to_string(),
            "↑/↓: Choose".to_string(),
            "Esc: Cancel".to_string(),
        ],
        Mode::Standup => vec!["Esc: Close".to_string()],
        Mode::Normal => {
            let mut hints = vec![format!("{}: Quit", display(&keys.quit))];
            if app.state.view.is_integration() {
                hints.push(format!("{}: Refresh", display(&keys.refresh)));
            } else {
                hints.push(format!("{}: New", display(&keys.new)));
                if app.focus == Focus::List && app.selected_task().is_some() {
                    hints.push(format!("{}: Edit", display(&keys.edit)));
                    hints.push(format!("{}: Complete", display(&keys.toggle_complete)));
                    hints.push(format!("{}: Delete", display(&keys.delete)));
                }
                if app.can_reorder() {
                    hints.push(format!("{}/{}: Reorder", display(&keys.move_up), display(&keys.move_down)));
                }
            }
            hints.push(format!("{}: Search", display(&keys.search)));
            hints.push(format!("{}: Focus", display(&keys.switch_focus)));
            hints.push(format!("{}: Standup", display(&keys.standup)));
            hints.push(format!("{}: Help", display(&keys.help)));
            hints
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use crate::state::AppState;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::layout::Rect;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn draw(app: &mut App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|f| {
                let layout = Layout::calculate(Rect::new(0, 0, width, height), 25, false);
                render(f, app, &layout);
            })
            .unwrap();
        screen_text(&terminal)
    }

    #[test]
    fn test_render_main_screen() {
        let mut app = App::with_state(Config::default(), AppState::default(), None);
        app.enter_create_mode();
        if let Some(form) = app.task_form.as_mut() {
            for c in "Water plants".chars() {
                form.title.insert_char(c);
            }
        }
        app.save_task_form();

        let text = draw(&mut app, 120, 30);
        assert!(text.contains("phitodo"));
        assert!(text.contains("Inbox (1)"));
        assert!(text.contains("○ Water plants"));
        assert!(text.contains("Details"));
    }

    #[test]
    fn test_render_popups() {
        let mut app = App::with_state(Config::default(), AppState::default(), None);
        app.enter_help_mode();
        assert!(draw(&mut app, 120, 40).contains("Help - Key Bindings"));

        app.exit_help_mode();
        app.enter_create_mode();
        let text = draw(&mut app, 120, 40);
        assert!(text.contains("New Task"));
        assert!(app.task_form.is_some());
    }

    #[test]
    fn test_key_hints_follow_view() {
        let mut app = App::with_state(Config::default(), AppState::default(), None);
        assert!(get_key_hints(&app).iter().any(|h| h == "n: New"));
        app.state.set_view(View::GitHub);
        let hints = get_key_hints(&app);
        assert!(hints.iter().any(|h| h == "r: Refresh"));
        assert!(!hints.iter().any(|h| h == "n: New"));
    }
}
