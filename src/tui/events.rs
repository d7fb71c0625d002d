use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode, size as terminal_size,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use std::io;
use tracing::info;

use crate::tui::app::{App, Focus, Mode, SidebarState};
use crate::tui::error::TuiError;
use crate::tui::layout::Layout;
use crate::utils::{ParsedKeyBinding, parse_key_binding};

/// Restores the terminal when dropped, including during a panic unwind
struct TerminalGuard {
    raw_mode_enabled: bool,
    alternate_screen_enabled: bool,
}

impl TerminalGuard {
    fn new() -> Result<Self, TuiError> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self {
            raw_mode_enabled: true,
            alternate_screen_enabled: true,
        })
    }

    /// Restore on normal exit; drop becomes a no-op afterwards
    fn restore(&mut self) -> Result<(), TuiError> {
        if self.raw_mode_enabled {
            disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        if self.alternate_screen_enabled {
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.alternate_screen_enabled = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.raw_mode_enabled {
            let _ = disable_raw_mode();
        }
        if self.alternate_screen_enabled {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}

pub fn run_event_loop(mut app: App) -> Result<(), TuiError> {
    // Checked before entering the alternate screen so the message stays visible
    let (width, height) = terminal_size()?;
    let min_width_with_border = Layout::MIN_WIDTH + 2;
    let min_height_with_border = Layout::MIN_HEIGHT + 2;
    if width < min_width_with_border || height < min_height_with_border {
        return Err(TuiError::RenderError(format!(
            "Terminal size too small. Current: {}x{}, Minimum required: {}x{}. Please resize your terminal window.",
            width, height, min_width_with_border, min_height_with_border
        )));
    }

    let mut guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    info!("tui started");

    loop {
        app.tick();

        let size = terminal.size()?;
        let terminal_rect = Rect::new(0, 0, size.width, size.height);
        terminal.draw(|f| {
            let layout = Layout::calculate(
                terminal_rect,
                app.config.sidebar_width_percent,
                app.sidebar_state == SidebarState::Collapsed,
            );
            crate::tui::render::render(f, &mut app, &layout);
        })?;

        // Press only: some platforms also report releases
        if event::poll(std::time::Duration::from_millis(16))?
            && let Event::Key(key_event) = event::read()?
            && key_event.kind == KeyEventKind::Press
            && handle_key_event(&mut app, key_event)?
        {
            break;
        }
    }

    guard.restore()?;
    drop(terminal);
    info!("tui stopped");
    app.shutdown()
}

/// Dispatch one key press. Returns true when the app should quit.
pub(crate) fn handle_key_event(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    match app.mode {
        Mode::Normal => handle_normal_mode(app, key_event),
        Mode::Search => handle_search_mode(app, key_event),
        Mode::Help => handle_help_mode(app, key_event),
        Mode::TaskForm => handle_task_form_mode(app, key_event),
        Mode::ProjectForm => handle_project_form_mode(app, key_event),
        Mode::ConfirmDelete => handle_delete_confirmation_modal(app, key_event),
        Mode::Standup => handle_standup_mode(app, key_event),
    }
}

fn binding(key_str: &str) -> Result<ParsedKeyBinding, TuiError> {
    parse_key_binding(key_str).map_err(TuiError::KeyBindingError)
}

fn pressed(key_event: KeyEvent, key_str: &str) -> Result<bool, TuiError> {
    Ok(matches_key_event(key_event, &binding(key_str)?))
}

fn handle_normal_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    let keys = app.config.key_bindings.clone();

    if pressed(key_event, &keys.quit)? {
        return Ok(true);
    }
    if pressed(key_event, &keys.help)? {
        app.enter_help_mode();
        return Ok(false);
    }
    if pressed(key_event, &keys.toggle_sidebar)? {
        app.toggle_sidebar();
        return Ok(false);
    }
    if pressed(key_event, &keys.switch_focus)? {
        app.switch_focus();
        return Ok(false);
    }
    // Reorder bindings carry a modifier, so they go before plain navigation
    if pressed(key_event, &keys.move_up)? {
        if app.focus == Focus::List {
            app.reorder_selected(true);
        }
        return Ok(false);
    }
    if pressed(key_event, &keys.move_down)? {
        if app.focus == Focus::List {
            app.reorder_selected(false);
        }
        return Ok(false);
    }
    if key_event.code == KeyCode::Up || pressed(key_event, &keys.list_up)? {
        app.move_selection_up();
        return Ok(false);
    }
    if key_event.code == KeyCode::Down || pressed(key_event, &keys.list_down)? {
        app.move_selection_down();
        return Ok(false);
    }
    if pressed(key_event, &keys.search)? {
        app.enter_search_mode();
        return Ok(false);
    }
    if pressed(key_event, &keys.new_project)? {
        app.enter_project_form();
        return Ok(false);
    }
    if pressed(key_event, &keys.new)? {
        if !app.state.view.is_integration() {
            app.enter_create_mode();
        }
        return Ok(false);
    }
    if pressed(key_event, &keys.standup)? {
        app.open_standup();
        return Ok(false);
    }
    if pressed(key_event, &keys.refresh)? {
        app.refresh_integrations();
        return Ok(false);
    }
    if pressed(key_event, &keys.select)? {
        match app.focus {
            Focus::Sidebar => app.focus = Focus::List,
            Focus::List => app.enter_edit_mode(),
        }
        return Ok(false);
    }

    if app.focus == Focus::List {
        if pressed(key_event, &keys.edit)? {
            app.enter_edit_mode();
            return Ok(false);
        }
        if pressed(key_event, &keys.delete)? {
            app.request_delete();
            return Ok(false);
        }
        if pressed(key_event, &keys.toggle_complete)? {
            app.toggle_selected_complete();
            return Ok(false);
        }
    }

    match key_event.code {
        KeyCode::Char(c) if c.is_ascii_digit() => {
            if let Some(n) = c.to_digit(10) {
                app.jump_to_fixed_view(n as usize);
            }
        }
        KeyCode::Esc => {
            // Drops a search kept with Enter
            if app.state.search_query.is_some() {
                app.exit_search_mode(false);
            }
        }
        _ => {}
    }
    Ok(false)
}

fn handle_search_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    match key_event.code {
        KeyCode::Esc => app.exit_search_mode(false),
        KeyCode::Enter => app.exit_search_mode(true),
        KeyCode::Char(c) => app.add_to_search(c),
        KeyCode::Backspace => app.remove_from_search(),
        KeyCode::Up => app.move_selection_up(),
        KeyCode::Down => app.move_selection_down(),
        _ => {}
    }
    Ok(false)
}

fn handle_help_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if key_event.code == KeyCode::Esc || pressed(key_event, &app.config.key_bindings.help)? {
        app.exit_help_mode();
    }
    Ok(false)
}

fn handle_standup_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if matches!(key_event.code, KeyCode::Esc | KeyCode::Enter)
        || pressed(key_event, &app.config.key_bindings.standup)?
    {
        app.close_standup();
    }
    Ok(false)
}

fn handle_task_form_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if pressed(key_event, &app.config.key_bindings.save)? {
        app.save_task_form();
        return Ok(false);
    }

    let Some(field) = app.task_form.as_ref().map(|f| f.current_field) else {
        app.exit_task_form();
        return Ok(false);
    };
    let multi_line = field == crate::tui::app::TaskField::Notes;

    match key_event.code {
        KeyCode::Esc => app.exit_task_form(),
        KeyCode::Tab => app.navigate_form_field(true),
        KeyCode::BackTab => app.navigate_form_field(false),
        KeyCode::Enter if multi_line => {
            if let Some(editor) = app.get_current_form_editor() {
                editor.insert_newline();
            }
        }
        KeyCode::Enter => app.navigate_form_field(true),
        KeyCode::Left | KeyCode::Right if field.is_choice() => {
            app.cycle_form_choice(key_event.code == KeyCode::Right);
        }
        KeyCode::Up if !multi_line => app.navigate_form_field(false),
        KeyCode::Down if !multi_line => app.navigate_form_field(true),
        _ => {
            if let Some(editor) = app.get_current_form_editor() {
                edit_text(editor, key_event);
            }
        }
    }
    Ok(false)
}

fn handle_project_form_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if pressed(key_event, &app.config.key_bindings.save)? {
        app.save_project_form();
        return Ok(false);
    }
    match key_event.code {
        KeyCode::Esc => app.exit_project_form(),
        KeyCode::Enter => app.save_project_form(),
        _ => edit_text(&mut app.project_name, key_event),
    }
    Ok(false)
}

/// Plain editing keys shared by every text field
fn edit_text(editor: &mut crate::tui::widgets::editor::Editor, key_event: KeyEvent) {
    match key_event.code {
        KeyCode::Char(c) if !crate::utils::has_primary_modifier(key_event.modifiers) => editor.insert_char(c),
        KeyCode::Backspace => editor.delete_char(),
        KeyCode::Left => editor.move_cursor_left(),
        KeyCode::Right => editor.move_cursor_right(),
        KeyCode::Up => editor.move_cursor_up(),
        KeyCode::Down => editor.move_cursor_down(),
        KeyCode::Home => editor.move_cursor_home(),
        KeyCode::End => editor.move_cursor_end(),
        _ => {}
    }
}

fn handle_delete_confirmation_modal(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    match key_event.code {
        KeyCode::Up | KeyCode::Down | KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
            app.delete_selection = 1 - app.delete_selection.min(1);
        }
        KeyCode::Enter => {
            if app.delete_selection == 0 {
                app.confirm_delete();
            } else {
                app.cancel_delete();
            }
        }
        KeyCode::Char('y') => app.confirm_delete(),
        KeyCode::Esc | KeyCode::Char('n') => app.cancel_delete(),
        _ => {}
    }
    Ok(false)
}

fn matches_key_event(key_event: KeyEvent, binding: &ParsedKeyBinding) -> bool {
    // Ctrl, or Option on macOS
    let has_primary_mod = crate::utils::has_primary_modifier(key_event.modifiers);
    if binding.requires_ctrl != has_primary_mod {
        return false;
    }
    binding.key_code == key_event.code
}
