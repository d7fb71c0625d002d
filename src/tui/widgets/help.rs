use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::Config;
use crate::tui::widgets::color::parse_color;
use crate::utils::format_key_binding_for_display as display;

pub fn render_help(f: &mut Frame, area: Rect, config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);

    let popup_area = popup_area(area, 60, 80);
    f.render_widget(Clear, popup_area);

    let paragraph = Paragraph::new(build_help_text(config))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help - Key Bindings")
                .title_alignment(Alignment::Center)
                .style(Style::default().fg(fg_color).bg(bg_color)),
        )
        .style(Style::default().fg(fg_color).bg(bg_color))
        .wrap(ratatui::widgets::Wrap { trim: false });

    f.render_widget(paragraph, popup_area);
}

/// Centered rect taking the given percentages of `area`
pub fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}

pub(crate) fn build_help_text(config: &Config) -> String {
    let keys = &config.key_bindings;
    let mut text = String::new();

    text.push_str("Navigation:\n");
    text.push_str(&format!("  {} / {} or ↑ / ↓: Move selection\n", display(&keys.list_up), display(&keys.list_down)));
    text.push_str(&format!("  {}: Switch focus between sidebar and list\n", display(&keys.switch_focus)));
    text.push_str(&format!("  {}: Open task / focus list\n", display(&keys.select)));
    text.push_str("  1-8: Inbox, Today, Upcoming, Anytime, Completed, Review, GitHub, Toggl\n");
    text.push_str(&format!("  {}: Toggle sidebar\n", display(&keys.toggle_sidebar)));
    text.push('\n');

    text.push_str("Tasks:\n");
    text.push_str(&format!("  {}: New task\n", display(&keys.new)));
    text.push_str(&format!("  {}: New project\n", display(&keys.new_project)));
    text.push_str(&format!("  {}: Edit task\n", display(&keys.edit)));
    text.push_str(&format!("  {}: Delete task\n", display(&keys.delete)));
    text.push_str(&format!("  {}: Complete / reopen\n", display(&keys.toggle_complete)));
    text.push_str(&format!(
        "  {} / {}: Reorder (Inbox, Anytime, projects, tags)\n",
        display(&keys.move_up),
        display(&keys.move_down)
    ));
    text.push_str(&format!("  {}: Search titles and notes\n", display(&keys.search)));
    text.push('\n');

    text.push_str("Task form:\n");
    text.push_str("  Tab / Shift+Tab: Next / previous field\n");
    text.push_str("  ← / →: Change priority or project\n");
    text.push_str(&format!("  {}: Save\n", display(&keys.save)));
    text.push_str("  Esc: Cancel\n");
    text.push('\n');

    text.push_str("Other:\n");
    text.push_str(&format!("  {}: Standup report (copied to clipboard)\n", display(&keys.standup)));
    text.push_str(&format!("  {}: Refresh GitHub / Toggl view\n", display(&keys.refresh)));
    text.push_str(&format!("  {}: Show/hide help\n", display(&keys.help)));
    text.push_str(&format!("  {}: Quit\n", display(&keys.quit)));

    text
}
