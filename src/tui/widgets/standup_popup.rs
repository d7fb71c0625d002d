use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::Config;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::help::popup_area;

/// The markdown report with headings emphasised instead of prefixed
pub fn render_standup(f: &mut Frame, area: Rect, report: &str, config: &Config) {
    let active_theme = config.get_active_theme();
    let style = Style::default()
        .fg(parse_color(&active_theme.fg))
        .bg(parse_color(&active_theme.bg));
    let heading = Style::default()
        .fg(parse_color(&active_theme.accent))
        .add_modifier(Modifier::BOLD);

    let lines: Vec<Line> = report
        .lines()
        .map(|l| match l.strip_prefix("## ") {
            Some(title) => Line::styled(title.to_string(), heading),
            None => Line::from(l.to_string()),
        })
        .collect();

    let popup = popup_area(area, 60, 70);
    f.render_widget(Clear, popup);
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Standup")
                .title_alignment(Alignment::Center)
                .style(style),
        )
        .style(style)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, popup);
}
