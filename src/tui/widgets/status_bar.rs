use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Paragraph;

use crate::Config;
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};

const SEPARATOR: &str = " • ";
const ELLIPSIS: &str = "...";

pub fn render_status_bar(f: &mut Frame, area: Rect, message: Option<&String>, key_hints: &[String], config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let max_width = area.width as usize;

    let (content, style) = match message {
        Some(msg) => (
            truncate(msg, max_width),
            Style::default()
                .fg(get_contrast_text_color(highlight_bg))
                .bg(highlight_bg)
                .add_modifier(Modifier::BOLD),
        ),
        None => (fit_hints(key_hints, max_width), Style::default().fg(fg_color).bg(bg_color)),
    };

    f.render_widget(Paragraph::new(content).style(style), area);
}

fn truncate(text: &str, max_width: usize) -> String {
    if text.chars().count() <= max_width {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_width.saturating_sub(ELLIPSIS.len())).collect();
    kept + ELLIPSIS
}

/// As many hints as fit in `max_width`, joined by bullets. Ends in "..."
/// when some were dropped.
pub(crate) fn fit_hints(key_hints: &[String], max_width: usize) -> String {
    let mut text = String::new();
    for (i, hint) in key_hints.iter().enumerate() {
        let current_len = text.chars().count();
        let would_be_len = if i == 0 {
            hint.chars().count()
        } else {
            current_len + SEPARATOR.chars().count() + hint.chars().count()
        };

        if would_be_len > max_width {
            if i == 0 {
                return truncate(hint, max_width);
            }
            if current_len + ELLIPSIS.len() > max_width {
                text = text.chars().take(max_width.saturating_sub(ELLIPSIS.len())).collect();
            }
            text.push_str(ELLIPSIS);
            break;
        }

        if i > 0 {
            text.push_str(SEPARATOR);
        }
        text.push_str(hint);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hints() -> Vec<String> {
        vec!["q: Quit".to_string(), "n: New".to_string(), "?: Help".to_string()]
    }

    #[test]
    fn test_all_hints_fit() {
        assert_eq!(fit_hints(&hints(), 80), "q: Quit • n: New • ?: Help");
    }

    #[test]
    fn test_hints_cut_with_ellipsis() {
        assert_eq!(fit_hints(&hints(), 20), "q: Quit • n: New...");
        assert_eq!(fit_hints(&hints(), 5), "q:...");
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate("Task deleted", 40), "Task deleted");
        assert_eq!(truncate("Task deleted", 8), "Task ...");
    }
}
