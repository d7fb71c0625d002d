use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};

use crate::integrations::github::IssueItem;
use crate::tui::app::App;
use crate::tui::widgets::color::parse_color;

/// `owner/repo#12 Title (by author)`
pub(crate) fn issue_line(item: &IssueItem) -> String {
    match item.user_login {
        Some(ref login) => format!("{} {} (by {})", item.reference(), item.title, login),
        None => format!("{} {}", item.reference(), item.title),
    }
}

fn render_column(f: &mut Frame, area: Rect, title: &str, items: &[IssueItem], fg: Style, accent: Style) {
    let title = Line::from(Span::styled(format!("{} ({})", title, items.len()), accent));
    let rows: Vec<ListItem> = if items.is_empty() {
        vec![ListItem::new("Nothing here")]
    } else {
        items
            .iter()
            .map(|item| ListItem::new(issue_line(item)))
            .collect()
    };
    let list = List::new(rows)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(fg);
    f.render_widget(list, area);
}

/// Status message, or the three issue columns once data is loaded
pub fn render_github_view(f: &mut Frame, area: Rect, app: &App) {
    let active_theme = app.config.get_active_theme();
    let fg = Style::default().fg(parse_color(&active_theme.fg));
    let accent = Style::default().fg(parse_color(&active_theme.accent));
    let remote = &app.state.integrations.github;

    let notice = if remote.loading {
        Some("Loading...".to_string())
    } else {
        remote.error.as_ref().map(|e| format!("GitHub: {}", e))
    };
    if let Some(text) = notice {
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("GitHub"))
            .style(fg)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);
    let data = &remote.data;
    render_column(f, columns[0], "Assigned Issues", &data.assigned_issues, fg, accent);
    render_column(f, columns[1], "Review Requested", &data.review_requested, fg, accent);
    render_column(f, columns[2], "My Pull Requests", &data.my_prs, fg, accent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_line() {
        let mut item = IssueItem {
            id: 1,
            number: 42,
            title: "Crash on start".to_string(),
            html_url: "https://github.com/acme/app/issues/42".to_string(),
            state: "open".to_string(),
            repository_full_name: Some("acme/app".to_string()),
            repository_url: None,
            user_login: Some("octo".to_string()),
            is_pull_request: false,
        };
        assert_eq!(issue_line(&item), "acme/app#42 Crash on start (by octo)");
        item.user_login = None;
        item.repository_full_name = None;
        assert_eq!(issue_line(&item), "#42 Crash on start");
    }
}
