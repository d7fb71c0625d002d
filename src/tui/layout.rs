use ratatui::layout::{Constraint, Direction, Layout as RatLayout, Rect};

pub struct Layout {
    pub inner_area: Rect, // Area inside the outer border
    pub header_area: Rect,
    pub sidebar_area: Rect,
    pub list_area: Rect,
    pub detail_area: Rect,
    pub search_area: Rect,
    pub status_area: Rect,
}

impl Layout {
    /// Minimum terminal dimensions required for the application
    /// Width: 38 columns (36 inner + 2 borders) allows sidebar (25) + list (11) when expanded,
    /// or just the list (36) when the sidebar is collapsed
    /// Height: 10 lines (2 outer borders + 1 header + 1 content + 3 search + 1 status + 2 buffer)
    pub const MIN_WIDTH: u16 = 38;
    pub const MIN_HEIGHT: u16 = 10;

    /// Main area width below which the detail pane is hidden
    pub const DETAIL_MIN_MAIN_WIDTH: u16 = 60;

    pub fn calculate(size: Rect, sidebar_width_percent: u16, sidebar_collapsed: bool) -> Self {
        let min_width_with_border = Self::MIN_WIDTH + 2;
        let min_height_with_border = Self::MIN_HEIGHT + 2;
        let width = size.width.max(min_width_with_border);
        let height = size.height.max(min_height_with_border);
        let size = Rect::new(size.x, size.y, width, height);

        let inner_area = Rect::new(
            size.x + 1,
            size.y + 1,
            size.width.saturating_sub(2),
            size.height.saturating_sub(2),
        );

        // Sidebar: min 25 chars, max 40%, and the list keeps at least 10
        let sidebar_width = if sidebar_collapsed {
            0
        } else {
            let requested_width = (inner_area.width * sidebar_width_percent) / 100;
            let min_width = 25;
            let max_width = (inner_area.width * 40) / 100;
            requested_width
                .max(min_width)
                .min(max_width)
                .min(inner_area.width.saturating_sub(10))
        };

        let vertical = RatLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Header
                Constraint::Min(1),    // Content (sidebar + list + detail)
                Constraint::Length(3), // Search box
                Constraint::Length(1), // Status
            ])
            .split(inner_area);

        let horizontal = RatLayout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(sidebar_width), Constraint::Min(1)])
            .split(vertical[1]);

        let main_area = horizontal[1];
        let (list_area, detail_area) = if main_area.width >= Self::DETAIL_MIN_MAIN_WIDTH {
            let split = RatLayout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                .split(main_area);
            (split[0], split[1])
        } else {
            (main_area, Rect::new(main_area.x + main_area.width, main_area.y, 0, main_area.height))
        };

        Self {
            inner_area,
            header_area: vertical[0],
            sidebar_area: horizontal[0],
            list_area,
            detail_area,
            search_area: vertical[2],
            status_area: vertical[3],
        }
    }
}
