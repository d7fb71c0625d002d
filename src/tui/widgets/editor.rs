use ratatui::layout::Rect;
use std::cmp;

/// Text buffer behind one form field. Single-line fields only ever use
/// `lines[0]`; the notes field may hold several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editor {
    pub lines: Vec<String>,
    pub cursor_line: usize,
    pub cursor_col: usize,
    pub scroll_offset: usize, // Vertical scroll (line offset)
    pub scroll_col: usize,    // Horizontal scroll (column offset)
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
            cursor_line: 0,
            cursor_col: 0,
            scroll_offset: 0,
            scroll_col: 0,
        }
    }

    /// Cursor lands at the end of the last line
    pub fn from_string(content: &str) -> Self {
        let lines: Vec<String> = if content.is_empty() {
            vec![String::new()]
        } else {
            content.lines().map(|s| s.to_string()).collect()
        };
        let cursor_line = lines.len().saturating_sub(1);
        let cursor_col = lines.last().map(|l| l.chars().count()).unwrap_or(0);
        Self {
            lines,
            cursor_line,
            cursor_col,
            scroll_offset: 0,
            scroll_col: 0,
        }
    }

    fn ensure_cursor_valid(&mut self) {
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        if self.cursor_line >= self.lines.len() {
            self.cursor_line = self.lines.len() - 1;
        }
        let len = self.current_line_len();
        self.cursor_col = cmp::min(self.cursor_col, len);
    }

    fn current_line_len(&self) -> usize {
        self.lines
            .get(self.cursor_line)
            .map(|l| l.chars().count())
            .unwrap_or(0)
    }

    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' {
            self.insert_newline();
            return;
        }
        self.ensure_cursor_valid();
        let col = self.cursor_col;
        if let Some(line) = self.lines.get_mut(self.cursor_line) {
            let mut chars: Vec<char> = line.chars().collect();
            chars.insert(col, ch);
            *line = chars.into_iter().collect();
            self.cursor_col += 1;
        }
    }

    /// Backspace: remove the character before the cursor, joining lines at column 0
    pub fn delete_char(&mut self) {
        self.ensure_cursor_valid();
        if self.cursor_col > 0 {
            let col = self.cursor_col;
            if let Some(line) = self.lines.get_mut(self.cursor_line) {
                let mut chars: Vec<char> = line.chars().collect();
                chars.remove(col - 1);
                *line = chars.into_iter().collect();
                self.cursor_col -= 1;
            }
        } else if self.cursor_line > 0 {
            let current_line = self.lines.remove(self.cursor_line);
            self.cursor_line -= 1;
            if let Some(prev_line) = self.lines.get_mut(self.cursor_line) {
                self.cursor_col = prev_line.chars().count();
                prev_line.push_str(&current_line);
            }
        }
    }

    pub fn insert_newline(&mut self) {
        self.ensure_cursor_valid();
        let col = self.cursor_col;
        if let Some(line) = self.lines.get_mut(self.cursor_line) {
            let mut chars: Vec<char> = line.chars().collect();
            let remainder: String = chars.split_off(col).into_iter().collect();
            *line = chars.into_iter().collect();
            self.lines.insert(self.cursor_line + 1, remainder);
            self.cursor_line += 1;
            self.cursor_col = 0;
        }
    }

    pub fn move_cursor_up(&mut self) {
        if self.cursor_line > 0 {
            self.cursor_line -= 1;
            self.ensure_cursor_valid();
        }
    }

    pub fn move_cursor_down(&mut self) {
        if self.cursor_line + 1 < self.lines.len() {
            self.cursor_line += 1;
            self.ensure_cursor_valid();
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.ensure_cursor_valid();
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        } else if self.cursor_line > 0 {
            self.cursor_line -= 1;
            self.cursor_col = self.current_line_len();
        }
    }

    pub fn move_cursor_right(&mut self) {
        self.ensure_cursor_valid();
        if self.cursor_col < self.current_line_len() {
            self.cursor_col += 1;
        } else if self.cursor_line + 1 < self.lines.len() {
            self.cursor_line += 1;
            self.cursor_col = 0;
        }
    }

    pub fn move_cursor_home(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.ensure_cursor_valid();
        self.cursor_col = self.current_line_len();
    }

    /// Keep the cursor inside a viewport of the given size
    pub fn update_scroll(&mut self, viewport_height: usize, viewport_width: usize) {
        if viewport_height > 0 {
            if self.cursor_line < self.scroll_offset {
                self.scroll_offset = self.cursor_line;
            } else if self.cursor_line >= self.scroll_offset + viewport_height {
                self.scroll_offset = self.cursor_line + 1 - viewport_height;
            }
        }
        if viewport_width > 0 {
            if self.cursor_col < self.scroll_col {
                self.scroll_col = self.cursor_col;
            } else if self.cursor_col >= self.scroll_col + viewport_width {
                self.scroll_col = self.cursor_col + 1 - viewport_width;
            }
        }
    }

    /// Lines in view, already cut to the horizontal scroll window
    pub fn visible_lines(&self, viewport_height: usize, viewport_width: usize) -> Vec<String> {
        self.lines
            .iter()
            .skip(self.scroll_offset)
            .take(viewport_height)
            .map(|l| l.chars().skip(self.scroll_col).take(viewport_width).collect())
            .collect()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Trimmed content, `None` when blank
    pub fn value(&self) -> Option<String> {
        let text = self.text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Screen position of the cursor inside a bordered `area`, if visible
    pub fn get_cursor_screen_pos(&self, area: Rect) -> Option<(u16, u16)> {
        let line_y = self.cursor_line.checked_sub(self.scroll_offset)?;
        let col_x = self.cursor_col.checked_sub(self.scroll_col)?;
        if line_y >= area.height.saturating_sub(2) as usize || col_x >= area.width.saturating_sub(2) as usize {
            return None;
        }
        Some((area.x + 1 + col_x as u16, area.y + 1 + line_y as u16))
    }
}
