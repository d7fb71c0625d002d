use chrono::Datelike;
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "phitodo-dev",
            Profile::Prod => "phitodo",
        }
    }
}

/// Get the configuration directory path.
/// The dev profile uses "phitodo-dev" so it never touches real data.
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "phitodo", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path (database and logs)
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "phitodo", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf())
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<chrono::NaiveDate, chrono::ParseError> {
    chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
}

/// Today's local calendar date
pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

/// Human label for a stored date relative to `today`
pub fn format_relative_date(value: &str, today: chrono::NaiveDate) -> String {
    let Some(date) = value.get(..10).and_then(|d| parse_date(d).ok()) else {
        return value.to_string();
    };
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        n if n < -1 => format!("{} days ago", -n),
        n if n <= 7 => date.format("%A").to_string(),
        _ if date.year() == today.year() => date.format("%b %d").to_string(),
        _ => date.format("%b %d, %Y").to_string(),
    }
}

/// Parsed key binding information
#[derive(Debug, Clone)]
pub struct ParsedKeyBinding {
    pub key_code: crossterm::event::KeyCode,
    pub requires_ctrl: bool,
}

/// Check if a key event has the primary modifier (Ctrl, or Option/Alt on macOS)
pub fn has_primary_modifier(modifiers: crossterm::event::KeyModifiers) -> bool {
    #[cfg(target_os = "macos")]
    {
        modifiers.contains(crossterm::event::KeyModifiers::CONTROL)
            || modifiers.contains(crossterm::event::KeyModifiers::ALT)
    }

    #[cfg(not(target_os = "macos"))]
    {
        modifiers.contains(crossterm::event::KeyModifiers::CONTROL)
    }
}

/// Format a key binding string for display ("Ctrl+" shows as "Opt+" on macOS)
pub fn format_key_binding_for_display(key_binding: &str) -> String {
    #[cfg(target_os = "macos")]
    {
        key_binding.replace("Ctrl+", "Opt+")
    }

    #[cfg(not(target_os = "macos"))]
    {
        key_binding.to_string()
    }
}

/// Parse a key binding string from config into a ParsedKeyBinding.
/// Supports single keys ("q"), special keys ("Enter", "F1") and "Ctrl+" modifiers.
pub fn parse_key_binding(key_str: &str) -> Result<ParsedKeyBinding, String> {
    let key_str = key_str.trim();

    if let Some(key_part) = key_str.strip_prefix("Ctrl+") {
        return Ok(ParsedKeyBinding {
            key_code: parse_key_code(key_part)?,
            requires_ctrl: true,
        });
    }

    Ok(ParsedKeyBinding {
        key_code: parse_key_code(key_str)?,
        requires_ctrl: false,
    })
}

fn parse_key_code(key_str: &str) -> Result<crossterm::event::KeyCode, String> {
    use crossterm::event::KeyCode;

    match key_str {
        "Enter" => Ok(KeyCode::Enter),
        "Esc" | "Escape" => Ok(KeyCode::Esc),
        "Backspace" => Ok(KeyCode::Backspace),
        "Tab" => Ok(KeyCode::Tab),
        "Space" | " " => Ok(KeyCode::Char(' ')),
        "Left" => Ok(KeyCode::Left),
        "Right" => Ok(KeyCode::Right),
        "Up" => Ok(KeyCode::Up),
        "Down" => Ok(KeyCode::Down),
        "Home" => Ok(KeyCode::Home),
        "End" => Ok(KeyCode::End),
        "PageUp" => Ok(KeyCode::PageUp),
        "PageDown" => Ok(KeyCode::PageDown),
        "Delete" => Ok(KeyCode::Delete),
        _ => {
            if let Some(n) = key_str.strip_prefix('F')
                && let Ok(n) = n.parse::<u8>()
                && (1..=12).contains(&n)
            {
                return Ok(KeyCode::F(n));
            }
            let mut chars = key_str.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(KeyCode::Char(c)),
                _ => Err(format!("Unknown key binding: {}", key_str)),
            }
        }
    }
}
