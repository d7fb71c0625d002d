use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

const DATABASE_FILE: &str = "phitodo.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_sidebar_width")]
    pub sidebar_width_percent: u16,
    /// Empty means the profile's data directory
    #[serde(default)]
    pub database_path: String,
    #[serde(default)]
    pub key_bindings: KeyBindings,
    #[serde(default = "default_current_theme")]
    pub current_theme: String,
    #[serde(default)]
    pub themes: HashMap<String, Theme>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub github_token: Option<String>,
    #[serde(default)]
    pub github_allowed_repos: Vec<String>,
    #[serde(default)]
    pub toggl_token: Option<String>,
    #[serde(default)]
    pub toggl_hidden_project_ids: Vec<i64>,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_quit")]
    pub quit: String,
    #[serde(default = "default_toggle_sidebar")]
    pub toggle_sidebar: String,
    #[serde(default = "default_switch_focus")]
    pub switch_focus: String,
    #[serde(default = "default_new")]
    pub new: String,
    #[serde(default = "default_new_project")]
    pub new_project: String,
    #[serde(default = "default_edit")]
    pub edit: String,
    #[serde(default = "default_save")]
    pub save: String,
    #[serde(default = "default_delete")]
    pub delete: String,
    #[serde(default = "default_search")]
    pub search: String,
    #[serde(default = "default_select")]
    pub select: String,
    #[serde(default = "default_list_up")]
    pub list_up: String,
    #[serde(default = "default_list_down")]
    pub list_down: String,
    #[serde(default = "default_move_up")]
    pub move_up: String,
    #[serde(default = "default_move_down")]
    pub move_down: String,
    #[serde(default = "default_toggle_complete")]
    pub toggle_complete: String,
    #[serde(default = "default_standup")]
    pub standup: String,
    #[serde(default = "default_refresh")]
    pub refresh: String,
    #[serde(default = "default_help")]
    pub help: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_fg")]
    pub fg: String,
    #[serde(default = "default_bg")]
    pub bg: String,
    #[serde(default = "default_highlight_bg")]
    pub highlight_bg: String,
    #[serde(default = "default_highlight_fg")]
    pub highlight_fg: String,
    #[serde(default = "default_accent")]
    pub accent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sidebar_width_percent: default_sidebar_width(),
            database_path: String::new(),
            key_bindings: KeyBindings::default(),
            current_theme: default_current_theme(),
            themes: HashMap::new(),
            log_level: default_log_level(),
            github_token: None,
            github_allowed_repos: Vec::new(),
            toggl_token: None,
            toggl_hidden_project_ids: Vec::new(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: default_quit(),
            toggle_sidebar: default_toggle_sidebar(),
            switch_focus: default_switch_focus(),
            new: default_new(),
            new_project: default_new_project(),
            edit: default_edit(),
            save: default_save(),
            delete: default_delete(),
            search: default_search(),
            select: default_select(),
            list_up: default_list_up(),
            list_down: default_list_down(),
            move_up: default_move_up(),
            move_down: default_move_down(),
            toggle_complete: default_toggle_complete(),
            standup: default_standup(),
            refresh: default_refresh(),
            help: default_help(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: default_fg(),
            bg: default_bg(),
            highlight_bg: default_highlight_bg(),
            highlight_fg: default_highlight_fg(),
            accent: default_accent(),
        }
    }
}

impl Theme {
    /// Get preset themes that are always available
    pub fn get_preset_themes() -> HashMap<String, Theme> {
        let preset = |fg: &str, bg: &str, highlight_bg: &str, highlight_fg: &str, accent: &str| Theme {
            fg: fg.to_string(),
            bg: bg.to_string(),
            highlight_bg: highlight_bg.to_string(),
            highlight_fg: highlight_fg.to_string(),
            accent: accent.to_string(),
        };

        let mut themes = HashMap::new();
        themes.insert("default".to_string(), Theme::default());
        themes.insert("dark".to_string(), preset("white", "black", "cyan", "black", "magenta"));
        themes.insert("light".to_string(), preset("black", "white", "blue", "white", "red"));
        themes.insert("green".to_string(), preset("green", "black", "yellow", "black", "cyan"));
        themes.insert(
            "monochrome".to_string(),
            preset("white", "black", "white", "black", "gray"),
        );
        themes
    }
}

// Default value functions
fn default_sidebar_width() -> u16 {
    25
}

fn default_current_theme() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_quit() -> String {
    "q".to_string()
}

fn default_toggle_sidebar() -> String {
    "b".to_string()
}

fn default_switch_focus() -> String {
    "Tab".to_string()
}

fn default_new() -> String {
    "n".to_string()
}

fn default_new_project() -> String {
    "N".to_string()
}

fn default_edit() -> String {
    "e".to_string()
}

fn default_save() -> String {
    "Ctrl+s".to_string()
}

fn default_delete() -> String {
    "d".to_string()
}

fn default_search() -> String {
    "/".to_string()
}

fn default_select() -> String {
    "Enter".to_string()
}

fn default_list_up() -> String {
    "k".to_string()
}

fn default_list_down() -> String {
    "j".to_string()
}

fn default_move_up() -> String {
    "Ctrl+Up".to_string()
}

fn default_move_down() -> String {
    "Ctrl+Down".to_string()
}

fn default_toggle_complete() -> String {
    "Space".to_string()
}

fn default_standup() -> String {
    "s".to_string()
}

fn default_refresh() -> String {
    "r".to_string()
}

fn default_help() -> String {
    "?".to_string()
}

fn default_fg() -> String {
    "white".to_string()
}

fn default_bg() -> String {
    "black".to_string()
}

fn default_highlight_bg() -> String {
    "blue".to_string()
}

fn default_highlight_fg() -> String {
    "white".to_string()
}

fn default_accent() -> String {
    "yellow".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Theme not found: {0}")]
    ThemeNotFound(String),
}

impl Config {
    /// Load configuration from an explicit file, creating it with defaults
    /// when missing. An empty `database_path` resolves to the profile default.
    pub fn load_from(config_path: &Path, profile: utils::Profile) -> Result<Self, ConfigError> {
        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            toml::from_str::<Config>(&contents)?
        } else {
            let mut config = Config::default();
            config.save_to(config_path)?;
            info!(path = %config_path.display(), "created default config");
            config
        };

        if config.database_path.trim().is_empty() {
            config.database_path = Self::default_database_path_for_profile(profile);
        }
        if config.config_version != Some(CURRENT_CONFIG_VERSION) {
            warn!(version = ?config.config_version, "config version differs from current");
        }
        Ok(config)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile).ok_or_else(|| {
            ConfigError::ConfigDirError("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join(DATABASE_FILE).to_string_lossy().to_string()
        } else {
            #[cfg(target_os = "macos")]
            {
                match profile {
                    utils::Profile::Dev => "~/Library/Application Support/phitodo-dev/phitodo.db".to_string(),
                    utils::Profile::Prod => "~/Library/Application Support/phitodo/phitodo.db".to_string(),
                }
            }
            #[cfg(not(target_os = "macos"))]
            {
                match profile {
                    utils::Profile::Dev => "~/.local/share/phitodo-dev/phitodo.db".to_string(),
                    utils::Profile::Prod => "~/.local/share/phitodo/phitodo.db".to_string(),
                }
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    /// Get the currently active theme.
    /// An empty `highlight_fg` is derived from `highlight_bg`.
    pub fn get_active_theme(&self) -> Theme {
        use crate::tui::widgets::color::{format_color_for_display, get_contrast_text_color, parse_color};

        let mut theme = self
            .themes
            .get(&self.current_theme)
            .cloned()
            .or_else(|| Theme::get_preset_themes().remove(&self.current_theme))
            .unwrap_or_default();

        if theme.highlight_fg.is_empty() {
            let calculated_fg = get_contrast_text_color(parse_color(&theme.highlight_bg));
            theme.highlight_fg = format_color_for_display(&calculated_fg);
        }

        theme
    }

    /// Set the active theme by name
    pub fn set_theme(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.themes.contains_key(name) && !Theme::get_preset_themes().contains_key(name) {
            return Err(ConfigError::ThemeNotFound(name.to_string()));
        }
        self.current_theme = name.to_string();
        Ok(())
    }

    /// Get all available theme names (presets + user-defined), sorted
    pub fn get_available_themes(&self) -> Vec<String> {
        let mut themes: Vec<String> = Theme::get_preset_themes().into_keys().collect();
        for theme_name in self.themes.keys() {
            if !themes.contains(theme_name) {
                themes.push(theme_name.clone());
            }
        }
        themes.sort();
        themes
    }

    /// Token with surrounding whitespace removed; blank counts as unset
    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn toggl_token(&self) -> Option<&str> {
        self.toggl_token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Add a repository to the GitHub allow-list. Returns false if present.
    pub fn allow_repo(&mut self, full_name: &str) -> bool {
        let full_name = full_name.trim().to_string();
        if self.github_allowed_repos.contains(&full_name) {
            return false;
        }
        self.github_allowed_repos.push(full_name);
        true
    }

    /// Hide a Toggl project from time views. Returns false if already hidden.
    pub fn hide_toggl_project(&mut self, project_id: i64) -> bool {
        if self.toggl_hidden_project_ids.contains(&project_id) {
            return false;
        }
        self.toggl_hidden_project_ids.push(project_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path, utils::Profile::Dev).unwrap();
        assert!(path.exists());
        assert_eq!(config.key_bindings, KeyBindings::default());
        assert!(config.database_path.ends_with(DATABASE_FILE));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "database_path = \"/tmp/custom.db\"\n\
             github_allowed_repos = [\"me/app\"]\n\
             [key_bindings]\nquit = \"x\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path, utils::Profile::Prod).unwrap();
        assert_eq!(config.database_path, "/tmp/custom.db");
        assert_eq!(config.github_allowed_repos, vec!["me/app".to_string()]);
        assert_eq!(config.key_bindings.quit, "x");
        assert_eq!(config.key_bindings.new, "n");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.github_token(), None);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config {
            database_path: "/tmp/x.db".to_string(),
            github_token: Some(" ghp_abc ".to_string()),
            toggl_token: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.allow_repo("me/app"));
        assert!(!config.allow_repo("me/app"));
        assert!(config.hide_toggl_project(42));
        assert!(!config.hide_toggl_project(42));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path, utils::Profile::Prod).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.github_token(), Some("ghp_abc"));
        assert_eq!(loaded.toggl_token(), None);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "sidebar_width_percent = \"wide\"").unwrap();
        assert!(matches!(
            Config::load_from(&path, utils::Profile::Prod),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_themes() {
        let mut config = Config::default();
        assert!(config.set_theme("dark").is_ok());
        assert_eq!(config.get_active_theme().highlight_bg, "cyan");
        assert!(matches!(config.set_theme("neon"), Err(ConfigError::ThemeNotFound(_))));
        assert!(config.get_available_themes().contains(&"monochrome".to_string()));
    }
}
