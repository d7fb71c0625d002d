use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::Path;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::database::{Database, DatabaseError};
use crate::filters::get_completed_tasks;
use crate::integrations::Transport;
use crate::integrations::github::GitHubClient;
use crate::integrations::http::HttpTransport;
use crate::integrations::toggl::TogglClient;
use crate::models::{Task, TaskPriority};
use crate::ordering::next_order_index;
use crate::service::{Clock, NewProject, NewTask, ServiceError, TaskService};
use crate::standup;
use crate::state::{AppState, PrefixError, View};
use crate::utils::format_relative_date;

#[derive(Parser)]
#[command(name = "phitodo")]
#[command(about = "A personal task manager for the terminal")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch interactive TUI (default if no subcommand)
    Tui,
    /// Add a task
    Add {
        /// Task title
        title: String,
        #[arg(long)]
        notes: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// none, low, medium or high
        #[arg(long)]
        priority: Option<TaskPriority>,
        /// Project name
        #[arg(long)]
        project: Option<String>,
        /// Tag name (repeatable; unknown tags are created)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List tasks in a view (inbox, today, upcoming, anytime, completed, review)
    List {
        #[arg(default_value = "inbox")]
        view: String,
        /// Show a project's tasks instead
        #[arg(long)]
        project: Option<String>,
        /// Show a tag's tasks instead
        #[arg(long)]
        tag: Option<String>,
        /// Search titles and notes instead
        #[arg(long)]
        query: Option<String>,
    },
    /// Mark a task completed (full id or unique prefix)
    Complete { id: String },
    /// Delete a task (full id or unique prefix)
    Delete { id: String },
    /// List projects
    Projects,
    /// Add a project
    AddProject { name: String },
    /// Print a standup report
    Standup {
        /// Days of completed work to include
        #[arg(long, default_value_t = 1)]
        days: i64,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current configuration (tokens masked)
    Show,
    /// Store the GitHub personal access token
    SetGithubToken { token: String },
    /// Store the Toggl API token
    SetTogglToken { token: String },
    /// Only show GitHub items from this repository (owner/name)
    AllowRepo { repo: String },
    /// Hide a Toggl project from time views
    HideTogglProject { project_id: i64 },
    /// Switch the colour theme
    SetTheme { name: String },
    /// Check the stored tokens against GitHub and Toggl
    CheckTokens,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("{0}")]
    ValidationError(#[from] ServiceError),
    #[error("{0}")]
    TaskLookup(#[from] PrefixError),
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Unknown view: {0}")]
    UnknownView(String),
    #[error("Unknown {0}: {1}")]
    UnknownReference(&'static str, String),
}

/// Load, mutate and save around one command
pub struct CliContext<C: Clock> {
    pub db: Database,
    pub state: AppState,
    pub service: TaskService<C>,
    pub today: NaiveDate,
}

impl<C: Clock> CliContext<C> {
    pub fn open(db: Database, service: TaskService<C>, today: NaiveDate) -> Result<Self, CliError> {
        let state = AppState::from_snapshot(db.load_snapshot()?);
        Ok(Self {
            db,
            state,
            service,
            today,
        })
    }

    fn save(&mut self) -> Result<(), CliError> {
        self.db.save_snapshot(&self.state.to_snapshot())?;
        Ok(())
    }
}

pub struct AddArgs {
    pub title: String,
    pub notes: Option<String>,
    pub due: Option<String>,
    pub start: Option<String>,
    pub priority: Option<TaskPriority>,
    pub project: Option<String>,
    pub tags: Vec<String>,
}

/// Handle the add command
pub fn handle_add<C: Clock>(ctx: &mut CliContext<C>, args: AddArgs) -> Result<String, CliError> {
    let project_id = match args.project {
        Some(ref name) => Some(
            ctx.state
                .project_by_name(name)
                .map(|p| p.id.clone())
                .ok_or_else(|| CliError::UnknownReference("project", name.clone()))?,
        ),
        None => None,
    };

    let mut tag_ids = Vec::new();
    for name in args.tags.iter().filter(|n| !n.trim().is_empty()) {
        let id = match ctx.state.tag_by_name(name) {
            Some(tag) => tag.id.clone(),
            None => {
                let tag = ctx.service.create_tag(name, None)?;
                let id = tag.id.clone();
                ctx.state.upsert_tag(tag);
                id
            }
        };
        if !tag_ids.contains(&id) {
            tag_ids.push(id);
        }
    }

    let order_index = next_order_index(ctx.state.tasks().iter().map(|t| t.order_index));
    let task = ctx.service.create_task(NewTask {
        title: args.title,
        notes: args.notes,
        due_date: args.due,
        start_date: args.start,
        priority: args.priority.unwrap_or_default(),
        project_id,
        tags: tag_ids,
        order_index,
        ..Default::default()
    })?;
    let id = task.id.clone();
    ctx.state.upsert_task(task);
    ctx.save()?;
    Ok(format!("Task created successfully (ID: {})", id))
}

/// Handle the list command
pub fn handle_list<C: Clock>(
    ctx: &CliContext<C>,
    view: &str,
    project: Option<&str>,
    tag: Option<&str>,
    query: Option<&str>,
) -> Result<String, CliError> {
    let view = if let Some(name) = project {
        let p = ctx
            .state
            .project_by_name(name)
            .ok_or_else(|| CliError::UnknownReference("project", name.to_string()))?;
        View::Project(p.id.clone())
    } else if let Some(name) = tag {
        let t = ctx
            .state
            .tag_by_name(name)
            .ok_or_else(|| CliError::UnknownReference("tag", name.to_string()))?;
        View::Tag(t.id.clone())
    } else {
        View::from_name(view)
            .filter(|v| !v.is_integration())
            .ok_or_else(|| CliError::UnknownView(view.to_string()))?
    };

    let mut state = ctx.state.clone();
    state.set_view(view);
    state.search_query = query.map(str::to_string);

    let tasks = state.current_tasks(ctx.today);
    let mut lines = vec![format!("{} ({})", state.view_title(), tasks.len())];
    lines.extend(tasks.iter().map(|t| format_task_line(&state, t, ctx.today)));
    Ok(lines.join("\n"))
}

/// `abcd1234 [x] Title  (due Today) #tag @project`
pub fn format_task_line(state: &AppState, task: &Task, today: NaiveDate) -> String {
    let check = if task.status.is_open() { "[ ]" } else { "[x]" };
    let short_id: String = task.id.chars().take(8).collect();
    let mut line = format!("{} {} {}", short_id, check, task.title);
    if task.priority != TaskPriority::None {
        line.push_str(&format!(" !{}", task.priority));
    }
    if let Some(ref due) = task.due_date {
        line.push_str(&format!("  (due {})", format_relative_date(due, today)));
    }
    for name in state.tag_names(task) {
        line.push_str(&format!(" #{}", name));
    }
    if let Some(project) = task.project_id.as_deref().and_then(|id| state.project(id)) {
        line.push_str(&format!(" @{}", project.name));
    }
    line
}

/// Handle the complete command
pub fn handle_complete<C: Clock>(ctx: &mut CliContext<C>, id: &str) -> Result<String, CliError> {
    let task = ctx.state.find_task_by_prefix(id)?;
    let updated = ctx.service.complete_task(task);
    let message = format!("Completed: {}", updated.title);
    ctx.state.upsert_task(updated);
    ctx.save()?;
    Ok(message)
}

/// Handle the delete command
pub fn handle_delete<C: Clock>(ctx: &mut CliContext<C>, id: &str) -> Result<String, CliError> {
    let task = ctx.state.find_task_by_prefix(id)?;
    let updated = ctx.service.delete_task(task);
    let message = format!("Deleted: {}", updated.title);
    ctx.state.upsert_task(updated);
    ctx.save()?;
    Ok(message)
}

/// Handle the projects command
pub fn handle_projects<C: Clock>(ctx: &CliContext<C>) -> String {
    let projects = ctx.state.projects();
    if projects.is_empty() {
        return "No projects".to_string();
    }
    projects
        .iter()
        .map(|p| {
            let count = ctx.state.count(&View::Project(p.id.clone()), ctx.today);
            format!("{} ({} open)", p.name, count)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Handle the add-project command
pub fn handle_add_project<C: Clock>(ctx: &mut CliContext<C>, name: &str) -> Result<String, CliError> {
    let order_index = next_order_index(ctx.state.projects().iter().map(|p| p.order_index));
    let project = ctx.service.create_project(NewProject {
        name: name.trim().to_string(),
        order_index,
        ..Default::default()
    })?;
    let message = format!("Project created successfully (ID: {})", project.id);
    ctx.state.upsert_project(project);
    ctx.save()?;
    Ok(message)
}

/// Handle the standup command
pub fn handle_standup<C: Clock>(ctx: &CliContext<C>, days: i64) -> String {
    let completed = get_completed_tasks(ctx.state.tasks(), ctx.state.completed_limit);
    let today_tasks = ctx.state.view_tasks(&View::Today, ctx.today);
    standup::generate_report(&completed, &today_tasks, None, days, ctx.today)
}

fn mask(token: Option<&str>) -> String {
    match token {
        Some(t) if t.chars().count() > 4 => format!("{}…", t.chars().take(4).collect::<String>()),
        Some(_) => "set".to_string(),
        None => "not set".to_string(),
    }
}

fn token_status(configured: bool, valid: impl FnOnce() -> bool) -> &'static str {
    if !configured {
        "not set"
    } else if valid() {
        "valid"
    } else {
        "rejected or unreachable"
    }
}

/// One line per service. Unset tokens are not checked.
pub fn token_report<G: Transport, T: Transport>(github: Option<G>, toggl: Option<T>) -> String {
    let github_ok = github.is_some();
    let toggl_ok = toggl.is_some();
    format!(
        "GitHub token: {}\nToggl token: {}",
        token_status(github_ok, || {
            github.is_some_and(|t| GitHubClient::new(t, Vec::new()).validate_token())
        }),
        token_status(toggl_ok, || toggl.is_some_and(|t| TogglClient::new(t).validate_token())),
    )
}

/// Handle the config subcommands. Changes are written to `config_path`.
pub fn handle_config(
    config: &mut Config,
    config_path: &Path,
    action: ConfigAction,
) -> Result<String, CliError> {
    let message = match action {
        ConfigAction::Show => {
            return Ok(format!(
                "config file: {}\ndatabase: {}\ntheme: {} (available: {})\nlog level: {}\ngithub token: {}\n\
                 allowed repos: {}\ntoggl token: {}\nhidden toggl projects: {:?}",
                config_path.display(),
                config.database_path,
                config.current_theme,
                config.get_available_themes().join(", "),
                config.log_level,
                mask(config.github_token()),
                if config.github_allowed_repos.is_empty() {
                    "all".to_string()
                } else {
                    config.github_allowed_repos.join(", ")
                },
                mask(config.toggl_token()),
                config.toggl_hidden_project_ids,
            ));
        }
        ConfigAction::SetGithubToken { token } => {
            config.github_token = Some(token.trim().to_string());
            "GitHub token saved".to_string()
        }
        ConfigAction::SetTogglToken { token } => {
            config.toggl_token = Some(token.trim().to_string());
            "Toggl token saved".to_string()
        }
        ConfigAction::AllowRepo { repo } => {
            if config.allow_repo(&repo) {
                format!("Allowed {}", repo.trim())
            } else {
                format!("{} is already allowed", repo.trim())
            }
        }
        ConfigAction::HideTogglProject { project_id } => {
            if config.hide_toggl_project(project_id) {
                format!("Hid Toggl project {}", project_id)
            } else {
                format!("Toggl project {} is already hidden", project_id)
            }
        }
        ConfigAction::SetTheme { name } => {
            config.set_theme(&name)?;
            format!("Theme set to {}", name)
        }
        ConfigAction::CheckTokens => {
            return Ok(token_report(
                config.github_token().map(HttpTransport::github),
                config.toggl_token().map(HttpTransport::toggl),
            ));
        }
    };
    config.save_to(config_path)?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::integrations::fake::FakeTransport;
    use crate::service::SystemClock;
    use serde_json::json;

    fn context(dir: &tempfile::TempDir) -> CliContext<SystemClock> {
        let db = Database::new(&dir.path().join("phitodo.db")).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        CliContext::open(db, TaskService::default(), today).unwrap()
    }

    fn add_args(title: &str) -> AddArgs {
        AddArgs {
            title: title.to_string(),
            notes: None,
            due: None,
            start: None,
            priority: None,
            project: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_add_persists_and_creates_tags() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir);
        handle_add_project(&mut ctx, "Home").unwrap();
        handle_add(
            &mut ctx,
            AddArgs {
                project: Some("home".to_string()),
                tags: vec!["errand".to_string(), "errand".to_string()],
                due: Some("2024-06-15".to_string()),
                ..add_args("Buy milk")
            },
        )
        .unwrap();

        let reopened = context(&dir);
        let task = &reopened.state.tasks()[0];
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.tags.len(), 1);
        assert_eq!(reopened.state.tag_names(task), vec!["errand"]);
        assert!(task.project_id.is_some());

        let listing = handle_list(&reopened, "today", None, None, None).unwrap();
        assert!(listing.starts_with("Today (1)"));
        assert!(listing.contains("Buy milk  (due Today) #errand @Home"));
    }

    #[test]
    fn test_add_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir);
        assert!(matches!(
            handle_add(&mut ctx, add_args("  ")),
            Err(CliError::ValidationError(ServiceError::EmptyTitle))
        ));
        assert!(matches!(
            handle_add(&mut ctx, AddArgs { project: Some("nope".to_string()), ..add_args("x") }),
            Err(CliError::UnknownReference("project", _))
        ));
        assert!(ctx.state.tasks().is_empty());
    }

    #[test]
    fn test_complete_and_delete_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir);
        handle_add(&mut ctx, add_args("Finish")).unwrap();
        let id = ctx.state.tasks()[0].id.clone();

        handle_complete(&mut ctx, &id[..8]).unwrap();
        assert_eq!(ctx.state.tasks()[0].status, TaskStatus::Completed);
        let report = handle_standup(&ctx, 1);
        assert!(report.contains("## Yesterday"));

        handle_delete(&mut ctx, &id).unwrap();
        let reopened = context(&dir);
        assert!(reopened.state.task(&id).is_none());
        assert!(reopened.state.tasks()[0].deleted);
        assert!(matches!(
            handle_complete(&mut ctx, &id),
            Err(CliError::TaskLookup(PrefixError::NotFound(_)))
        ));
    }

    #[test]
    fn test_list_unknown_view() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        assert!(matches!(
            handle_list(&ctx, "github", None, None, None),
            Err(CliError::UnknownView(_))
        ));
        assert_eq!(handle_projects(&ctx), "No projects");
    }

    #[test]
    fn test_config_actions_are_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();

        handle_config(&mut config, &path, ConfigAction::SetGithubToken { token: " ghp_1234 ".to_string() })
            .unwrap();
        handle_config(&mut config, &path, ConfigAction::AllowRepo { repo: "me/app".to_string() }).unwrap();
        assert!(handle_config(&mut config, &path, ConfigAction::SetTheme { name: "nope".to_string() }).is_err());

        let shown = handle_config(&mut config, &path, ConfigAction::Show).unwrap();
        assert!(shown.contains("github token: ghp_…"));
        assert!(shown.contains("allowed repos: me/app"));

        let reloaded = Config::load_from(&path, crate::utils::Profile::Dev).unwrap();
        assert_eq!(reloaded.github_token(), Some("ghp_1234"));
    }

    #[test]
    fn test_token_report() {
        let github = FakeTransport::default().with("/user", json!({"login": "me"}));
        let toggl = FakeTransport::default().failing("/me", 403);
        assert_eq!(
            token_report(Some(&github), Some(&toggl)),
            "GitHub token: valid\nToggl token: rejected or unreachable"
        );
        assert_eq!(
            token_report(None::<&FakeTransport>, None::<&FakeTransport>),
            "GitHub token: not set\nToggl token: not set"
        );
        assert_eq!(toggl.request_count("/me"), 1);
    }
}
