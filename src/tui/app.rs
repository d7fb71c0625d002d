use chrono::{Duration, NaiveDate};
use ratatui::widgets::ListState;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::filters::get_completed_tasks;
use crate::integrations::fetch::{FetchResult, Fetcher, SharedTransport};
use crate::integrations::http::HttpTransport;
use crate::integrations::{Disconnected, IntegrationError};
use crate::models::{Tag, Task, TaskPriority};
use crate::ordering::{between, needs_rebalance, next_order_index, rebalance};
use crate::service::{NewProject, NewTask, TaskPatch, TaskService};
use crate::standup;
use crate::state::{AppState, View};
use crate::tui::error::TuiError;
use crate::tui::widgets::editor::Editor;
use crate::utils;
use crate::writer::{SaveOutcome, SnapshotWriter};
use crate::{Config, Database};

const STATUS_MESSAGE_TIMEOUT_SECS: u64 = 3;

/// Days of time entries fetched for the Toggl view, today included
pub const TOGGL_DAYS_BACK: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarState {
    Expanded,
    Collapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Search,
    Help,
    TaskForm,
    ProjectForm,
    ConfirmDelete,
    Standup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Title,
    Notes,
    DueDate,
    StartDate,
    Priority,
    Project,
    Tags,
}

impl TaskField {
    pub const ALL: [TaskField; 7] = [
        TaskField::Title,
        TaskField::Notes,
        TaskField::DueDate,
        TaskField::StartDate,
        TaskField::Priority,
        TaskField::Project,
        TaskField::Tags,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TaskField::Title => "Title",
            TaskField::Notes => "Notes",
            TaskField::DueDate => "Due Date (YYYY-MM-DD)",
            TaskField::StartDate => "Start Date (YYYY-MM-DD)",
            TaskField::Priority => "Priority",
            TaskField::Project => "Project",
            TaskField::Tags => "Tags (comma separated)",
        }
    }

    /// Fields changed with Left/Right instead of typed
    pub fn is_choice(&self) -> bool {
        matches!(self, TaskField::Priority | TaskField::Project)
    }

    fn position(&self) -> usize {
        TaskField::ALL.iter().position(|f| f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        TaskField::ALL[(self.position() + 1) % TaskField::ALL.len()]
    }

    fn prev(self) -> Self {
        let len = TaskField::ALL.len();
        TaskField::ALL[(self.position() + len - 1) % len]
    }
}

#[derive(Debug, Clone)]
pub struct TaskForm {
    pub current_field: TaskField,
    pub title: Editor,
    pub notes: Editor,
    pub due_date: Editor,
    pub start_date: Editor,
    pub tags: Editor,
    pub priority: TaskPriority,
    pub project_id: Option<String>,
    pub editing_task_id: Option<String>, // None for new tasks
}

impl TaskForm {
    pub fn new() -> Self {
        Self {
            current_field: TaskField::Title,
            title: Editor::new(),
            notes: Editor::new(),
            due_date: Editor::new(),
            start_date: Editor::new(),
            tags: Editor::new(),
            priority: TaskPriority::None,
            project_id: None,
            editing_task_id: None,
        }
    }

    /// Form pre-filled from an existing task
    pub fn for_task(task: &Task, tag_names: &[&str]) -> Self {
        Self {
            current_field: TaskField::Title,
            title: Editor::from_string(&task.title),
            notes: Editor::from_string(task.notes.as_deref().unwrap_or("")),
            due_date: Editor::from_string(task.due_date.as_deref().unwrap_or("")),
            start_date: Editor::from_string(task.start_date.as_deref().unwrap_or("")),
            tags: Editor::from_string(&tag_names.join(", ")),
            priority: task.priority,
            project_id: task.project_id.clone(),
            editing_task_id: Some(task.id.clone()),
        }
    }

    pub fn current_editor_mut(&mut self) -> Option<&mut Editor> {
        match self.current_field {
            TaskField::Title => Some(&mut self.title),
            TaskField::Notes => Some(&mut self.notes),
            TaskField::DueDate => Some(&mut self.due_date),
            TaskField::StartDate => Some(&mut self.start_date),
            TaskField::Tags => Some(&mut self.tags),
            TaskField::Priority | TaskField::Project => None,
        }
    }

    /// Tag names typed in the tags field, trimmed and de-duplicated
    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.tags.text().split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        }
        names
    }
}

impl Default for TaskForm {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusState {
    pub message: Option<String>,
    pub message_time: Option<Instant>,
}

pub struct App {
    pub config: Config,
    pub state: AppState,
    service: TaskService,
    writer: Option<SnapshotWriter>,
    fetcher: Fetcher,
    pub today: NaiveDate,

    pub focus: Focus,
    pub sidebar_state: SidebarState,
    pub mode: Mode,
    pub sidebar_index: usize,
    pub sidebar_list_state: ListState,
    pub selected_index: usize,
    pub list_state: ListState,

    pub task_form: Option<TaskForm>,
    pub project_name: Editor,
    pub pending_delete: Option<String>,
    pub delete_selection: usize, // 0 = Delete, 1 = Cancel
    pub standup_report: Option<String>,
    pub status: StatusState,
}

impl App {
    /// Load the persisted state and hand the database to the save thread
    pub fn new(config: Config, database: Database) -> Result<Self, TuiError> {
        let snapshot = database.load_snapshot()?;
        info!(
            tasks = snapshot.tasks.len(),
            projects = snapshot.projects.len(),
            "loaded state"
        );
        let state = AppState::from_snapshot(snapshot);
        let github: SharedTransport = match config.github_token() {
            Some(token) => Arc::new(HttpTransport::github(token)),
            None => Arc::new(Disconnected),
        };
        let toggl: SharedTransport = match config.toggl_token() {
            Some(token) => Arc::new(HttpTransport::toggl(token)),
            None => Arc::new(Disconnected),
        };
        let mut app = Self::with_state(config, state, Some(SnapshotWriter::start(database)));
        app.set_transports(github, toggl);
        Ok(app)
    }

    /// App over an existing state. Without a writer nothing is persisted.
    pub fn with_state(config: Config, state: AppState, writer: Option<SnapshotWriter>) -> Self {
        let mut app = Self {
            config,
            state,
            service: TaskService::default(),
            writer,
            fetcher: Fetcher::default(),
            today: utils::today(),
            focus: Focus::List,
            sidebar_state: SidebarState::Expanded,
            mode: Mode::Normal,
            sidebar_index: 0,
            sidebar_list_state: ListState::default(),
            selected_index: 0,
            list_state: ListState::default(),
            task_form: None,
            project_name: Editor::new(),
            pending_delete: None,
            delete_selection: 0,
            standup_report: None,
            status: StatusState::default(),
        };
        app.sync_sidebar_state();
        app.clamp_selection();
        app
    }

    /// Replace the transports used by refresh
    pub fn set_transports(&mut self, github: SharedTransport, toggl: SharedTransport) {
        self.fetcher = Fetcher::new(github, toggl);
    }

    /// Housekeeping run once per frame
    pub fn tick(&mut self) {
        self.check_status_message_timeout();
        self.poll_saves();
        self.poll_fetches();
        let today = utils::today();
        if today != self.today {
            debug!(%today, "date changed");
            self.today = today;
            self.clamp_selection();
        }
    }

    // ----- persistence -----

    fn persist(&mut self) {
        let Some(ref writer) = self.writer else {
            return;
        };
        if !writer.submit(self.state.to_snapshot()) {
            warn!("snapshot writer is not running");
            self.set_status_message("Save failed: writer stopped".to_string());
        }
    }

    fn poll_saves(&mut self) {
        let outcomes = match self.writer {
            Some(ref writer) => writer.poll(),
            None => return,
        };
        for outcome in outcomes {
            if let SaveOutcome::Failed(e) = outcome {
                self.set_status_message(format!("Save failed: {}", e));
            }
        }
    }

    /// Flush pending saves and stop the writer thread
    pub fn shutdown(mut self) -> Result<(), TuiError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let failure = writer.shutdown().into_iter().find_map(|o| match o {
            SaveOutcome::Failed(e) => Some(e),
            SaveOutcome::Saved => None,
        });
        match failure {
            Some(e) => Err(TuiError::SaveError(e)),
            None => {
                info!("state flushed on exit");
                Ok(())
            }
        }
    }

    // ----- sidebar -----

    /// Fixed views, then projects, then tags
    pub fn sidebar_items(&self) -> Vec<View> {
        let mut items: Vec<View> = View::FIXED.to_vec();
        items.extend(self.state.projects().iter().map(|p| View::Project(p.id.clone())));
        items.extend(self.state.tags().iter().map(|t| View::Tag(t.id.clone())));
        items
    }

    fn sync_sidebar_state(&mut self) {
        let items = self.sidebar_items();
        if let Some(pos) = items.iter().position(|v| *v == self.state.view) {
            self.sidebar_index = pos;
        } else {
            self.sidebar_index = self.sidebar_index.min(items.len().saturating_sub(1));
        }
        self.sidebar_list_state.select(Some(self.sidebar_index));
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_state = match self.sidebar_state {
            SidebarState::Expanded => SidebarState::Collapsed,
            SidebarState::Collapsed => {
                self.focus = Focus::List;
                SidebarState::Expanded
            }
        };
        if self.sidebar_state == SidebarState::Collapsed {
            self.focus = Focus::List;
        }
    }

    pub fn switch_focus(&mut self) {
        self.focus = match self.focus {
            Focus::List if self.sidebar_state == SidebarState::Expanded => Focus::Sidebar,
            _ => Focus::List,
        };
    }

    /// Make `view` active, resetting the list selection.
    /// Integration views fetch on first visit.
    pub fn switch_view(&mut self, view: View) {
        debug!(view = view.title(), "switching view");
        self.state.set_view(view);
        self.selected_index = 0;
        self.sync_sidebar_state();
        self.clamp_selection();

        let needs_fetch = match self.state.view {
            View::GitHub => {
                let gh = &self.state.integrations.github;
                !gh.loading
                    && gh.error.is_none()
                    && gh.data.assigned_issues.is_empty()
                    && gh.data.review_requested.is_empty()
                    && gh.data.my_prs.is_empty()
            }
            View::Toggl => {
                let toggl = &self.state.integrations.toggl;
                !toggl.loading && toggl.error.is_none() && toggl.data.is_empty()
            }
            _ => false,
        };
        if needs_fetch {
            self.refresh_integrations();
        }
    }

    /// Jump to the n-th fixed view (1-based, as on the number keys)
    pub fn jump_to_fixed_view(&mut self, n: usize) {
        if let Some(view) = n.checked_sub(1).and_then(|i| View::FIXED.get(i)) {
            self.switch_view(view.clone());
        }
    }

    fn move_sidebar(&mut self, up: bool) {
        let items = self.sidebar_items();
        if items.is_empty() {
            return;
        }
        let index = if up {
            self.sidebar_index.saturating_sub(1)
        } else {
            (self.sidebar_index + 1).min(items.len() - 1)
        };
        if let Some(view) = items.get(index).cloned() {
            self.switch_view(view);
        }
    }

    // ----- task list -----

    pub fn current_tasks(&self) -> Vec<&Task> {
        self.state.current_tasks(self.today)
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.current_tasks().get(self.selected_index).copied()
    }

    fn selected_task_id(&self) -> Option<String> {
        self.selected_task().map(|t| t.id.clone())
    }

    pub fn clamp_selection(&mut self) {
        let len = self.current_tasks().len();
        if len == 0 {
            self.selected_index = 0;
            self.list_state.select(None);
        } else {
            self.selected_index = self.selected_index.min(len - 1);
            self.list_state.select(Some(self.selected_index));
        }
    }

    /// Keep the cursor on `id` if it is still listed, otherwise clamp
    fn select_task_id(&mut self, id: &str) {
        if let Some(pos) = self.current_tasks().iter().position(|t| t.id == id) {
            self.selected_index = pos;
        }
        self.clamp_selection();
    }

    pub fn move_selection_up(&mut self) {
        match self.focus {
            Focus::Sidebar => self.move_sidebar(true),
            Focus::List => {
                self.selected_index = self.selected_index.saturating_sub(1);
                self.clamp_selection();
            }
        }
    }

    pub fn move_selection_down(&mut self) {
        match self.focus {
            Focus::Sidebar => self.move_sidebar(false),
            Focus::List => {
                self.selected_index += 1;
                self.clamp_selection();
            }
        }
    }

    // ----- status bar -----

    pub fn set_status_message(&mut self, message: String) {
        self.status.message = Some(message);
        self.status.message_time = Some(Instant::now());
    }

    pub fn clear_status_message(&mut self) {
        self.status.message = None;
        self.status.message_time = None;
    }

    pub fn check_status_message_timeout(&mut self) {
        if let Some(time) = self.status.message_time
            && time.elapsed().as_secs() >= STATUS_MESSAGE_TIMEOUT_SECS
        {
            self.clear_status_message();
        }
    }

    // ----- modes -----

    pub fn enter_search_mode(&mut self) {
        self.mode = Mode::Search;
        self.state.search_query = Some(String::new());
        self.focus = Focus::List;
        self.selected_index = 0;
        self.clamp_selection();
    }

    pub fn add_to_search(&mut self, ch: char) {
        self.state.search_query.get_or_insert_with(String::new).push(ch);
        self.selected_index = 0;
        self.clamp_selection();
    }

    pub fn remove_from_search(&mut self) {
        if let Some(ref mut query) = self.state.search_query {
            query.pop();
        }
        self.selected_index = 0;
        self.clamp_selection();
    }

    /// Leave search mode. `keep` leaves the results listed until the next view switch.
    pub fn exit_search_mode(&mut self, keep: bool) {
        self.mode = Mode::Normal;
        let blank = self.state.search_query.as_deref().is_none_or(str::is_empty);
        if !keep || blank {
            let id = self.selected_task_id();
            self.state.search_query = None;
            match id {
                Some(id) => self.select_task_id(&id),
                None => self.clamp_selection(),
            }
        }
    }

    pub fn enter_help_mode(&mut self) {
        self.mode = Mode::Help;
    }

    pub fn exit_help_mode(&mut self) {
        self.mode = Mode::Normal;
    }

    /// New-task form. In a project or tag view the form starts filed there.
    pub fn enter_create_mode(&mut self) {
        let mut form = TaskForm::new();
        match self.state.view {
            View::Project(ref id) if self.state.project(id).is_some() => {
                form.project_id = Some(id.clone());
            }
            View::Tag(ref id) => {
                if let Some(tag) = self.state.tag(id) {
                    form.tags = Editor::from_string(&tag.name);
                }
            }
            View::Today => {
                form.due_date = Editor::from_string(&self.today.format("%Y-%m-%d").to_string());
            }
            _ => {}
        }
        self.task_form = Some(form);
        self.mode = Mode::TaskForm;
    }

    pub fn enter_edit_mode(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let form = TaskForm::for_task(task, &self.state.tag_names(task));
        self.task_form = Some(form);
        self.mode = Mode::TaskForm;
    }

    pub fn exit_task_form(&mut self) {
        self.task_form = None;
        self.mode = Mode::Normal;
    }

    pub fn navigate_form_field(&mut self, forward: bool) {
        if let Some(ref mut form) = self.task_form {
            form.current_field = if forward {
                form.current_field.next()
            } else {
                form.current_field.prev()
            };
        }
    }

    pub fn get_current_form_editor(&mut self) -> Option<&mut Editor> {
        match self.mode {
            Mode::TaskForm => self.task_form.as_mut().and_then(|f| f.current_editor_mut()),
            Mode::ProjectForm => Some(&mut self.project_name),
            _ => None,
        }
    }

    /// Step the priority or project choice of the active field
    pub fn cycle_form_choice(&mut self, forward: bool) {
        let project_ids: Vec<Option<String>> = std::iter::once(None)
            .chain(self.state.projects().iter().map(|p| Some(p.id.clone())))
            .collect();
        let Some(ref mut form) = self.task_form else {
            return;
        };
        match form.current_field {
            TaskField::Priority => {
                let all = TaskPriority::ALL;
                let pos = all.iter().position(|p| *p == form.priority).unwrap_or(0);
                let next = if forward { (pos + 1) % all.len() } else { (pos + all.len() - 1) % all.len() };
                form.priority = all[next];
            }
            TaskField::Project => {
                let pos = project_ids.iter().position(|p| *p == form.project_id).unwrap_or(0);
                let len = project_ids.len();
                let next = if forward { (pos + 1) % len } else { (pos + len - 1) % len };
                form.project_id = project_ids[next].clone();
            }
            _ => {}
        }
    }

    /// Validate and apply the task form. On a validation error the form
    /// stays open and the message goes to the status bar.
    pub fn save_task_form(&mut self) {
        let Some(form) = self.task_form.clone() else {
            return;
        };

        let mut new_tags: Vec<Tag> = Vec::new();
        let mut tag_ids: Vec<String> = Vec::new();
        for name in form.tag_names() {
            let existing = self.state.tag_by_name(&name).map(|t| t.id.clone());
            let id = match existing {
                Some(id) => id,
                None => match self.service.create_tag(&name, None) {
                    Ok(tag) => {
                        let id = tag.id.clone();
                        new_tags.push(tag);
                        id
                    }
                    Err(e) => {
                        self.set_status_message(e.to_string());
                        return;
                    }
                },
            };
            if !tag_ids.contains(&id) {
                tag_ids.push(id);
            }
        }

        let title = form.title.text().trim().to_string();
        let result = match form.editing_task_id {
            Some(ref id) => {
                let Some(task) = self.state.task(id).cloned() else {
                    self.set_status_message("Task no longer exists".to_string());
                    self.exit_task_form();
                    return;
                };
                let patch = TaskPatch {
                    title: Some(title),
                    notes: Some(form.notes.value()),
                    due_date: Some(form.due_date.value()),
                    start_date: Some(form.start_date.value()),
                    priority: Some(form.priority),
                    project_id: Some(form.project_id.clone()),
                    tags: Some(tag_ids),
                    ..Default::default()
                };
                self.service.update_task(&task, patch)
            }
            None => {
                let order_index = next_order_index(self.state.tasks().iter().map(|t| t.order_index));
                self.service.create_task(NewTask {
                    title,
                    notes: form.notes.value(),
                    due_date: form.due_date.value(),
                    start_date: form.start_date.value(),
                    priority: form.priority,
                    project_id: form.project_id.clone(),
                    tags: tag_ids,
                    order_index,
                    ..Default::default()
                })
            }
        };

        match result {
            Ok(task) => {
                let verb = if form.editing_task_id.is_some() { "updated" } else { "created" };
                let message = format!("Task '{}' {}", task.title, verb);
                let id = task.id.clone();
                for tag in new_tags {
                    self.state.upsert_tag(tag);
                }
                self.state.upsert_task(task);
                self.persist();
                self.exit_task_form();
                self.sync_sidebar_state();
                self.select_task_id(&id);
                self.set_status_message(message);
            }
            Err(e) => {
                debug!(error = %e, "task form rejected");
                self.set_status_message(e.to_string());
            }
        }
    }

    pub fn enter_project_form(&mut self) {
        self.project_name = Editor::new();
        self.mode = Mode::ProjectForm;
    }

    pub fn exit_project_form(&mut self) {
        self.mode = Mode::Normal;
    }

    pub fn save_project_form(&mut self) {
        let order_index = next_order_index(self.state.projects().iter().map(|p| p.order_index));
        let result = self.service.create_project(NewProject {
            name: self.project_name.text().trim().to_string(),
            order_index,
            ..Default::default()
        });
        match result {
            Ok(project) => {
                let message = format!("Project '{}' created", project.name);
                self.state.upsert_project(project);
                self.persist();
                self.exit_project_form();
                self.sync_sidebar_state();
                self.set_status_message(message);
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    // ----- task actions -----

    pub fn toggle_selected_complete(&mut self) {
        let Some(task) = self.selected_task().cloned() else {
            return;
        };
        let updated = self.service.toggle_completed(&task);
        let message = if updated.status.is_open() {
            format!("'{}' reopened", updated.title)
        } else {
            format!("'{}' completed", updated.title)
        };
        self.state.upsert_task(updated);
        self.persist();
        self.clamp_selection();
        self.set_status_message(message);
    }

    pub fn request_delete(&mut self) {
        if let Some(id) = self.selected_task_id() {
            self.pending_delete = Some(id);
            self.delete_selection = 0;
            self.mode = Mode::ConfirmDelete;
        }
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
        self.mode = Mode::Normal;
    }

    pub fn confirm_delete(&mut self) {
        let pending = self.pending_delete.take();
        self.mode = Mode::Normal;
        let Some(task) = pending.and_then(|id| self.state.task(&id).cloned()) else {
            return;
        };
        let deleted = self.service.delete_task(&task);
        self.state.upsert_task(deleted);
        self.persist();
        self.clamp_selection();
        self.set_status_message(format!("Task '{}' deleted", task.title));
    }

    /// Reordering only shows in views listed by order index, outside search
    pub fn can_reorder(&self) -> bool {
        self.state.view.is_manually_ordered()
            && self.state.search_query.as_deref().is_none_or(str::is_empty)
    }

    /// Move the selected task one place up or down among its view neighbours
    pub fn reorder_selected(&mut self, up: bool) {
        if !self.can_reorder() {
            self.set_status_message("This view is not manually ordered".to_string());
            return;
        }
        let ids: Vec<String> = self.current_tasks().iter().map(|t| t.id.clone()).collect();
        let i = self.selected_index;
        if i >= ids.len() {
            return;
        }
        let target = match (up, i) {
            (true, 0) => return,
            (true, i) => i - 1,
            (false, i) if i + 1 >= ids.len() => return,
            (false, i) => i + 1,
        };

        let mut others = ids.clone();
        let moving_id = others.remove(i);
        let before_id = target.checked_sub(1).and_then(|j| others.get(j)).cloned();
        let after_id = others.get(target).cloned();

        let index_of = |state: &AppState, id: &Option<String>| {
            id.as_deref().and_then(|id| state.task(id)).map(|t| t.order_index)
        };
        let (b, a) = (index_of(&self.state, &before_id), index_of(&self.state, &after_id));
        let exhausted = match (b, a) {
            (Some(b), Some(a)) => needs_rebalance(b, a),
            (None, Some(a)) => between(None, Some(a)) >= a,
            _ => false,
        };
        if exhausted {
            self.rebalance_view(&ids);
        }

        let lookup = |id: &Option<String>| id.as_deref().and_then(|id| self.state.task(id)).cloned();
        let (Some(task), before, after) = (
            self.state.task(&moving_id).cloned(),
            lookup(&before_id),
            lookup(&after_id),
        ) else {
            return;
        };
        let moved = self.service.move_task(&task, before.as_ref(), after.as_ref());
        self.state.upsert_task(moved);
        self.persist();
        self.select_task_id(&moving_id);
        let direction = if up { "up" } else { "down" };
        self.set_status_message(format!("Task moved {}", direction));
    }

    /// Renumber the listed tasks 1..=n in their current order
    fn rebalance_view(&mut self, ids: &[String]) {
        debug!(count = ids.len(), "rebalancing order indexes");
        for (id, index) in ids.iter().zip(rebalance(ids.len())) {
            let Some(task) = self.state.task(id).cloned() else {
                continue;
            };
            let patch = TaskPatch {
                order_index: Some(index),
                ..Default::default()
            };
            if let Ok(updated) = self.service.update_task(&task, patch) {
                self.state.upsert_task(updated);
            }
        }
    }

    // ----- standup -----

    pub fn standup_report(&self) -> String {
        let completed = get_completed_tasks(self.state.tasks(), self.state.completed_limit);
        let today_tasks = self.state.view_tasks(&View::Today, self.today);
        let entries = &self.state.integrations.toggl.data;
        let time_entries = (!entries.is_empty()).then_some(entries.as_slice());
        standup::generate_report(&completed, &today_tasks, time_entries, 1, self.today)
    }

    /// Show the standup report and copy it to the clipboard
    pub fn open_standup(&mut self) {
        let report = self.standup_report();
        let plain = standup::format_for_clipboard(&report);
        let message = match arboard::Clipboard::new().and_then(|mut c| c.set_text(plain)) {
            Ok(()) => "Standup report copied to clipboard".to_string(),
            Err(e) => {
                warn!(error = %e, "clipboard unavailable");
                format!("Clipboard unavailable: {}", e)
            }
        };
        self.standup_report = Some(report);
        self.mode = Mode::Standup;
        self.set_status_message(message);
    }

    pub fn close_standup(&mut self) {
        self.standup_report = None;
        self.mode = Mode::Normal;
    }

    // ----- integrations -----

    /// Re-fetch the external data shown by the active view
    pub fn refresh_integrations(&mut self) {
        match self.state.view {
            View::GitHub => self.refresh_github(),
            View::Toggl => self.refresh_toggl(),
            _ => {}
        }
    }

    /// Start a background fetch unless one is already running
    fn refresh_github(&mut self) {
        let remote = &mut self.state.integrations.github;
        if self.config.github_token().is_none() {
            remote.fail(IntegrationError::MissingToken.to_string());
            return;
        }
        if remote.loading {
            return;
        }
        remote.start_loading();
        self.fetcher.fetch_github(self.config.github_allowed_repos.clone());
    }

    fn refresh_toggl(&mut self) {
        let remote = &mut self.state.integrations.toggl;
        if self.config.toggl_token().is_none() {
            remote.fail(IntegrationError::MissingToken.to_string());
            return;
        }
        if remote.loading {
            return;
        }
        remote.start_loading();
        let start = self.today - Duration::days(TOGGL_DAYS_BACK);
        self.fetcher
            .fetch_toggl(start, self.today, self.config.toggl_hidden_project_ids.clone());
    }

    fn poll_fetches(&mut self) {
        for result in self.fetcher.poll() {
            self.apply_fetch(result);
        }
    }

    fn apply_fetch(&mut self, result: FetchResult) {
        let integrations = &mut self.state.integrations;
        match result {
            FetchResult::GitHub(Ok(data)) => integrations.github.set(data),
            FetchResult::GitHub(Err(e)) => integrations.github.fail(e),
            FetchResult::Toggl(Ok(entries)) => integrations.toggl.set(entries),
            FetchResult::Toggl(Err(e)) => integrations.toggl.fail(e),
        }
    }

    /// Wait for every running fetch to land, for tests that need the data
    #[cfg(test)]
    fn finish_fetches(&mut self) {
        while self.state.integrations.github.loading || self.state.integrations.toggl.loading {
            match self.fetcher.wait(std::time::Duration::from_secs(5)) {
                Some(result) => self.apply_fetch(result),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::fake::FakeTransport;
    use crate::models::TaskStatus;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn app() -> App {
        App::with_state(Config::default(), AppState::default(), None)
    }

    fn type_text(editor: &mut Editor, text: &str) {
        for ch in text.chars() {
            editor.insert_char(ch);
        }
    }

    fn add_task(app: &mut App, title: &str) -> String {
        app.enter_create_mode();
        type_text(&mut app.task_form.as_mut().unwrap().title, title);
        app.save_task_form();
        app.selected_task().unwrap().id.clone()
    }

    fn titles(app: &App) -> Vec<String> {
        app.current_tasks().iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn test_create_task_from_form() {
        let mut app = app();
        app.enter_create_mode();
        {
            let form = app.task_form.as_mut().unwrap();
            type_text(&mut form.title, "Write report");
            type_text(&mut form.tags, "work, Work, home");
        }
        app.save_task_form();

        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(titles(&app), vec!["Write report"]);
        let task = app.selected_task().unwrap();
        assert_eq!(app.state.tag_names(task), vec!["work", "home"]);
        assert_eq!(app.status.message.as_deref(), Some("Task 'Write report' created"));
    }

    #[test]
    fn test_invalid_form_stays_open() {
        let mut app = app();
        app.enter_create_mode();
        {
            let form = app.task_form.as_mut().unwrap();
            type_text(&mut form.title, "Dated");
            type_text(&mut form.due_date, "next week");
            type_text(&mut form.tags, "unsaved");
        }
        app.save_task_form();

        assert_eq!(app.mode, Mode::TaskForm);
        assert!(app.task_form.is_some());
        assert!(app.state.tasks().is_empty());
        assert!(app.state.tag_by_name("unsaved").is_none());
        assert!(app.status.message.is_some());
    }

    #[test]
    fn test_edit_task_updates_fields() {
        let mut app = app();
        let id = add_task(&mut app, "Draft");
        app.enter_edit_mode();
        {
            let form = app.task_form.as_mut().unwrap();
            assert_eq!(form.editing_task_id.as_deref(), Some(id.as_str()));
            type_text(&mut form.title, " v2");
            form.current_field = TaskField::Priority;
        }
        app.cycle_form_choice(true);
        app.cycle_form_choice(true);
        app.save_task_form();

        let task = app.state.task(&id).unwrap();
        assert_eq!(task.title, "Draft v2");
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(app.state.tasks().len(), 1);
    }

    #[test]
    fn test_toggle_and_delete() {
        let mut app = app();
        let id = add_task(&mut app, "Ship it");
        app.toggle_selected_complete();
        assert_eq!(app.state.task(&id).unwrap().status, TaskStatus::Completed);
        assert!(titles(&app).is_empty());

        app.switch_view(View::Completed);
        assert_eq!(titles(&app), vec!["Ship it"]);
        app.toggle_selected_complete();
        assert_eq!(app.state.task(&id).unwrap().status, TaskStatus::Inbox);

        app.switch_view(View::Inbox);
        app.request_delete();
        assert_eq!(app.mode, Mode::ConfirmDelete);
        app.confirm_delete();
        assert!(app.state.task(&id).is_none());
        assert_eq!(app.state.tasks().len(), 1);
        assert!(titles(&app).is_empty());
    }

    #[test]
    fn test_reorder_moves_between_neighbours() {
        let mut app = app();
        for title in ["a", "b", "c"] {
            add_task(&mut app, title);
        }
        assert_eq!(titles(&app), vec!["a", "b", "c"]);

        app.selected_index = 2;
        app.reorder_selected(true);
        assert_eq!(titles(&app), vec!["a", "c", "b"]);
        assert_eq!(app.selected_index, 1);

        app.reorder_selected(true);
        assert_eq!(titles(&app), vec!["c", "a", "b"]);
        app.reorder_selected(true);
        assert_eq!(titles(&app), vec!["c", "a", "b"]);

        app.selected_index = 1;
        app.reorder_selected(false);
        assert_eq!(titles(&app), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_reorder_rebalances_equal_indexes() {
        let mut state = AppState::default();
        let service = TaskService::default();
        for title in ["a", "b", "c"] {
            let task = service.create_task(NewTask::titled(title)).unwrap();
            state.upsert_task(task);
        }
        let mut app = App::with_state(Config::default(), state, None);
        let before = titles(&app);

        app.selected_index = 0;
        app.reorder_selected(false);
        let after = titles(&app);
        assert_eq!(after[0], before[1]);
        assert_eq!(after[1], before[0]);
    }

    #[test]
    fn test_reorder_refused_in_date_views() {
        let mut app = app();
        add_task(&mut app, "a");
        app.switch_view(View::Today);
        app.reorder_selected(true);
        assert_eq!(app.status.message.as_deref(), Some("This view is not manually ordered"));
    }

    #[test]
    fn test_search_overrides_view_until_cleared() {
        let mut app = app();
        add_task(&mut app, "Buy milk");
        add_task(&mut app, "Call mom");
        app.enter_search_mode();
        for ch in "MILK".chars() {
            app.add_to_search(ch);
        }
        assert_eq!(titles(&app), vec!["Buy milk"]);

        app.exit_search_mode(true);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(titles(&app), vec!["Buy milk"]);

        app.switch_view(View::Inbox);
        assert_eq!(titles(&app).len(), 2);

        app.enter_search_mode();
        app.add_to_search('x');
        app.exit_search_mode(false);
        assert_eq!(app.state.search_query, None);
    }

    #[test]
    fn test_sidebar_lists_projects_and_tags() {
        let mut app = app();
        app.enter_project_form();
        type_text(&mut app.project_name, "Garden");
        app.save_project_form();
        assert_eq!(app.mode, Mode::Normal);

        let items = app.sidebar_items();
        assert_eq!(items.len(), View::FIXED.len() + 1);
        let project_view = items.last().cloned().unwrap();

        app.focus = Focus::Sidebar;
        app.sidebar_index = View::FIXED.len() - 1;
        app.move_selection_down();
        assert_eq!(app.state.view, project_view);

        app.enter_create_mode();
        let project_id = app.task_form.as_ref().unwrap().project_id.clone();
        assert!(project_id.is_some());
        type_text(&mut app.task_form.as_mut().unwrap().title, "Plant beans");
        app.save_task_form();
        assert_eq!(titles(&app), vec!["Plant beans"]);
    }

    #[test]
    fn test_empty_project_name_rejected() {
        let mut app = app();
        app.enter_project_form();
        app.save_project_form();
        assert_eq!(app.mode, Mode::ProjectForm);
        assert!(app.state.projects().is_empty());
    }

    #[test]
    fn test_jump_to_fixed_view() {
        let mut app = app();
        app.jump_to_fixed_view(2);
        assert_eq!(app.state.view, View::Today);
        app.jump_to_fixed_view(0);
        app.jump_to_fixed_view(99);
        assert_eq!(app.state.view, View::Today);
        assert_eq!(app.sidebar_index, 1);
    }

    #[test]
    fn test_integration_without_token_reports_error() {
        let mut app = app();
        app.switch_view(View::GitHub);
        assert_eq!(
            app.state.integrations.github.error.as_deref(),
            Some("No API token configured")
        );
        assert!(!app.state.integrations.github.loading);
    }

    #[test]
    fn test_integration_refresh_uses_transport() {
        let mut config = Config::default();
        config.github_token = Some("ghp_test".to_string());
        config.toggl_token = Some("toggl".to_string());
        let mut app = App::with_state(config, AppState::default(), None);

        let github = Arc::new(
            FakeTransport::default()
                .with("/issues", json!([{
                    "id": 1, "number": 7, "title": "Fix it", "html_url": "https://github.com/o/r/issues/7",
                    "state": "open", "repository_url": "https://api.github.com/repos/o/r",
                    "user": {"login": "me"}
                }]))
                .with("/search/issues", json!({"items": []})),
        );
        let toggl = Arc::new(FakeTransport::default().failing("/me/time_entries", 403));
        app.set_transports(github.clone(), toggl);

        // The fetch runs in the background; the view shows loading meanwhile
        app.switch_view(View::GitHub);
        assert!(app.state.integrations.github.loading);
        app.refresh_integrations();
        app.finish_fetches();
        let gh = &app.state.integrations.github;
        assert!(!gh.loading);
        assert_eq!(gh.error, None);
        assert_eq!(gh.data.assigned_issues.len(), 1);
        assert_eq!(github.request_count("/issues"), 1);

        app.switch_view(View::Toggl);
        app.finish_fetches();
        assert_eq!(
            app.state.integrations.toggl.error.as_deref(),
            Some("Unexpected HTTP status 403")
        );
    }

    #[test]
    fn test_fetch_results_are_applied_on_tick() {
        let mut config = Config::default();
        config.toggl_token = Some("toggl".to_string());
        let mut app = App::with_state(config, AppState::default(), None);
        app.set_transports(
            Arc::new(Disconnected),
            Arc::new(
                FakeTransport::default()
                    .with("/me/time_entries", json!([]))
                    .with("/me/projects", json!([])),
            ),
        );

        app.switch_view(View::Toggl);
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        while app.state.integrations.toggl.loading && Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
            app.tick();
        }
        let toggl = &app.state.integrations.toggl;
        assert!(!toggl.loading);
        assert_eq!(toggl.error, None);
    }

    #[test]
    fn test_standup_report_lists_today() {
        let mut app = app();
        app.switch_view(View::Today);
        add_task(&mut app, "Standup prep");
        let report = app.standup_report();
        assert!(report.contains("- [ ] Standup prep"));
    }
}
