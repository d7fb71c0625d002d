//! Owned application state: every entity plus the active view.
//!
//! Tasks are kept in insertion order so the view functions can borrow them
//! as a slice; `task_index` maps ids to positions. Deleted entities stay in
//! the maps (and therefore in snapshots) but are hidden by every lookup.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::filters::{
    self, DEFAULT_COMPLETED_LIMIT, get_anytime_tasks, get_completed_tasks, get_inbox_tasks,
    get_overdue_tasks, get_project_tasks, get_tag_tasks, get_today_tasks, get_upcoming_tasks,
};
use crate::integrations::github::GitHubData;
use crate::integrations::toggl::TimeEntry;
use crate::models::{Project, Reminder, Section, StateSnapshot, Tag, Task, SNAPSHOT_VERSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Inbox,
    Today,
    Upcoming,
    Anytime,
    Completed,
    Review,
    GitHub,
    Toggl,
    Project(String),
    Tag(String),
}

impl View {
    /// Fixed views in sidebar order
    pub const FIXED: [View; 8] = [
        View::Inbox,
        View::Today,
        View::Upcoming,
        View::Anytime,
        View::Completed,
        View::Review,
        View::GitHub,
        View::Toggl,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            View::Inbox => "Inbox",
            View::Today => "Today",
            View::Upcoming => "Upcoming",
            View::Anytime => "Anytime",
            View::Completed => "Completed",
            View::Review => "Review",
            View::GitHub => "GitHub",
            View::Toggl => "Toggl",
            View::Project(_) => "Project",
            View::Tag(_) => "Tag",
        }
    }

    /// Parse a fixed view name as typed on the command line
    pub fn from_name(name: &str) -> Option<View> {
        View::FIXED
            .iter()
            .find(|v| v.title().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Views that show external data instead of tasks
    pub fn is_integration(&self) -> bool {
        matches!(self, View::GitHub | View::Toggl)
    }

    /// Views listed by order index, where manual reordering is visible
    pub fn is_manually_ordered(&self) -> bool {
        matches!(self, View::Inbox | View::Anytime | View::Project(_) | View::Tag(_))
    }
}

/// Fetch status of one external service, shown in its view only
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Remote<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Remote<T> {
    pub fn start_loading(&mut self) {
        self.loading = true;
    }

    pub fn set(&mut self, data: T) {
        self.data = data;
        self.loading = false;
        self.error = None;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.loading = false;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrationState {
    pub github: Remote<GitHubData>,
    pub toggl: Remote<Vec<TimeEntry>>,
}

#[derive(Debug, Clone)]
pub struct AppState {
    tasks: Vec<Task>,
    task_index: HashMap<String, usize>,
    projects: BTreeMap<String, Project>,
    sections: BTreeMap<String, Section>,
    tags: BTreeMap<String, Tag>,
    reminders: BTreeMap<String, Reminder>,
    pub view: View,
    pub search_query: Option<String>,
    pub completed_limit: usize,
    pub integrations: IntegrationState,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            task_index: HashMap::new(),
            projects: BTreeMap::new(),
            sections: BTreeMap::new(),
            tags: BTreeMap::new(),
            reminders: BTreeMap::new(),
            view: View::Inbox,
            search_query: None,
            completed_limit: DEFAULT_COMPLETED_LIMIT,
            integrations: IntegrationState::default(),
        }
    }
}

impl AppState {
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let mut state = Self::default();
        state.load_snapshot(snapshot);
        state
    }

    /// Replace every entity with the snapshot's contents. View state is kept.
    pub fn load_snapshot(&mut self, snapshot: StateSnapshot) {
        self.tasks = snapshot.tasks.into_values().collect();
        self.reindex();
        self.projects = snapshot.projects;
        self.sections = snapshot.sections;
        self.tags = snapshot.tags;
        self.reminders = snapshot.reminders;
    }

    /// Every entity, deleted ones included
    pub fn to_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            tasks: self.tasks.iter().map(|t| (t.id.clone(), t.clone())).collect(),
            projects: self.projects.clone(),
            sections: self.sections.clone(),
            tags: self.tags.clone(),
            reminders: self.reminders.clone(),
            version: SNAPSHOT_VERSION,
        }
    }

    fn reindex(&mut self) {
        self.task_index = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
    }

    /// All tasks in storage order, deleted ones included
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Insert or replace by id
    pub fn upsert_task(&mut self, task: Task) {
        match self.task_index.get(&task.id) {
            Some(&i) => self.tasks[i] = task,
            None => {
                self.task_index.insert(task.id.clone(), self.tasks.len());
                self.tasks.push(task);
            }
        }
    }

    /// Lookup that hides soft-deleted tasks
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.task_index
            .get(id)
            .and_then(|&i| self.tasks.get(i))
            .filter(|t| !t.deleted)
    }

    /// Resolve a full id or a unique id prefix among visible tasks
    pub fn find_task_by_prefix(&self, prefix: &str) -> Result<&Task, PrefixError> {
        if let Some(task) = self.task(prefix) {
            return Ok(task);
        }
        let mut matches = self
            .tasks
            .iter()
            .filter(|t| !t.deleted && t.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task),
            (None, _) => Err(PrefixError::NotFound(prefix.to_string())),
            (Some(_), Some(_)) => Err(PrefixError::Ambiguous(prefix.to_string())),
        }
    }

    pub fn upsert_project(&mut self, project: Project) {
        self.projects.insert(project.id.clone(), project);
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.get(id).filter(|p| !p.deleted)
    }

    /// Visible projects by order index
    pub fn projects(&self) -> Vec<&Project> {
        let mut projects: Vec<&Project> = self.projects.values().filter(|p| !p.deleted).collect();
        projects.sort_by(|a, b| a.order_index.total_cmp(&b.order_index));
        projects
    }

    /// Case-insensitive name lookup among visible projects
    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects
            .values()
            .find(|p| !p.deleted && p.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn upsert_section(&mut self, section: Section) {
        self.sections.insert(section.id.clone(), section);
    }

    pub fn sections_for(&self, project_id: &str) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self
            .sections
            .values()
            .filter(|s| !s.deleted && s.project_id == project_id)
            .collect();
        sections.sort_by(|a, b| a.order_index.total_cmp(&b.order_index));
        sections
    }

    pub fn upsert_tag(&mut self, tag: Tag) {
        self.tags.insert(tag.id.clone(), tag);
    }

    pub fn tag(&self, id: &str) -> Option<&Tag> {
        self.tags.get(id).filter(|t| !t.deleted)
    }

    /// Visible tags by name
    pub fn tags(&self) -> Vec<&Tag> {
        let mut tags: Vec<&Tag> = self.tags.values().filter(|t| !t.deleted).collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    pub fn tag_by_name(&self, name: &str) -> Option<&Tag> {
        self.tags
            .values()
            .find(|t| !t.deleted && t.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Names of a task's visible tags; dangling ids are skipped
    pub fn tag_names(&self, task: &Task) -> Vec<&str> {
        task.tags
            .iter()
            .filter_map(|id| self.tag(id))
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn upsert_reminder(&mut self, reminder: Reminder) {
        self.reminders.insert(reminder.id.clone(), reminder);
    }

    /// Active reminders for a task, earliest first
    pub fn reminders_for(&self, task_id: &str) -> Vec<&Reminder> {
        let mut reminders: Vec<&Reminder> = self
            .reminders
            .values()
            .filter(|r| !r.deleted && r.cancelled_at.is_none() && r.task_id == task_id)
            .collect();
        reminders.sort_by(|a, b| a.at.cmp(&b.at));
        reminders
    }

    /// Switch to a view and clear any search
    pub fn set_view(&mut self, view: View) {
        self.view = view;
        self.search_query = None;
    }

    /// Tasks for the active view. A non-empty search overrides the view.
    pub fn current_tasks(&self, today: NaiveDate) -> Vec<&Task> {
        if let Some(query) = self.search_query.as_deref().filter(|q| !q.is_empty()) {
            return filters::search_tasks(&self.tasks, query);
        }
        self.view_tasks(&self.view, today)
    }

    pub fn view_tasks(&self, view: &View, today: NaiveDate) -> Vec<&Task> {
        match view {
            View::Inbox => get_inbox_tasks(&self.tasks),
            View::Today => get_today_tasks(&self.tasks, today),
            View::Upcoming => get_upcoming_tasks(&self.tasks, today),
            View::Anytime => get_anytime_tasks(&self.tasks),
            View::Completed => get_completed_tasks(&self.tasks, self.completed_limit),
            View::Review => get_overdue_tasks(&self.tasks, today),
            View::Project(id) => get_project_tasks(&self.tasks, id),
            View::Tag(id) => get_tag_tasks(&self.tasks, id),
            View::GitHub | View::Toggl => Vec::new(),
        }
    }

    /// Sidebar badge count for a view
    pub fn count(&self, view: &View, today: NaiveDate) -> usize {
        self.view_tasks(view, today).len()
    }

    /// Heading for the active view, resolving project and tag names
    pub fn view_title(&self) -> String {
        if let Some(query) = self.search_query.as_deref().filter(|q| !q.is_empty()) {
            return format!("Search: {}", query);
        }
        match self.view {
            View::Project(ref id) => self
                .project(id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "Unknown project".to_string()),
            View::Tag(ref id) => self
                .tag(id)
                .map(|t| format!("#{}", t.name))
                .unwrap_or_else(|| "Unknown tag".to_string()),
            ref fixed => fixed.title().to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PrefixError {
    #[error("No task matches '{0}'")]
    NotFound(String),
    #[error("'{0}' matches more than one task")]
    Ambiguous(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn task(id: &str) -> Task {
        Task::new(id.to_string(), format!("Task {}", id), String::new())
    }

    fn tag(id: &str, name: &str) -> Tag {
        Tag {
            id: id.to_string(),
            name: name.to_string(),
            color: None,
            created_at: String::new(),
            updated_at: String::new(),
            deleted: false,
        }
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut state = AppState::default();
        state.upsert_task(task("a"));
        state.upsert_task(task("b"));
        let mut renamed = task("a");
        renamed.title = "Renamed".to_string();
        state.upsert_task(renamed);

        assert_eq!(state.tasks().len(), 2);
        assert_eq!(state.tasks()[0].title, "Renamed");
    }

    #[test]
    fn test_deleted_hidden_from_lookups_but_kept_in_snapshot() {
        let mut state = AppState::default();
        let mut gone = task("gone");
        gone.deleted = true;
        state.upsert_task(gone);

        assert!(state.task("gone").is_none());
        assert!(state.current_tasks(today()).is_empty());
        assert!(state.to_snapshot().tasks["gone"].deleted);
    }

    #[test]
    fn test_snapshot_round_trip_keeps_sections_and_reminders() {
        let mut state = AppState::default();
        state.upsert_task(task("a"));
        state.upsert_section(Section {
            id: "s".to_string(),
            project_id: "p".to_string(),
            name: "Later".to_string(),
            order_index: 1.0,
            created_at: String::new(),
            updated_at: String::new(),
            deleted: false,
        });
        state.upsert_reminder(Reminder {
            id: "r".to_string(),
            task_id: "a".to_string(),
            at: "2024-06-16T09:00:00".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
            cancelled_at: None,
            deleted: false,
        });

        let snapshot = state.to_snapshot();
        assert_eq!(snapshot.sections.len(), 1);
        assert_eq!(snapshot.reminders.len(), 1);
        let restored = AppState::from_snapshot(snapshot.clone());
        assert_eq!(restored.to_snapshot(), snapshot);
        assert_eq!(restored.reminders_for("a").len(), 1);
        assert_eq!(restored.sections_for("p").len(), 1);
    }

    #[test]
    fn test_search_overrides_view() {
        let mut state = AppState::default();
        let mut a = task("a");
        a.title = "Buy milk".to_string();
        a.status = TaskStatus::Completed;
        state.upsert_task(a);
        state.upsert_task(task("b"));

        state.set_view(View::Inbox);
        assert_eq!(state.current_tasks(today()).len(), 1);

        state.search_query = Some("MILK".to_string());
        let found = state.current_tasks(today());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
        assert_eq!(state.view_title(), "Search: MILK");

        state.set_view(View::Today);
        assert_eq!(state.search_query, None);
    }

    #[test]
    fn test_tag_view_and_dangling_references() {
        let mut state = AppState::default();
        state.upsert_tag(tag("g1", "work"));
        let mut t = task("a");
        t.tags = vec!["g1".to_string(), "missing".to_string()];
        t.project_id = Some("nowhere".to_string());
        state.upsert_task(t);

        let a = state.task("a").unwrap();
        assert_eq!(state.tag_names(a), vec!["work"]);
        assert!(state.project("nowhere").is_none());

        state.set_view(View::Tag("g1".to_string()));
        assert_eq!(state.current_tasks(today()).len(), 1);
        assert_eq!(state.view_title(), "#work");
        assert_eq!(state.tag_by_name(" WORK ").map(|t| t.id.as_str()), Some("g1"));
    }

    #[test]
    fn test_find_task_by_prefix() {
        let mut state = AppState::default();
        state.upsert_task(task("abc-1"));
        state.upsert_task(task("abd-2"));
        assert_eq!(state.find_task_by_prefix("abc").unwrap().id, "abc-1");
        assert_eq!(
            state.find_task_by_prefix("ab").unwrap_err(),
            PrefixError::Ambiguous("ab".to_string())
        );
        assert!(matches!(state.find_task_by_prefix("zz"), Err(PrefixError::NotFound(_))));
    }

    #[test]
    fn test_view_from_name() {
        assert_eq!(View::from_name("today"), Some(View::Today));
        assert_eq!(View::from_name("GitHub"), Some(View::GitHub));
        assert_eq!(View::from_name("project"), None);
    }
}
