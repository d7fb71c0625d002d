//! View engine: pure functions that select and order tasks for each view.
//!
//! Dates are compared on their `YYYY-MM-DD` prefix as strings. ISO-8601 sorts
//! lexicographically in chronological order, and the mutation service rejects
//! malformed dates, so string comparison is safe for stored tasks.

use chrono::NaiveDate;
use std::cmp::Ordering;

use crate::models::{Task, TaskKind, TaskPriority, TaskSize, TaskStatus};

/// Default cap on the completed view
pub const DEFAULT_COMPLETED_LIMIT: usize = 100;

/// Sorts after every real date
const MAX_DATE: &str = "9999-99-99";

/// Ad-hoc filter criteria. Empty collections and `None` mean "no restriction".
#[derive(Debug, Clone, Default)]
pub struct ViewCriteria {
    pub statuses: Vec<TaskStatus>,
    pub project_ids: Vec<String>,
    pub tag_ids: Vec<String>,
    pub priorities: Vec<TaskPriority>,
    pub kinds: Vec<TaskKind>,
    pub sizes: Vec<TaskSize>,
    pub assignee: Option<String>,
    pub due_date_start: Option<String>,
    pub due_date_end: Option<String>,
    pub start_date_start: Option<String>,
    pub start_date_end: Option<String>,
    pub include_deleted: bool,
    pub search_query: Option<String>,
}

/// Calendar-day portion of an ISO timestamp
pub fn date_part(value: &str) -> &str {
    value.get(..10).unwrap_or(value)
}

fn today_string(today: NaiveDate) -> String {
    today.format("%Y-%m-%d").to_string()
}

fn due_part(task: &Task) -> Option<&str> {
    task.due_date.as_deref().map(date_part)
}

fn start_part(task: &Task) -> Option<&str> {
    task.start_date.as_deref().map(date_part)
}

fn by_order_index(a: &Task, b: &Task) -> Ordering {
    a.order_index.total_cmp(&b.order_index)
}

fn in_range(value: Option<&str>, start: Option<&str>, end: Option<&str>) -> bool {
    if start.is_none() && end.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    let day = date_part(value);
    if let Some(start) = start
        && day < start
    {
        return false;
    }
    if let Some(end) = end
        && day > end
    {
        return false;
    }
    true
}

fn matches_query(task: &Task, query: &str) -> bool {
    let query = query.to_lowercase();
    task.title.to_lowercase().contains(&query)
        || task
            .notes
            .as_deref()
            .is_some_and(|notes| notes.to_lowercase().contains(&query))
}

/// Whether a single task satisfies every supplied criterion
pub fn matches(task: &Task, criteria: &ViewCriteria) -> bool {
    if task.deleted && !criteria.include_deleted {
        return false;
    }
    if !criteria.statuses.is_empty() && !criteria.statuses.contains(&task.status) {
        return false;
    }
    if !criteria.project_ids.is_empty()
        && !task
            .project_id
            .as_ref()
            .is_some_and(|id| criteria.project_ids.contains(id))
    {
        return false;
    }
    if !criteria.tag_ids.is_empty() && !criteria.tag_ids.iter().any(|tag| task.has_tag(tag)) {
        return false;
    }
    if !criteria.priorities.is_empty() && !criteria.priorities.contains(&task.priority) {
        return false;
    }
    if !criteria.kinds.is_empty() && !task.kind.is_some_and(|k| criteria.kinds.contains(&k)) {
        return false;
    }
    if !criteria.sizes.is_empty() && !task.size.is_some_and(|s| criteria.sizes.contains(&s)) {
        return false;
    }
    if let Some(ref assignee) = criteria.assignee
        && task.assignee.as_ref() != Some(assignee)
    {
        return false;
    }
    if !in_range(
        task.due_date.as_deref(),
        criteria.due_date_start.as_deref(),
        criteria.due_date_end.as_deref(),
    ) {
        return false;
    }
    if !in_range(
        task.start_date.as_deref(),
        criteria.start_date_start.as_deref(),
        criteria.start_date_end.as_deref(),
    ) {
        return false;
    }
    if let Some(ref query) = criteria.search_query
        && !query.is_empty()
        && !matches_query(task, query)
    {
        return false;
    }
    true
}

/// Filter preserving input order
pub fn filter_tasks<'a>(tasks: &'a [Task], criteria: &ViewCriteria) -> Vec<&'a Task> {
    tasks.iter().filter(|t| matches(t, criteria)).collect()
}

fn open_tasks(tasks: &[Task]) -> impl Iterator<Item = &Task> {
    tasks.iter().filter(|t| !t.deleted && t.status.is_open())
}

pub fn get_inbox_tasks(tasks: &[Task]) -> Vec<&Task> {
    let criteria = ViewCriteria {
        statuses: vec![TaskStatus::Inbox],
        ..Default::default()
    };
    let mut result = filter_tasks(tasks, &criteria);
    result.sort_by(|a, b| by_order_index(a, b));
    result
}

fn full_due(task: &Task) -> &str {
    task.due_date.as_deref().unwrap_or(MAX_DATE)
}

/// Due today, starting today, or overdue. Overdue first, then by the full
/// due string (so a time of day orders same-day tasks; undated last), then
/// by order index.
pub fn get_today_tasks(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    let today = today_string(today);
    let is_overdue = |t: &Task| due_part(t).is_some_and(|d| d < today.as_str());

    let mut result: Vec<&Task> = open_tasks(tasks)
        .filter(|t| {
            due_part(t) == Some(today.as_str())
                || start_part(t) == Some(today.as_str())
                || is_overdue(*t)
        })
        .collect();

    result.sort_by(|a, b| {
        (!is_overdue(*a))
            .cmp(&!is_overdue(*b))
            .then_with(|| full_due(a).cmp(full_due(b)))
            .then_with(|| by_order_index(a, b))
    });
    result
}

/// Open tasks with a due or start date after today, earliest date first
pub fn get_upcoming_tasks(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    let today = today_string(today);
    let mut result: Vec<&Task> = open_tasks(tasks)
        .filter(|t| {
            due_part(t).is_some_and(|d| d > today.as_str())
                || start_part(t).is_some_and(|d| d > today.as_str())
        })
        .collect();

    let earliest = |t: &Task| -> String {
        match (due_part(t), start_part(t)) {
            (Some(d), Some(s)) => d.min(s).to_string(),
            (Some(d), None) => d.to_string(),
            (None, Some(s)) => s.to_string(),
            (None, None) => MAX_DATE.to_string(),
        }
    };
    result.sort_by_cached_key(|t| earliest(*t));
    result
}

/// Inbox or active tasks with no dates at all
pub fn get_anytime_tasks(tasks: &[Task]) -> Vec<&Task> {
    let mut result: Vec<&Task> = tasks
        .iter()
        .filter(|t| !t.deleted)
        .filter(|t| matches!(t.status, TaskStatus::Active | TaskStatus::Inbox))
        .filter(|t| t.due_date.is_none() && t.start_date.is_none())
        .collect();
    result.sort_by(|a, b| by_order_index(a, b));
    result
}

/// Most recently completed first, capped to `limit`
pub fn get_completed_tasks(tasks: &[Task], limit: usize) -> Vec<&Task> {
    let criteria = ViewCriteria {
        statuses: vec![TaskStatus::Completed],
        ..Default::default()
    };
    let mut result = filter_tasks(tasks, &criteria);
    result.sort_by(|a, b| {
        let a = a.completed_at.as_deref().unwrap_or("");
        let b = b.completed_at.as_deref().unwrap_or("");
        b.cmp(a)
    });
    result.truncate(limit);
    result
}

/// Open tasks past their due date, oldest first
pub fn get_overdue_tasks(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    let today = today_string(today);
    let mut result: Vec<&Task> = open_tasks(tasks)
        .filter(|t| due_part(t).is_some_and(|d| d < today.as_str()))
        .collect();
    result.sort_by(|a, b| {
        let a = a.due_date.as_deref().unwrap_or("");
        let b = b.due_date.as_deref().unwrap_or("");
        a.cmp(b)
    });
    result
}

pub fn get_project_tasks<'a>(tasks: &'a [Task], project_id: &str) -> Vec<&'a Task> {
    let mut result: Vec<&Task> = open_tasks(tasks)
        .filter(|t| t.project_id.as_deref() == Some(project_id))
        .collect();
    result.sort_by(|a, b| by_order_index(a, b));
    result
}

pub fn get_tag_tasks<'a>(tasks: &'a [Task], tag_id: &str) -> Vec<&'a Task> {
    let mut result: Vec<&Task> = open_tasks(tasks).filter(|t| t.has_tag(tag_id)).collect();
    result.sort_by(|a, b| by_order_index(a, b));
    result
}

/// Title/notes substring match with no status restriction
pub fn search_tasks<'a>(tasks: &'a [Task], query: &str) -> Vec<&'a Task> {
    let criteria = ViewCriteria {
        search_query: Some(query.to_string()),
        ..Default::default()
    };
    filter_tasks(tasks, &criteria)
}
