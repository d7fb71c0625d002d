//! Mutation service: the only place entity state transitions happen.
//!
//! Every operation takes an entity by reference and returns a new value with
//! `updated_at` refreshed. Nothing is ever removed; deletion sets `deleted`.

use chrono::{Duration, Local, NaiveDateTime};
use thiserror::Error;
use tracing::debug;

use crate::models::{
    Metadata, Project, Reminder, Section, Tag, Task, TaskKind, TaskPriority, TaskSize, TaskStatus,
};
use crate::ordering;
use crate::utils::parse_date;

/// Stored timestamp format (local time, microsecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Title cannot be empty")]
    EmptyTitle,
    #[error("Invalid {field} '{value}': expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },
}

/// Source of the current instant
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored stamp. Offsets are dropped so stamps from other writers
/// compare as wall-clock times.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

fn validate_title(title: &str) -> Result<(), ServiceError> {
    if title.trim().is_empty() {
        return Err(ServiceError::EmptyTitle);
    }
    Ok(())
}

/// Accept `YYYY-MM-DD` or any longer ISO string whose date part is valid
fn validate_date(field: &'static str, value: Option<&str>) -> Result<(), ServiceError> {
    let Some(value) = value else {
        return Ok(());
    };
    let valid = value
        .get(..10)
        .is_some_and(|day| parse_date(day).is_ok());
    if !valid {
        return Err(ServiceError::InvalidDate {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Field values for a new task. Unset fields take their neutral defaults.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub notes: Option<String>,
    pub project_id: Option<String>,
    pub section_id: Option<String>,
    pub parent_task_id: Option<String>,
    pub due_date: Option<String>,
    pub start_date: Option<String>,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub status: TaskStatus,
    pub kind: Option<TaskKind>,
    pub size: Option<TaskSize>,
    pub assignee: Option<String>,
    pub context_url: Option<String>,
    pub order_index: f64,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_inbox: bool,
    pub order_index: f64,
}

/// Sparse task update. `None` leaves a field alone; for clearable fields
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub notes: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
    pub start_date: Option<Option<String>>,
    pub completed_at: Option<Option<String>>,
    pub project_id: Option<Option<String>>,
    pub section_id: Option<Option<String>>,
    pub parent_task_id: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub tags: Option<Vec<String>>,
    pub status: Option<TaskStatus>,
    pub repeat_rule: Option<Option<String>>,
    pub order_index: Option<f64>,
    pub deleted: Option<bool>,
    pub kind: Option<Option<TaskKind>>,
    pub size: Option<Option<TaskSize>>,
    pub assignee: Option<Option<String>>,
    pub context_url: Option<Option<String>>,
    pub metadata: Option<Metadata>,
}

impl TaskPatch {
    fn validate(&self) -> Result<(), ServiceError> {
        if let Some(ref title) = self.title {
            validate_title(title)?;
        }
        if let Some(ref due) = self.due_date {
            validate_date("due date", due.as_deref())?;
        }
        if let Some(ref start) = self.start_date {
            validate_date("start date", start.as_deref())?;
        }
        Ok(())
    }

    fn apply(self, task: &mut Task) {
        if let Some(v) = self.title {
            task.title = v;
        }
        if let Some(v) = self.notes {
            task.notes = v;
        }
        if let Some(v) = self.due_date {
            task.due_date = v;
        }
        if let Some(v) = self.start_date {
            task.start_date = v;
        }
        if let Some(v) = self.completed_at {
            task.completed_at = v;
        }
        if let Some(v) = self.project_id {
            task.project_id = v;
        }
        if let Some(v) = self.section_id {
            task.section_id = v;
        }
        if let Some(v) = self.parent_task_id {
            task.parent_task_id = v;
        }
        if let Some(v) = self.priority {
            task.priority = v;
        }
        if let Some(v) = self.tags {
            task.tags = v;
        }
        if let Some(v) = self.status {
            task.status = v;
        }
        if let Some(v) = self.repeat_rule {
            task.repeat_rule = v;
        }
        if let Some(v) = self.order_index {
            task.order_index = v;
        }
        if let Some(v) = self.deleted {
            task.deleted = v;
        }
        if let Some(v) = self.kind {
            task.kind = v;
        }
        if let Some(v) = self.size {
            task.size = v;
        }
        if let Some(v) = self.assignee {
            task.assignee = v;
        }
        if let Some(v) = self.context_url {
            task.context_url = v;
        }
        if let Some(v) = self.metadata {
            task.metadata = v;
        }
    }
}

pub struct TaskService<C: Clock = SystemClock> {
    clock: C,
}

impl Default for TaskService<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> TaskService<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn now(&self) -> String {
        format_timestamp(self.clock.now())
    }

    /// A stamp strictly later than `previous`. When the clock has not moved
    /// past it, one microsecond is added to `previous`.
    fn stamp_after(&self, previous: &str) -> String {
        let now = self.clock.now();
        match parse_timestamp(previous) {
            Some(prev) if now <= prev => format_timestamp(prev + Duration::microseconds(1)),
            _ => format_timestamp(now),
        }
    }

    pub fn create_task(&self, fields: NewTask) -> Result<Task, ServiceError> {
        validate_title(&fields.title)?;
        validate_date("due date", fields.due_date.as_deref())?;
        validate_date("start date", fields.start_date.as_deref())?;

        let mut task = Task::new(generate_id(), fields.title, self.now());
        task.notes = fields.notes;
        task.project_id = fields.project_id;
        task.section_id = fields.section_id;
        task.parent_task_id = fields.parent_task_id;
        task.due_date = fields.due_date;
        task.start_date = fields.start_date;
        task.priority = fields.priority;
        task.tags = fields.tags;
        task.status = fields.status;
        task.kind = fields.kind;
        task.size = fields.size;
        task.assignee = fields.assignee;
        task.context_url = fields.context_url;
        task.order_index = fields.order_index;
        if task.status == TaskStatus::Completed {
            task.completed_at = Some(task.created_at.clone());
        }
        debug!(task_id = %task.id, "created task");
        Ok(task)
    }

    /// Apply a patch and refresh `updated_at`. A completed result always has
    /// `completed_at`; leaving completed clears it unless the patch sets it.
    pub fn update_task(&self, task: &Task, patch: TaskPatch) -> Result<Task, ServiceError> {
        patch.validate()?;
        let sets_completed_at = patch.completed_at.is_some();
        let mut updated = task.clone();
        patch.apply(&mut updated);
        updated.updated_at = self.stamp_after(&task.updated_at);

        if updated.status == TaskStatus::Completed {
            if updated.completed_at.is_none() {
                updated.completed_at = Some(updated.updated_at.clone());
            }
        } else if task.status == TaskStatus::Completed && !sets_completed_at {
            updated.completed_at = None;
        }
        Ok(updated)
    }

    pub fn complete_task(&self, task: &Task) -> Task {
        let mut updated = task.clone();
        updated.status = TaskStatus::Completed;
        updated.updated_at = self.stamp_after(&task.updated_at);
        updated.completed_at = Some(updated.updated_at.clone());
        updated
    }

    pub fn uncomplete_task(&self, task: &Task) -> Task {
        let mut updated = task.clone();
        updated.status = TaskStatus::Inbox;
        updated.completed_at = None;
        updated.updated_at = self.stamp_after(&task.updated_at);
        updated
    }

    pub fn toggle_completed(&self, task: &Task) -> Task {
        if task.status == TaskStatus::Completed {
            self.uncomplete_task(task)
        } else {
            self.complete_task(task)
        }
    }

    /// Soft delete. The caller removes the task from any lookups it keeps.
    pub fn delete_task(&self, task: &Task) -> Task {
        let mut updated = task.clone();
        updated.deleted = true;
        updated.updated_at = self.stamp_after(&task.updated_at);
        debug!(task_id = %task.id, "soft-deleted task");
        updated
    }

    /// Re-index a task between two neighbours in the current view
    pub fn move_task(&self, task: &Task, before: Option<&Task>, after: Option<&Task>) -> Task {
        let mut updated = task.clone();
        updated.order_index = ordering::between(
            before.map(|t| t.order_index),
            after.map(|t| t.order_index),
        );
        updated.updated_at = self.stamp_after(&task.updated_at);
        updated
    }

    pub fn create_project(&self, fields: NewProject) -> Result<Project, ServiceError> {
        validate_title(&fields.name)?;
        let now = self.now();
        Ok(Project {
            id: generate_id(),
            name: fields.name,
            description: fields.description,
            color: fields.color,
            icon: fields.icon,
            order_index: fields.order_index,
            is_inbox: fields.is_inbox,
            created_at: now.clone(),
            updated_at: now,
            deleted: false,
        })
    }

    pub fn rename_project(&self, project: &Project, name: &str) -> Result<Project, ServiceError> {
        validate_title(name)?;
        let mut updated = project.clone();
        updated.name = name.to_string();
        updated.updated_at = self.stamp_after(&project.updated_at);
        Ok(updated)
    }

    /// Soft delete. Tasks keep their `project_id`.
    pub fn delete_project(&self, project: &Project) -> Project {
        let mut updated = project.clone();
        updated.deleted = true;
        updated.updated_at = self.stamp_after(&project.updated_at);
        updated
    }

    pub fn create_section(&self, project_id: &str, name: &str, order_index: f64) -> Result<Section, ServiceError> {
        validate_title(name)?;
        let now = self.now();
        Ok(Section {
            id: generate_id(),
            project_id: project_id.to_string(),
            name: name.to_string(),
            order_index,
            created_at: now.clone(),
            updated_at: now,
            deleted: false,
        })
    }

    pub fn create_tag(&self, name: &str, color: Option<String>) -> Result<Tag, ServiceError> {
        validate_title(name)?;
        let now = self.now();
        Ok(Tag {
            id: generate_id(),
            name: name.trim().to_string(),
            color,
            created_at: now.clone(),
            updated_at: now,
            deleted: false,
        })
    }

    /// Soft delete. Tasks keep the tag id in their tag list.
    pub fn delete_tag(&self, tag: &Tag) -> Tag {
        let mut updated = tag.clone();
        updated.deleted = true;
        updated.updated_at = self.stamp_after(&tag.updated_at);
        updated
    }

    pub fn create_reminder(&self, task_id: &str, at: &str) -> Reminder {
        let now = self.now();
        Reminder {
            id: generate_id(),
            task_id: task_id.to_string(),
            at: at.to_string(),
            created_at: now.clone(),
            updated_at: now,
            cancelled_at: None,
            deleted: false,
        }
    }

    pub fn cancel_reminder(&self, reminder: &Reminder) -> Reminder {
        let mut updated = reminder.clone();
        updated.updated_at = self.stamp_after(&reminder.updated_at);
        updated.cancelled_at = Some(updated.updated_at.clone());
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    /// Clock that stays put until advanced
    struct ManualClock {
        now: Cell<NaiveDateTime>,
    }

    impl ManualClock {
        fn at(y: i32, m: u32, d: u32) -> Self {
            let start = NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap();
            Self { now: Cell::new(start) }
        }
    }

    impl Clock for &ManualClock {
        fn now(&self) -> NaiveDateTime {
            self.now.get()
        }
    }

    fn service(clock: &ManualClock) -> TaskService<&ManualClock> {
        TaskService::new(clock)
    }

    #[test]
    fn test_create_task_defaults() {
        let clock = ManualClock::at(2024, 6, 15);
        let task = service(&clock).create_task(NewTask::titled("Buy milk")).unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.created_at, task.updated_at);
        assert_eq!(task.created_at, "2024-06-15T09:00:00.000000");
        assert_eq!(task.status, TaskStatus::Inbox);
        assert_eq!(task.priority, TaskPriority::None);
        assert_eq!(task.kind, None);
        assert!(!task.deleted);
        assert!(uuid::Uuid::parse_str(&task.id).is_ok());
    }

    #[test]
    fn test_create_task_ids_unique() {
        let svc = TaskService::default();
        let a = svc.create_task(NewTask::titled("a")).unwrap();
        let b = svc.create_task(NewTask::titled("b")).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_create_task_rejects_empty_title_and_bad_dates() {
        let svc = TaskService::default();
        assert_eq!(svc.create_task(NewTask::titled("   ")).unwrap_err(), ServiceError::EmptyTitle);

        let bad = NewTask {
            due_date: Some("2024-13-01".to_string()),
            ..NewTask::titled("x")
        };
        assert!(matches!(svc.create_task(bad), Err(ServiceError::InvalidDate { .. })));

        let short = NewTask {
            start_date: Some("tomorrow".to_string()),
            ..NewTask::titled("x")
        };
        assert!(matches!(svc.create_task(short), Err(ServiceError::InvalidDate { .. })));

        let full = NewTask {
            due_date: Some("2024-06-15T10:00:00+02:00".to_string()),
            ..NewTask::titled("x")
        };
        assert!(svc.create_task(full).is_ok());
    }

    #[test]
    fn test_toggle_twice_returns_to_inbox_with_increasing_stamps() {
        let clock = ManualClock::at(2024, 6, 15);
        let svc = service(&clock);
        let task = svc.create_task(NewTask::titled("Toggle me")).unwrap();

        let done = svc.toggle_completed(&task);
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(done.updated_at > task.updated_at);

        let undone = svc.toggle_completed(&done);
        assert_eq!(undone.status, TaskStatus::Inbox);
        assert_eq!(undone.completed_at, None);
        assert!(undone.updated_at > done.updated_at);
        assert_eq!(undone.created_at, task.created_at);
    }

    #[test]
    fn test_stamp_uses_clock_when_it_moved() {
        let clock = ManualClock::at(2024, 6, 15);
        let svc = service(&clock);
        let task = svc.create_task(NewTask::titled("x")).unwrap();
        clock.now.set(clock.now.get() + Duration::hours(2));
        let done = svc.complete_task(&task);
        assert_eq!(done.updated_at, "2024-06-15T11:00:00.000000");
        assert_eq!(done.completed_at.as_deref(), Some("2024-06-15T11:00:00.000000"));
    }

    #[test]
    fn test_update_task_applies_patch_only() {
        let clock = ManualClock::at(2024, 6, 15);
        let svc = service(&clock);
        let task = svc
            .create_task(NewTask {
                notes: Some("keep".to_string()),
                due_date: Some("2024-06-20".to_string()),
                ..NewTask::titled("Original")
            })
            .unwrap();

        let patch = TaskPatch {
            title: Some("Renamed".to_string()),
            due_date: Some(None),
            priority: Some(TaskPriority::High),
            size: Some(Some(TaskSize::L)),
            ..Default::default()
        };
        let updated = svc.update_task(&task, patch).unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.notes.as_deref(), Some("keep"));
        assert_eq!(updated.due_date, None);
        assert_eq!(updated.priority, TaskPriority::High);
        assert_eq!(updated.size, Some(TaskSize::L));
        assert!(updated.updated_at > task.updated_at);
        assert_eq!(task.title, "Original");
    }

    #[test]
    fn test_update_task_keeps_completed_at_in_step_with_status() {
        let clock = ManualClock::at(2024, 6, 15);
        let svc = service(&clock);
        let task = svc.create_task(NewTask::titled("Report")).unwrap();

        let completed = svc
            .update_task(
                &task,
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
        assert_eq!(completed.completed_at.as_deref(), Some(completed.updated_at.as_str()));

        // An explicit stamp is kept
        let backdated = svc
            .update_task(
                &task,
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    completed_at: Some(Some("2024-06-01T08:00:00.000000".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(backdated.completed_at.as_deref(), Some("2024-06-01T08:00:00.000000"));

        let reopened = svc
            .update_task(
                &completed,
                TaskPatch {
                    status: Some(TaskStatus::Active),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(reopened.status, TaskStatus::Active);
        assert_eq!(reopened.completed_at, None);

        let renamed = svc
            .update_task(
                &completed,
                TaskPatch {
                    title: Some("Final report".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.completed_at, completed.completed_at);
    }

    #[test]
    fn test_update_task_validates_patch() {
        let svc = TaskService::default();
        let task = svc.create_task(NewTask::titled("x")).unwrap();
        let patch = TaskPatch {
            start_date: Some(Some("15/06/2024".to_string())),
            ..Default::default()
        };
        assert!(svc.update_task(&task, patch).is_err());
    }

    #[test]
    fn test_delete_is_idempotent_and_keeps_fields() {
        let clock = ManualClock::at(2024, 6, 15);
        let svc = service(&clock);
        let task = svc
            .create_task(NewTask {
                project_id: Some("p".to_string()),
                tags: vec!["g".to_string()],
                ..NewTask::titled("Gone")
            })
            .unwrap();
        let once = svc.delete_task(&task);
        let twice = svc.delete_task(&once);
        assert!(once.deleted && twice.deleted);
        assert_eq!(twice.title, "Gone");
        assert_eq!(twice.project_id.as_deref(), Some("p"));
        assert_eq!(twice.tags, vec!["g".to_string()]);
        assert!(twice.updated_at > once.updated_at);
    }

    #[test]
    fn test_move_task_between_neighbours() {
        let svc = TaskService::default();
        let mk = |i: f64| Task {
            order_index: i,
            ..svc.create_task(NewTask::titled("t")).unwrap()
        };
        let (a, b, moving) = (mk(1.0), mk(2.0), mk(9.0));
        assert_eq!(svc.move_task(&moving, Some(&a), Some(&b)).order_index, 1.5);
        assert_eq!(svc.move_task(&moving, None, Some(&a)).order_index, 0.5);
        assert_eq!(svc.move_task(&moving, Some(&b), None).order_index, 3.0);
    }

    #[test]
    fn test_projects_tags_sections_reminders() {
        let clock = ManualClock::at(2024, 6, 15);
        let svc = service(&clock);
        let project = svc
            .create_project(NewProject {
                name: "Home".to_string(),
                is_inbox: true,
                ..Default::default()
            })
            .unwrap();
        assert!(project.is_inbox);
        assert_eq!(project.created_at, project.updated_at);
        assert!(svc.delete_project(&project).deleted);
        assert_eq!(svc.rename_project(&project, "House").unwrap().name, "House");

        let tag = svc.create_tag("  errand ", None).unwrap();
        assert_eq!(tag.name, "errand");
        assert!(svc.delete_tag(&tag).deleted);
        assert!(svc.create_tag("", None).is_err());

        let section = svc.create_section(&project.id, "Kitchen", 1.0).unwrap();
        assert_eq!(section.project_id, project.id);

        let reminder = svc.create_reminder("t-1", "2024-06-16T08:00:00");
        let cancelled = svc.cancel_reminder(&reminder);
        assert!(cancelled.cancelled_at.is_some());
        assert!(cancelled.updated_at > reminder.updated_at);
    }
}
