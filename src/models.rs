use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: i64 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Closed string-coded enums. `as_str` and `FromStr` are the storage codec,
/// serde uses the same lowercase strings for the snapshot blob.
macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError { kind: $label, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Inbox,
    Active,
    Scheduled,
    Completed,
    Cancelled,
}

string_enum!(TaskStatus, "status", {
    Inbox => "inbox",
    Active => "active",
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl TaskStatus {
    /// Neither completed nor cancelled
    pub fn is_open(&self) -> bool {
        !matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

string_enum!(TaskPriority, "priority", {
    None => "none",
    Low => "low",
    Medium => "medium",
    High => "high",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Task,
    Bug,
    Feature,
    Chore,
}

string_enum!(TaskKind, "kind", {
    Task => "task",
    Bug => "bug",
    Feature => "feature",
    Chore => "chore",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSize {
    Xs,
    S,
    M,
    L,
}

string_enum!(TaskSize, "size", {
    Xs => "xs",
    S => "s",
    M => "m",
    L => "l",
});

/// Open metadata bag carried on tasks
pub type Metadata = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: String,
    #[serde(default, alias = "updated_at")]
    pub updated_at: String,
    #[serde(default, alias = "due_date")]
    pub due_date: Option<String>,
    #[serde(default, alias = "start_date")]
    pub start_date: Option<String>,
    #[serde(default, alias = "completed_at")]
    pub completed_at: Option<String>,
    #[serde(default, alias = "project_id")]
    pub project_id: Option<String>,
    #[serde(default, alias = "section_id")]
    pub section_id: Option<String>,
    #[serde(default, alias = "parent_task_id")]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, alias = "repeat_rule")]
    pub repeat_rule: Option<String>,
    #[serde(default, alias = "order_index")]
    pub order_index: f64,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub kind: Option<TaskKind>,
    #[serde(default)]
    pub size: Option<TaskSize>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default, alias = "context_url")]
    pub context_url: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Task {
    /// A bare task with every optional field absent. Ids and stamps are
    /// normally assigned by the mutation service.
    pub fn new(id: String, title: String, now: String) -> Self {
        Self {
            id,
            title,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
            due_date: None,
            start_date: None,
            completed_at: None,
            project_id: None,
            section_id: None,
            parent_task_id: None,
            priority: TaskPriority::None,
            tags: Vec::new(),
            status: TaskStatus::Inbox,
            repeat_rule: None,
            order_index: 0.0,
            deleted: false,
            kind: None,
            size: None,
            assignee: None,
            context_url: None,
            metadata: Metadata::new(),
        }
    }

    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tags.iter().any(|t| t == tag_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, alias = "order_index")]
    pub order_index: f64,
    #[serde(default, alias = "is_inbox")]
    pub is_inbox: bool,
    #[serde(default, alias = "created_at")]
    pub created_at: String,
    #[serde(default, alias = "updated_at")]
    pub updated_at: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default, alias = "project_id")]
    pub project_id: String,
    pub name: String,
    #[serde(default, alias = "order_index")]
    pub order_index: f64,
    #[serde(default, alias = "created_at")]
    pub created_at: String,
    #[serde(default, alias = "updated_at")]
    pub updated_at: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: String,
    #[serde(default, alias = "updated_at")]
    pub updated_at: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    #[serde(default, alias = "task_id")]
    pub task_id: String,
    pub at: String,
    #[serde(default, alias = "created_at")]
    pub created_at: String,
    #[serde(default, alias = "updated_at")]
    pub updated_at: String,
    #[serde(default, alias = "cancelled_at")]
    pub cancelled_at: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// Complete point-in-time set of all entities; the unit of save and load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
    #[serde(default)]
    pub sections: BTreeMap<String, Section>,
    #[serde(default)]
    pub tags: BTreeMap<String, Tag>,
    #[serde(default)]
    pub reminders: BTreeMap<String, Reminder>,
    #[serde(default = "default_version")]
    pub version: i64,
}

fn default_version() -> i64 {
    SNAPSHOT_VERSION
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl StateSnapshot {
    pub fn empty() -> Self {
        Self {
            tasks: BTreeMap::new(),
            projects: BTreeMap::new(),
            sections: BTreeMap::new(),
            tags: BTreeMap::new(),
            reminders: BTreeMap::new(),
            version: SNAPSHOT_VERSION,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            && self.projects.is_empty()
            && self.sections.is_empty()
            && self.tags.is_empty()
            && self.reminders.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn full_task() -> Task {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), serde_json::json!("github"));
        metadata.insert("estimate".to_string(), serde_json::json!(3));
        Task {
            id: "t-1".to_string(),
            title: "Write report".to_string(),
            notes: Some("quarterly numbers".to_string()),
            created_at: "2024-03-01T09:00:00.000000".to_string(),
            updated_at: "2024-03-02T10:30:00.000000".to_string(),
            due_date: Some("2024-03-10".to_string()),
            start_date: Some("2024-03-05".to_string()),
            completed_at: Some("2024-03-09T17:00:00.000000".to_string()),
            project_id: Some("p-1".to_string()),
            section_id: Some("s-1".to_string()),
            parent_task_id: Some("t-0".to_string()),
            priority: TaskPriority::High,
            tags: vec!["tag-a".to_string(), "tag-b".to_string()],
            status: TaskStatus::Completed,
            repeat_rule: Some("FREQ=WEEKLY".to_string()),
            order_index: 2.5,
            deleted: false,
            kind: Some(TaskKind::Feature),
            size: Some(TaskSize::Xs),
            assignee: Some("me".to_string()),
            context_url: Some("https://example.com/issue/1".to_string()),
            metadata,
        }
    }

    #[test]
    fn test_task_round_trip_with_every_field() {
        let task = full_task();
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_task_round_trip_with_no_optional_fields() {
        let task = Task::new("t-2".to_string(), "Bare".to_string(), "2024-01-01T00:00:00".to_string());
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_task_transport_uses_camel_case() {
        let value = serde_json::to_value(full_task()).unwrap();
        assert_eq!(value["dueDate"], "2024-03-10");
        assert_eq!(value["orderIndex"], 2.5);
        assert_eq!(value["parentTaskId"], "t-0");
        assert_eq!(value["kind"], "feature");
        assert_eq!(value["size"], "xs");
        assert!(value.get("due_date").is_none());
    }

    #[test]
    fn test_task_accepts_snake_case_and_defaults() {
        let json = r#"{"id":"x","title":"Old","due_date":"2024-05-01","order_index":4.0,"project_id":"p"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.due_date.as_deref(), Some("2024-05-01"));
        assert_eq!(task.order_index, 4.0);
        assert_eq!(task.project_id.as_deref(), Some("p"));
        assert_eq!(task.status, TaskStatus::Inbox);
        assert_eq!(task.priority, TaskPriority::None);
        assert!(task.tags.is_empty());
        assert!(task.metadata.is_empty());
        assert_eq!(task.created_at, "");
    }

    #[test]
    fn test_enum_codecs() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), *status);
        }
        for size in TaskSize::ALL {
            assert_eq!(size.as_str().parse::<TaskSize>().unwrap(), *size);
        }
        assert_eq!(
            "urgent".parse::<TaskPriority>(),
            Err(ParseEnumError { kind: "priority", value: "urgent".to_string() })
        );
    }

    #[test]
    fn test_project_section_tag_reminder_round_trip() {
        let project = Project {
            id: "p-1".to_string(),
            name: "Home".to_string(),
            description: None,
            color: Some("blue".to_string()),
            icon: Some("house".to_string()),
            order_index: 1.0,
            is_inbox: true,
            created_at: "a".to_string(),
            updated_at: "b".to_string(),
            deleted: false,
        };
        let section = Section {
            id: "s-1".to_string(),
            project_id: "p-1".to_string(),
            name: "Kitchen".to_string(),
            order_index: 3.0,
            created_at: "a".to_string(),
            updated_at: "b".to_string(),
            deleted: true,
        };
        let tag = Tag {
            id: "g-1".to_string(),
            name: "errand".to_string(),
            color: None,
            created_at: "a".to_string(),
            updated_at: "b".to_string(),
            deleted: false,
        };
        let reminder = Reminder {
            id: "r-1".to_string(),
            task_id: "t-1".to_string(),
            at: "2024-03-10T08:00:00".to_string(),
            created_at: "a".to_string(),
            updated_at: "b".to_string(),
            cancelled_at: Some("2024-03-09T08:00:00".to_string()),
            deleted: false,
        };

        let p: Project = serde_json::from_str(&serde_json::to_string(&project).unwrap()).unwrap();
        let s: Section = serde_json::from_str(&serde_json::to_string(&section).unwrap()).unwrap();
        let g: Tag = serde_json::from_str(&serde_json::to_string(&tag).unwrap()).unwrap();
        let r: Reminder = serde_json::from_str(&serde_json::to_string(&reminder).unwrap()).unwrap();
        assert_eq!(p, project);
        assert_eq!(s, section);
        assert_eq!(g, tag);
        assert_eq!(r, reminder);
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let mut snapshot = StateSnapshot::empty();
        let task = full_task();
        snapshot.tasks.insert(task.id.clone(), task);
        let json = snapshot.to_json().unwrap();
        assert_eq!(StateSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_snapshot_missing_groups_default() {
        let snapshot = StateSnapshot::from_json("{}").unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    }
}
