//! Weekly-review helpers: overdue work, stale projects and unfiled tasks.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashSet;

use crate::filters::get_overdue_tasks;
use crate::models::{Project, Task, TaskStatus};
use crate::service::parse_timestamp;

/// Days without activity before a project counts as stale
pub const STALE_PROJECT_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct StaleProject<'a> {
    pub project: &'a Project,
    /// Latest stamp among the project's open tasks. `None` when the project
    /// has no open tasks.
    pub last_activity: Option<NaiveDateTime>,
}

/// Non-inbox projects whose open tasks have not been touched within
/// `days_threshold` days of `now`. A project with no open tasks is judged by
/// its own creation stamp; an unreadable stamp counts as stale.
pub fn stale_projects<'a>(
    projects: &'a [Project],
    tasks: &[Task],
    now: NaiveDateTime,
    days_threshold: i64,
) -> Vec<StaleProject<'a>> {
    let threshold = now - Duration::days(days_threshold);

    projects
        .iter()
        .filter(|p| !p.deleted && !p.is_inbox)
        .filter_map(|project| {
            let open: Vec<&Task> = tasks
                .iter()
                .filter(|t| {
                    !t.deleted
                        && t.status.is_open()
                        && t.project_id.as_deref() == Some(project.id.as_str())
                })
                .collect();

            if open.is_empty() {
                let stale = parse_timestamp(&project.created_at).is_none_or(|created| created < threshold);
                return stale.then_some(StaleProject {
                    project,
                    last_activity: None,
                });
            }

            let last_activity = open
                .iter()
                .flat_map(|t| [t.updated_at.as_str(), t.created_at.as_str()])
                .filter_map(parse_timestamp)
                .max()?;

            (last_activity < threshold).then_some(StaleProject {
                project,
                last_activity: Some(last_activity),
            })
        })
        .collect()
}

/// Open, filed-out-of-inbox tasks with no project, by order index
pub fn tasks_without_project(tasks: &[Task]) -> Vec<&Task> {
    let mut orphans: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            !t.deleted && t.status.is_open() && t.status != TaskStatus::Inbox && t.project_id.is_none()
        })
        .collect();
    orphans.sort_by(|a, b| a.order_index.total_cmp(&b.order_index));
    orphans
}

/// Overdue tasks followed by tasks without a project, each task once
pub fn tasks_needing_review(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    let mut seen = HashSet::new();
    get_overdue_tasks(tasks, today)
        .into_iter()
        .chain(tasks_without_project(tasks))
        .filter(|t| seen.insert(t.id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn project(id: &str, created_at: &str) -> Project {
        Project {
            id: id.to_string(),
            name: id.to_uppercase(),
            description: None,
            color: None,
            icon: None,
            order_index: 0.0,
            is_inbox: false,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
            deleted: false,
        }
    }

    fn task(id: &str, project: Option<&str>, status: TaskStatus, stamp: &str) -> Task {
        let mut t = Task::new(id.to_string(), id.to_string(), stamp.to_string());
        t.project_id = project.map(str::to_string);
        t.status = status;
        t
    }

    #[test]
    fn test_stale_projects() {
        let mut inbox = project("inbox", "2020-01-01T00:00:00.000000");
        inbox.is_inbox = true;
        let projects = vec![
            project("old-empty", "2024-05-01T00:00:00.000000"),
            project("new-empty", "2024-06-14T00:00:00.000000"),
            project("bad-stamp", "yesterday"),
            project("quiet", "2024-01-01T00:00:00.000000"),
            project("busy", "2024-01-01T00:00:00.000000"),
            inbox,
        ];
        let tasks = vec![
            task("q", Some("quiet"), TaskStatus::Active, "2024-06-01T08:00:00.000000"),
            task("b", Some("busy"), TaskStatus::Active, "2024-06-01T08:00:00.000000"),
            Task {
                updated_at: "2024-06-14T08:00:00.000000".to_string(),
                ..task("b2", Some("busy"), TaskStatus::Inbox, "2024-06-01T08:00:00.000000")
            },
            task("done", Some("new-empty"), TaskStatus::Completed, "2024-06-14T00:00:00.000000"),
        ];

        let stale = stale_projects(&projects, &tasks, now(), STALE_PROJECT_DAYS);
        let ids: Vec<&str> = stale.iter().map(|s| s.project.id.as_str()).collect();
        assert_eq!(ids, vec!["old-empty", "bad-stamp", "quiet"]);
        assert_eq!(stale[0].last_activity, None);
        assert_eq!(
            stale[2].last_activity,
            parse_timestamp("2024-06-01T08:00:00.000000")
        );
    }

    #[test]
    fn test_tasks_without_project() {
        let mut a = task("a", None, TaskStatus::Active, "");
        a.order_index = 2.0;
        let mut b = task("b", None, TaskStatus::Scheduled, "");
        b.order_index = 1.0;
        let tasks = vec![
            a,
            b,
            task("inbox", None, TaskStatus::Inbox, ""),
            task("filed", Some("p"), TaskStatus::Active, ""),
            task("done", None, TaskStatus::Completed, ""),
        ];
        let ids: Vec<&str> = tasks_without_project(&tasks).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_tasks_needing_review_deduplicates() {
        let mut overdue_orphan = task("x", None, TaskStatus::Active, "");
        overdue_orphan.due_date = Some("2024-06-01".to_string());
        let mut overdue_filed = task("y", Some("p"), TaskStatus::Inbox, "");
        overdue_filed.due_date = Some("2024-06-10".to_string());
        let orphan = task("z", None, TaskStatus::Active, "");
        let tasks = vec![orphan, overdue_filed, overdue_orphan];

        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let ids: Vec<&str> = tasks_needing_review(&tasks, today)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }
}
