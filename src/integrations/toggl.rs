use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::{IntegrationError, Transport};

pub const TOGGL_API_BASE: &str = "https://api.track.toggl.com/api/v9";

/// Group name for entries without a project
pub const NO_PROJECT: &str = "No Project";

#[derive(Debug, Clone, PartialEq)]
pub struct TimeEntry {
    pub id: i64,
    pub description: Option<String>,
    /// Seconds; negative while the timer is running
    pub duration: i64,
    pub start: String,
    pub stop: Option<String>,
    pub project_id: Option<i64>,
    pub project_name: Option<String>,
}

impl TimeEntry {
    pub fn from_api(data: &Value) -> Result<Self, IntegrationError> {
        let field = |key: &str| data.get(key).filter(|v| !v.is_null());
        Ok(TimeEntry {
            id: field("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| IntegrationError::Malformed("missing time entry id".to_string()))?,
            description: field("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            duration: field("duration")
                .and_then(Value::as_i64)
                .ok_or_else(|| IntegrationError::Malformed("missing duration".to_string()))?,
            start: field("start")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| IntegrationError::Malformed("missing start".to_string()))?,
            stop: field("stop").and_then(Value::as_str).map(str::to_string),
            project_id: field("project_id").and_then(Value::as_i64),
            project_name: field("project_name")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    pub fn is_running(&self) -> bool {
        self.duration < 0
    }

    /// Completed duration in hours; zero for a running timer
    pub fn hours(&self) -> f64 {
        if self.is_running() {
            0.0
        } else {
            self.duration as f64 / 3600.0
        }
    }

    /// Hours since start for a running timer, else the recorded duration
    pub fn elapsed_hours(&self, now: DateTime<Utc>) -> f64 {
        if !self.is_running() {
            return self.hours();
        }
        DateTime::parse_from_rfc3339(&self.start)
            .map(|start| (now - start.with_timezone(&Utc)).num_seconds().max(0) as f64 / 3600.0)
            .unwrap_or(0.0)
    }

    pub fn project_label(&self) -> &str {
        self.project_name.as_deref().unwrap_or(NO_PROJECT)
    }

    pub fn day(&self) -> &str {
        self.start.get(..10).unwrap_or(&self.start)
    }
}

/// `1h 5m` / `42m`
pub fn format_hours(hours: f64) -> String {
    let total_minutes = (hours * 60.0).floor() as i64;
    let (h, m) = (total_minutes / 60, total_minutes % 60);
    if h > 0 {
        format!("{}h {}m", h, m)
    } else {
        format!("{}m", m)
    }
}

pub struct TogglClient<T: Transport> {
    transport: T,
    projects: Option<HashMap<i64, String>>,
}

impl<T: Transport> TogglClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            projects: None,
        }
    }

    /// Project id to name, fetched once and cached
    pub fn projects(&mut self) -> Result<&HashMap<i64, String>, IntegrationError> {
        if self.projects.is_none() {
            let body = self.transport.get_json("/me/projects", &[])?;
            let mut projects = HashMap::new();
            for project in body.as_array().into_iter().flatten() {
                if let (Some(id), Some(name)) = (
                    project.get("id").and_then(Value::as_i64),
                    project.get("name").and_then(Value::as_str),
                ) {
                    projects.insert(id, name.to_string());
                }
            }
            debug!(count = projects.len(), "fetched toggl projects");
            self.projects = Some(projects);
        }
        Ok(self.projects.get_or_insert_with(HashMap::new))
    }

    /// Entries between the start of `start` and the end of `end` (UTC),
    /// with project names attached and hidden projects removed
    pub fn time_entries(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        hidden_project_ids: &[i64],
    ) -> Result<Vec<TimeEntry>, IntegrationError> {
        let body = self.transport.get_json(
            "/me/time_entries",
            &[
                ("start_date", format!("{}T00:00:00Z", start.format("%Y-%m-%d"))),
                ("end_date", format!("{}T23:59:59Z", end.format("%Y-%m-%d"))),
                ("meta", "true".to_string()),
            ],
        )?;

        let projects = self.projects()?;
        let mut entries = Vec::new();
        for value in body.as_array().into_iter().flatten() {
            let mut entry = TimeEntry::from_api(value)?;
            if let Some(id) = entry.project_id {
                if hidden_project_ids.contains(&id) {
                    continue;
                }
                if let Some(name) = projects.get(&id) {
                    entry.project_name = Some(name.clone());
                }
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn validate_token(&self) -> bool {
        match self.transport.get_json("/me", &[]) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "toggl token validation failed");
                false
            }
        }
    }
}

/// Hours per `YYYY-MM-DD`, running timers excluded
pub fn duration_by_day(entries: &[TimeEntry]) -> BTreeMap<String, f64> {
    let mut by_day = BTreeMap::new();
    for entry in entries.iter().filter(|e| !e.is_running()) {
        *by_day.entry(entry.day().to_string()).or_insert(0.0) += entry.hours();
    }
    by_day
}

/// Hours per project name, running timers excluded
pub fn duration_by_project(entries: &[TimeEntry]) -> BTreeMap<String, f64> {
    let mut by_project = BTreeMap::new();
    for entry in entries.iter().filter(|e| !e.is_running()) {
        *by_project
            .entry(entry.project_label().to_string())
            .or_insert(0.0) += entry.hours();
    }
    by_project
}

pub fn group_by_project(entries: &[TimeEntry]) -> BTreeMap<String, Vec<&TimeEntry>> {
    let mut grouped: BTreeMap<String, Vec<&TimeEntry>> = BTreeMap::new();
    for entry in entries {
        grouped
            .entry(entry.project_label().to_string())
            .or_default()
            .push(entry);
    }
    grouped
}

pub fn running_entry(entries: &[TimeEntry]) -> Option<&TimeEntry> {
    entries.iter().find(|e| e.is_running())
}

/// Completed hours on one day
pub fn total_hours_on(entries: &[TimeEntry], day: NaiveDate) -> f64 {
    let day = day.format("%Y-%m-%d").to_string();
    entries
        .iter()
        .filter(|e| e.day() == day)
        .map(TimeEntry::hours)
        .sum()
}
