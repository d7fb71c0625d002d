use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{
    Metadata, ParseEnumError, Project, Reminder, Section, StateSnapshot, Tag, Task, SNAPSHOT_VERSION,
};

/// Key of the serialized snapshot row in the `metadata` table
const SNAPSHOT_KEY: &str = "snapshot";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Failed to serialize snapshot: {0}")]
    SerializeError(#[from] serde_json::Error),
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database and initialize the schema
    pub fn new(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
        }

        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.initialize_schema()?;
        info!(path = %path.display(), "opened database");
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes).
    /// References between tables are weak, so there are no foreign keys.
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                notes           TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                due_date        TEXT,
                start_date      TEXT,
                completed_at    TEXT,
                project_id      TEXT,
                section_id      TEXT,
                parent_task_id  TEXT,
                priority        TEXT NOT NULL DEFAULT 'none',
                status          TEXT NOT NULL DEFAULT 'inbox',
                repeat_rule     TEXT,
                order_index     REAL NOT NULL DEFAULT 0,
                deleted         INTEGER NOT NULL DEFAULT 0,
                kind            TEXT,
                size            TEXT,
                assignee        TEXT,
                context_url     TEXT,
                metadata        TEXT
            );

            CREATE TABLE IF NOT EXISTS projects (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                description     TEXT,
                color           TEXT,
                icon            TEXT,
                order_index     REAL NOT NULL DEFAULT 0,
                is_inbox        INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                deleted         INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS sections (
                id              TEXT PRIMARY KEY,
                project_id      TEXT NOT NULL,
                name            TEXT NOT NULL,
                order_index     REAL NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                deleted         INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS tags (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                color           TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                deleted         INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS task_tags (
                task_id         TEXT NOT NULL,
                tag_id          TEXT NOT NULL,
                PRIMARY KEY (task_id, tag_id)
            );

            CREATE TABLE IF NOT EXISTS reminders (
                id              TEXT PRIMARY KEY,
                task_id         TEXT NOT NULL,
                at              TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                cancelled_at    TEXT,
                deleted         INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS metadata (
                key             TEXT PRIMARY KEY,
                value           TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date);
            CREATE INDEX IF NOT EXISTS idx_task_tags_tag ON task_tags(tag_id);",
        )?;
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Load the snapshot, preferring the serialized blob and falling back to
    /// the normalized tables when the blob is missing or unreadable.
    pub fn load_snapshot(&self) -> Result<StateSnapshot, DatabaseError> {
        if let Some(snapshot) = self.load_snapshot_blob()? {
            debug!(tasks = snapshot.tasks.len(), "loaded snapshot from blob");
            return Ok(snapshot);
        }
        let snapshot = self.load_snapshot_from_tables()?;
        debug!(tasks = snapshot.tasks.len(), "loaded snapshot from tables");
        Ok(snapshot)
    }

    /// Read the serialized snapshot row. A missing, empty or corrupt blob is
    /// `Ok(None)`; only SQLite failures are errors.
    pub fn load_snapshot_blob(&self) -> Result<Option<StateSnapshot>, DatabaseError> {
        let value: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [SNAPSHOT_KEY],
                |row| row.get(0),
            )
            .optional()?;

        let Some(json) = value.flatten().filter(|v| !v.is_empty()) else {
            return Ok(None);
        };

        match StateSnapshot::from_json(&json) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(error = %e, "snapshot blob is unreadable, falling back to tables");
                Ok(None)
            }
        }
    }

    /// Rebuild the snapshot from the normalized tables, including tag
    /// membership from `task_tags`
    pub fn load_snapshot_from_tables(&self) -> Result<StateSnapshot, DatabaseError> {
        let mut tasks: BTreeMap<String, Task> = self
            .query_all(
                "SELECT id, title, notes, created_at, updated_at, due_date, start_date,
                        completed_at, project_id, section_id, parent_task_id, priority,
                        status, repeat_rule, order_index, deleted, kind, size, assignee,
                        context_url, metadata
                 FROM tasks",
                Self::row_to_task,
            )?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        let mut stmt = self
            .conn
            .prepare("SELECT task_id, tag_id FROM task_tags ORDER BY rowid")?;
        let links = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (task_id, tag_id) in links {
            if let Some(task) = tasks.get_mut(&task_id) {
                task.tags.push(tag_id);
            }
        }

        let projects = self.query_all(
            "SELECT id, name, description, color, icon, order_index, is_inbox,
                    created_at, updated_at, deleted
             FROM projects",
            Self::row_to_project,
        )?;
        let sections = self.query_all(
            "SELECT id, project_id, name, order_index, created_at, updated_at, deleted
             FROM sections",
            Self::row_to_section,
        )?;
        let tags = self.query_all(
            "SELECT id, name, color, created_at, updated_at, deleted FROM tags",
            Self::row_to_tag,
        )?;
        let reminders = self.query_all(
            "SELECT id, task_id, at, created_at, updated_at, cancelled_at, deleted
             FROM reminders",
            Self::row_to_reminder,
        )?;

        Ok(StateSnapshot {
            tasks,
            projects: projects.into_iter().map(|p| (p.id.clone(), p)).collect(),
            sections: sections.into_iter().map(|s| (s.id.clone(), s)).collect(),
            tags: tags.into_iter().map(|t| (t.id.clone(), t)).collect(),
            reminders: reminders.into_iter().map(|r| (r.id.clone(), r)).collect(),
            version: SNAPSHOT_VERSION,
        })
    }

    /// Write both representations inside one transaction
    pub fn save_snapshot(&mut self, snapshot: &StateSnapshot) -> Result<(), DatabaseError> {
        let json = snapshot.to_json()?;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            rusqlite::params![SNAPSHOT_KEY, json],
        )?;
        Self::save_to_tables(&tx, snapshot)?;

        tx.commit()?;
        debug!(
            tasks = snapshot.tasks.len(),
            projects = snapshot.projects.len(),
            tags = snapshot.tags.len(),
            "saved snapshot"
        );
        Ok(())
    }

    fn save_to_tables(tx: &Transaction<'_>, snapshot: &StateSnapshot) -> Result<(), DatabaseError> {
        let mut upsert_task = tx.prepare(
            "INSERT OR REPLACE INTO tasks
             (id, title, notes, created_at, updated_at, due_date, start_date,
              completed_at, project_id, section_id, parent_task_id, priority,
              status, repeat_rule, order_index, deleted, kind, size, assignee,
              context_url, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19, ?20, ?21)",
        )?;
        let mut clear_links = tx.prepare("DELETE FROM task_tags WHERE task_id = ?1")?;
        let mut insert_link =
            tx.prepare("INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?1, ?2)")?;

        for task in snapshot.tasks.values() {
            let metadata = if task.metadata.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&task.metadata)?)
            };
            upsert_task.execute(rusqlite::params![
                task.id,
                task.title,
                task.notes,
                task.created_at,
                task.updated_at,
                task.due_date,
                task.start_date,
                task.completed_at,
                task.project_id,
                task.section_id,
                task.parent_task_id,
                task.priority.as_str(),
                task.status.as_str(),
                task.repeat_rule,
                task.order_index,
                task.deleted as i64,
                task.kind.map(|k| k.as_str()),
                task.size.map(|s| s.as_str()),
                task.assignee,
                task.context_url,
                metadata,
            ])?;

            clear_links.execute([&task.id])?;
            for tag_id in &task.tags {
                insert_link.execute(rusqlite::params![task.id, tag_id])?;
            }
        }

        let mut upsert_project = tx.prepare(
            "INSERT OR REPLACE INTO projects
             (id, name, description, color, icon, order_index, is_inbox,
              created_at, updated_at, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for project in snapshot.projects.values() {
            upsert_project.execute(rusqlite::params![
                project.id,
                project.name,
                project.description,
                project.color,
                project.icon,
                project.order_index,
                project.is_inbox as i64,
                project.created_at,
                project.updated_at,
                project.deleted as i64,
            ])?;
        }

        let mut upsert_section = tx.prepare(
            "INSERT OR REPLACE INTO sections
             (id, project_id, name, order_index, created_at, updated_at, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for section in snapshot.sections.values() {
            upsert_section.execute(rusqlite::params![
                section.id,
                section.project_id,
                section.name,
                section.order_index,
                section.created_at,
                section.updated_at,
                section.deleted as i64,
            ])?;
        }

        let mut upsert_tag = tx.prepare(
            "INSERT OR REPLACE INTO tags (id, name, color, created_at, updated_at, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for tag in snapshot.tags.values() {
            upsert_tag.execute(rusqlite::params![
                tag.id,
                tag.name,
                tag.color,
                tag.created_at,
                tag.updated_at,
                tag.deleted as i64,
            ])?;
        }

        let mut upsert_reminder = tx.prepare(
            "INSERT OR REPLACE INTO reminders
             (id, task_id, at, created_at, updated_at, cancelled_at, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for reminder in snapshot.reminders.values() {
            upsert_reminder.execute(rusqlite::params![
                reminder.id,
                reminder.task_id,
                reminder.at,
                reminder.created_at,
                reminder.updated_at,
                reminder.cancelled_at,
                reminder.deleted as i64,
            ])?;
        }

        Ok(())
    }

    fn query_all<T>(
        &self,
        sql: &str,
        map: fn(&rusqlite::Row) -> Result<T, rusqlite::Error>,
    ) -> Result<Vec<T>, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Helper function to map a row to a Task (tags are filled in separately)
    fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
        let metadata: Option<String> = row.get(20)?;
        let metadata = match metadata.filter(|m| !m.is_empty()) {
            Some(json) => serde_json::from_str::<Metadata>(&json)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(20, Type::Text, Box::new(e)))?,
            None => Metadata::new(),
        };

        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            notes: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            due_date: row.get(5)?,
            start_date: row.get(6)?,
            completed_at: row.get(7)?,
            project_id: row.get(8)?,
            section_id: row.get(9)?,
            parent_task_id: row.get(10)?,
            priority: parse_column(row, 11)?,
            tags: Vec::new(),
            status: parse_column(row, 12)?,
            repeat_rule: row.get(13)?,
            order_index: row.get(14)?,
            deleted: row.get::<_, i64>(15)? != 0,
            kind: parse_optional_column(row, 16)?,
            size: parse_optional_column(row, 17)?,
            assignee: row.get(18)?,
            context_url: row.get(19)?,
            metadata,
        })
    }

    fn row_to_project(row: &rusqlite::Row) -> Result<Project, rusqlite::Error> {
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            color: row.get(3)?,
            icon: row.get(4)?,
            order_index: row.get(5)?,
            is_inbox: row.get::<_, i64>(6)? != 0,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            deleted: row.get::<_, i64>(9)? != 0,
        })
    }

    fn row_to_section(row: &rusqlite::Row) -> Result<Section, rusqlite::Error> {
        Ok(Section {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            order_index: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            deleted: row.get::<_, i64>(6)? != 0,
        })
    }

    fn row_to_tag(row: &rusqlite::Row) -> Result<Tag, rusqlite::Error> {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            deleted: row.get::<_, i64>(5)? != 0,
        })
    }

    fn row_to_reminder(row: &rusqlite::Row) -> Result<Reminder, rusqlite::Error> {
        Ok(Reminder {
            id: row.get(0)?,
            task_id: row.get(1)?,
            at: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            cancelled_at: row.get(5)?,
            deleted: row.get::<_, i64>(6)? != 0,
        })
    }
}

fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = ParseEnumError>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// NULL and empty strings both read as absent
fn parse_optional_column<T>(row: &rusqlite::Row, idx: usize) -> Result<Option<T>, rusqlite::Error>
where
    T: FromStr<Err = ParseEnumError>,
{
    let text: Option<String> = row.get(idx)?;
    match text.filter(|t| !t.is_empty()) {
        Some(t) => t
            .parse()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskKind, TaskPriority, TaskStatus};
    use pretty_assertions::assert_eq;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("nested").join("phitodo.db")).unwrap();
        (dir, db)
    }

    fn sample_snapshot() -> StateSnapshot {
        let mut snapshot = StateSnapshot::empty();
        let mut task = Task::new(
            "t-1".to_string(),
            "Ship it".to_string(),
            "2024-06-15T09:00:00.000000".to_string(),
        );
        task.tags = vec!["g-1".to_string(), "g-2".to_string()];
        task.priority = TaskPriority::High;
        task.status = TaskStatus::Active;
        task.kind = Some(TaskKind::Bug);
        task.order_index = 2.5;
        task.metadata
            .insert("source".to_string(), serde_json::json!("manual"));
        snapshot.tasks.insert(task.id.clone(), task);

        let bare = Task::new("t-2".to_string(), "Bare".to_string(), "x".to_string());
        snapshot.tasks.insert(bare.id.clone(), bare);

        snapshot.projects.insert(
            "p-1".to_string(),
            Project {
                id: "p-1".to_string(),
                name: "Inbox".to_string(),
                description: None,
                color: None,
                icon: None,
                order_index: 0.0,
                is_inbox: true,
                created_at: "a".to_string(),
                updated_at: "b".to_string(),
                deleted: false,
            },
        );
        snapshot.reminders.insert(
            "r-1".to_string(),
            Reminder {
                id: "r-1".to_string(),
                task_id: "t-1".to_string(),
                at: "2024-06-16T08:00:00".to_string(),
                created_at: "a".to_string(),
                updated_at: "a".to_string(),
                cancelled_at: None,
                deleted: false,
            },
        );
        snapshot
    }

    #[test]
    fn test_new_database_is_empty() {
        let (_dir, db) = open_temp();
        assert_eq!(db.load_snapshot_blob().unwrap(), None);
        assert!(db.load_snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_both_paths() {
        let (_dir, mut db) = open_temp();
        let snapshot = sample_snapshot();
        db.save_snapshot(&snapshot).unwrap();

        assert_eq!(db.load_snapshot_blob().unwrap(), Some(snapshot.clone()));
        assert_eq!(db.load_snapshot_from_tables().unwrap(), snapshot);
        assert_eq!(db.load_snapshot().unwrap(), snapshot);
    }

    #[test]
    fn test_resave_replaces_tag_links() {
        let (_dir, mut db) = open_temp();
        let mut snapshot = sample_snapshot();
        db.save_snapshot(&snapshot).unwrap();

        if let Some(task) = snapshot.tasks.get_mut("t-1") {
            task.tags = vec!["g-3".to_string()];
        }
        db.save_snapshot(&snapshot).unwrap();

        let from_tables = db.load_snapshot_from_tables().unwrap();
        assert_eq!(from_tables.tasks["t-1"].tags, vec!["g-3".to_string()]);
    }

    #[test]
    fn test_empty_metadata_stored_as_null() {
        let (_dir, mut db) = open_temp();
        db.save_snapshot(&sample_snapshot()).unwrap();
        let metadata: Option<String> = db
            .conn()
            .query_row("SELECT metadata FROM tasks WHERE id = 't-2'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(metadata, None);
    }

    #[test]
    fn test_corrupt_blob_falls_back_to_tables() {
        let (_dir, mut db) = open_temp();
        let snapshot = sample_snapshot();
        db.save_snapshot(&snapshot).unwrap();
        db.conn()
            .execute(
                "UPDATE metadata SET value = '{not json' WHERE key = 'snapshot'",
                [],
            )
            .unwrap();

        assert_eq!(db.load_snapshot_blob().unwrap(), None);
        assert_eq!(db.load_snapshot().unwrap(), snapshot);
    }

    #[test]
    fn test_unknown_enum_in_table_is_an_error() {
        let (_dir, db) = open_temp();
        db.conn()
            .execute(
                "INSERT INTO tasks (id, title, created_at, updated_at, status)
                 VALUES ('x', 'x', '', '', 'someday')",
                [],
            )
            .unwrap();
        assert!(matches!(
            db.load_snapshot_from_tables(),
            Err(DatabaseError::SqliteError(_))
        ));
    }
}
