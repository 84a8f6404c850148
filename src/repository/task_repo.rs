//! Task Repository
//!
//! SQLite-backed implementation for Task CRUD operations.
//! Each task is a JSON body in its own row; status and position are
//! mirrored into columns for ordered listing.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::db::{with_conn, SharedConnection};
use super::traits::Repository;
use crate::domain::{validate_points, DomainError, DomainResult, NewTask, Relocatable, Task, TaskStatus};

/// SQLite implementation of Task repository
pub struct TaskRepository {
    conn: SharedConnection,
}

impl TaskRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Tasks of one column, by stored position
    pub async fn list_by_status(&self, status: TaskStatus) -> DomainResult<Vec<Task>> {
        let guard = self.conn.lock().await;
        with_conn(&guard, |conn| {
            let mut stmt = conn.prepare("SELECT id, body FROM tasks WHERE status = ? ORDER BY position, id")?;
            let rows = stmt.query_map(params![status.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            collect_tasks(rows)
        })
    }
}

#[async_trait]
impl Repository<Task> for TaskRepository {
    type Draft = NewTask;

    async fn list(&self) -> DomainResult<Vec<Task>> {
        let guard = self.conn.lock().await;
        with_conn(&guard, |conn| {
            let mut stmt = conn.prepare("SELECT id, body FROM tasks ORDER BY status, position, id")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            collect_tasks(rows)
        })
    }

    async fn find_by_id(&self, id: &String) -> DomainResult<Option<Task>> {
        let guard = self.conn.lock().await;
        with_conn(&guard, |conn| {
            let body: Option<String> = conn
                .query_row("SELECT body FROM tasks WHERE id = ?", params![id], |row| row.get(0))
                .optional()?;
            match body {
                Some(body) => Ok(Some(serde_json::from_str(&body)?)),
                None => Ok(None),
            }
        })
    }

    async fn create(&self, draft: NewTask) -> DomainResult<Task> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(DomainError::InvalidInput("task title is empty".to_string()));
        }
        let points = validate_points(draft.points)?;

        let now = Utc::now();
        let task = Task {
            id: format!("t_{}", Uuid::new_v4().simple()),
            title: title.to_string(),
            description: draft.description.filter(|d| !d.trim().is_empty()),
            status: draft.status,
            checklist: Vec::new(),
            points,
            points_awarded: Some(false),
            created_at: now,
            updated_at: now,
            completed_at: draft.status.is_terminal().then_some(now),
            // placed at the front once the board normalizes
            order: -1,
        };

        let body = serde_json::to_string(&task)?;
        let guard = self.conn.lock().await;
        with_conn(&guard, |conn| {
            conn.execute(
                "INSERT INTO tasks (id, body, status, position, updated_at) VALUES (?, ?, ?, ?, ?)",
                params![task.id, body, task.status.as_str(), task.order, now.timestamp_millis()],
            )?;
            Ok(())
        })?;

        log::debug!("created task {}", task.id);
        Ok(task)
    }

    async fn update(&self, entity: &Task) -> DomainResult<Task> {
        let mut stored = entity.clone();
        stored.updated_at = Utc::now();
        let body = serde_json::to_string(&stored)?;

        let guard = self.conn.lock().await;
        let changed = with_conn(&guard, |conn| {
            Ok(conn.execute(
                "UPDATE tasks SET body = ?, status = ?, position = ?, updated_at = ? WHERE id = ?",
                params![
                    body,
                    stored.status.as_str(),
                    stored.order,
                    stored.updated_at.timestamp_millis(),
                    stored.id
                ],
            )?)
        })?;

        if changed == 0 {
            return Err(DomainError::NotFound(format!("Task {} not found", entity.id)));
        }
        Ok(stored)
    }

    async fn remove(&self, id: &String) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        with_conn(&guard, |conn| {
            conn.execute("DELETE FROM tasks WHERE id = ?", params![id])?;
            Ok(())
        })
    }

    async fn move_to(&self, id: &String, container: TaskStatus) -> DomainResult<Task> {
        let mut task = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Task {} not found", id)))?;
        task.relocate(container, Utc::now());
        self.update(&task).await
    }
}

/// Decode rows, skipping bodies that no longer parse
fn collect_tasks<I>(rows: I) -> DomainResult<Vec<Task>>
where
    I: Iterator<Item = rusqlite::Result<(String, String)>>,
{
    let mut tasks = Vec::new();
    for row in rows {
        let (id, body) = row?;
        match serde_json::from_str::<Task>(&body) {
            Ok(task) => tasks.push(task),
            Err(e) => log::warn!("skipping unreadable task {}: {}", id, e),
        }
    }
    Ok(tasks)
}
