//! Task Entity
//!
//! A kanban card. Its column is its status; `done` is the terminal column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{DomainError, DomainResult, Entity};
use super::positioned::{Completable, Positioned, Relocatable};

/// Points a task is worth when none were given
pub const DEFAULT_TASK_POINTS: i64 = 10;
/// Upper bound for points on a single task
pub const MAX_TASK_POINTS: i64 = 1_000_000;

/// Accept points in `0..=MAX_TASK_POINTS`
pub fn validate_points(points: i64) -> DomainResult<i64> {
    if (0..=MAX_TASK_POINTS).contains(&points) {
        Ok(points)
    } else {
        Err(DomainError::InvalidInput(format!(
            "points must be between 0 and {}, got {}",
            MAX_TASK_POINTS, points
        )))
    }
}

/// Kanban column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    /// Terminal: entering it stamps completion and pays the reward
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::Doing, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }

    /// Unknown values fall back to `todo`, like legacy records do
    pub fn from_str(s: &str) -> Self {
        match s {
            "doing" => TaskStatus::Doing,
            "done" => TaskStatus::Done,
            _ => TaskStatus::Todo,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub done: bool,
}

fn default_points() -> i64 {
    DEFAULT_TASK_POINTS
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// A kanban task
///
/// Missing fields on stored records are filled leniently so that older
/// snapshots keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default = "default_points")]
    pub points: i64,
    /// Set once the reward was paid for the current completion
    #[serde(default)]
    pub points_awarded: Option<bool>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Rank within the status column
    #[serde(default)]
    pub order: i32,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: TaskStatus, order: i32) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status,
            checklist: Vec::new(),
            points: DEFAULT_TASK_POINTS,
            points_awarded: Some(false),
            created_at: now,
            updated_at: now,
            completed_at: status.is_terminal().then_some(now),
            order,
        }
    }

    pub fn with_points(mut self, points: i64) -> Self {
        self.points = points;
        self
    }
}

/// Input for creating a task; id and timestamps come from the repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub points: i64,
    #[serde(default)]
    pub status: TaskStatus,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            points: DEFAULT_TASK_POINTS,
            status: TaskStatus::Todo,
        }
    }
}

impl Entity for Task {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Positioned for Task {
    type Container = TaskStatus;

    fn container(&self) -> &TaskStatus {
        &self.status
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn set_order(&mut self, order: i32) {
        self.order = order;
    }
}

impl Relocatable for Task {
    fn relocate(&mut self, to: TaskStatus, now: DateTime<Utc>) {
        self.status = to;
        if to.is_terminal() {
            self.completed_at.get_or_insert(now);
        } else {
            self.completed_at = None;
        }
        self.updated_at = now;
    }
}

impl Completable for Task {
    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn reward_points(&self) -> i64 {
        self.points
    }

    fn points_awarded(&self) -> Option<bool> {
        self.points_awarded
    }

    fn set_points_awarded(&mut self, awarded: bool) {
        self.points_awarded = Some(awarded);
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn set_completed_at(&mut self, at: Option<DateTime<Utc>>) {
        self.completed_at = at;
    }
}
