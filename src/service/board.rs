//! Task Board
//!
//! Kanban columns (`todo`, `doing`, `done`) over a task repository.
//! Every mutation computes a full proposed collection and hands it to the
//! coordinator, which pays completion rewards and persists the diff.

use std::sync::Arc;

use chrono::Utc;

use super::coordinator::SyncCoordinator;
use crate::domain::{validate_points, DomainError, DomainResult, NewTask, Task, TaskStatus, DEFAULT_TASK_POINTS};
use crate::ordering::{
    container_members, insert_front, remove_and_reindex, resolve_move, DropTarget, MoveOutcome, RearmPolicy,
    TargetOf,
};
use crate::repository::{Repository, RewardLedger, TaskRepository};

pub struct TaskBoard<R = TaskRepository>
where
    R: Repository<Task, Draft = NewTask>,
{
    sync: SyncCoordinator<Task, R>,
    default_points: i64,
}

impl<R> TaskBoard<R>
where
    R: Repository<Task, Draft = NewTask>,
{
    pub fn new(repo: Arc<R>, ledger: Arc<dyn RewardLedger>, policy: RearmPolicy) -> Self {
        Self {
            sync: SyncCoordinator::new(repo, ledger, policy),
            default_points: DEFAULT_TASK_POINTS,
        }
    }

    /// Points given to tasks added without an explicit value
    pub fn with_default_points(mut self, points: i64) -> Self {
        self.default_points = points;
        self
    }

    /// Load the board from storage
    pub async fn init(&self) -> DomainResult<()> {
        self.sync.reload().await?;
        log::info!("task board loaded with {} tasks", self.sync.read().working.len());
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.sync.snapshot()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.sync.read().working.iter().find(|t| t.id == id).cloned()
    }

    /// One column, in display order
    pub fn column(&self, status: TaskStatus) -> Vec<Task> {
        let state = self.sync.read();
        container_members(&state.working, &status).into_iter().cloned().collect()
    }

    pub fn last_error(&self) -> Option<DomainError> {
        self.sync.last_error()
    }

    pub fn clear_error(&self) {
        self.sync.clear_error()
    }

    pub fn ledger(&self) -> &Arc<dyn RewardLedger> {
        self.sync.ledger()
    }

    pub async fn balance(&self) -> DomainResult<i64> {
        self.sync.ledger().balance().await
    }

    /// Add a task at the top of `todo`
    pub async fn add(&self, title: &str, description: Option<String>, points: Option<i64>) -> DomainResult<Task> {
        let _guard = self.sync.lock().await;

        let draft = NewTask {
            title: title.to_string(),
            description,
            points: points.unwrap_or(self.default_points),
            status: TaskStatus::Todo,
        };
        let created = match self.sync.repository().create(draft).await {
            Ok(task) => task,
            Err(e) if e.is_persistence() => return Err(self.sync.record_error(e)),
            Err(e) => return Err(e),
        };

        let id = created.id.clone();
        let next = insert_front(self.sync.authoritative(), created);
        self.sync.apply_locked(next).await?;
        self.get(&id).ok_or_else(|| DomainError::not_found(&id))
    }

    /// Save edits to a task
    ///
    /// Position, completion stamp and the paid flag are owned by the board.
    /// A changed status moves the task to the end of its new column.
    pub async fn update(&self, task: Task) -> DomainResult<Task> {
        let _guard = self.sync.lock().await;
        let base = self.sync.authoritative();

        let current = base
            .iter()
            .find(|t| t.id == task.id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(&task.id))?;
        if task.title.trim().is_empty() {
            return Err(DomainError::InvalidInput("task title is empty".to_string()));
        }
        validate_points(task.points)?;

        let target = task.status;
        let edited = Task {
            status: current.status,
            order: current.order,
            completed_at: current.completed_at,
            points_awarded: current.points_awarded,
            created_at: current.created_at,
            ..task
        };
        let id = edited.id.clone();
        let base: Vec<Task> = base
            .into_iter()
            .map(|t| if t.id == id { edited.clone() } else { t })
            .collect();

        let next = if target != current.status {
            match resolve_move(&base, &id, Some(&DropTarget::Container(target)), Utc::now())? {
                MoveOutcome::Moved(next) => next,
                MoveOutcome::Unchanged => base,
            }
        } else {
            base
        };

        self.sync.apply_locked(next).await?;
        self.get(&id).ok_or_else(|| DomainError::not_found(&id))
    }

    pub async fn remove(&self, id: &str) -> DomainResult<()> {
        let _guard = self.sync.lock().await;

        let id = id.to_string();
        let (_, rest) =
            remove_and_reindex(self.sync.authoritative(), &id).ok_or_else(|| DomainError::not_found(&id))?;

        if let Err(e) = self.sync.repository().remove(&id).await {
            return Err(self.sync.recover(e).await);
        }
        self.sync.apply_locked(rest).await
    }

    /// Move a task to the end of another column
    pub async fn move_to(&self, id: &str, status: TaskStatus) -> DomainResult<bool> {
        self.drop_on(id, Some(DropTarget::Container(status))).await
    }

    /// Resolve a drag-and-drop gesture; returns whether anything moved
    pub async fn drop_on(&self, active: &str, target: Option<TargetOf<Task>>) -> DomainResult<bool> {
        let _guard = self.sync.lock().await;
        let base = self.sync.authoritative();

        match resolve_move(&base, &active.to_string(), target.as_ref(), Utc::now())? {
            MoveOutcome::Unchanged => Ok(false),
            MoveOutcome::Moved(next) => {
                self.sync.apply_locked(next).await?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{init_db, DbState, KvRewardLedger};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Task repository whose writes to one chosen task fail
    struct FlakyRepo {
        inner: TaskRepository,
        failing: Mutex<Option<String>>,
    }

    impl FlakyRepo {
        fn fail_updates_of(&self, id: Option<&str>) {
            *self.failing.lock().unwrap() = id.map(str::to_string);
        }
    }

    #[async_trait]
    impl Repository<Task> for FlakyRepo {
        type Draft = NewTask;

        async fn list(&self) -> DomainResult<Vec<Task>> {
            self.inner.list().await
        }

        async fn find_by_id(&self, id: &String) -> DomainResult<Option<Task>> {
            self.inner.find_by_id(id).await
        }

        async fn create(&self, draft: NewTask) -> DomainResult<Task> {
            self.inner.create(draft).await
        }

        async fn update(&self, entity: &Task) -> DomainResult<Task> {
            let failing = self.failing.lock().unwrap().clone();
            if failing.as_deref() == Some(entity.id.as_str()) {
                return Err(DomainError::Persistence("disk full".to_string()));
            }
            self.inner.update(entity).await
        }

        async fn remove(&self, id: &String) -> DomainResult<()> {
            self.inner.remove(id).await
        }

        async fn move_to(&self, id: &String, container: TaskStatus) -> DomainResult<Task> {
            self.inner.move_to(id, container).await
        }
    }

    async fn setup_test_db() -> DbState {
        init_db(&PathBuf::from(":memory:")).await.expect("Failed to init test DB")
    }

    async fn board_with(policy: RearmPolicy) -> (TaskBoard, DbState) {
        let db = setup_test_db().await;
        let repo = Arc::new(TaskRepository::new(db.connection()));
        let ledger = Arc::new(KvRewardLedger::new(db.connection()));
        let board = TaskBoard::new(repo, ledger, policy);
        board.init().await.unwrap();
        (board, db)
    }

    async fn board() -> TaskBoard {
        board_with(RearmPolicy::ConsumeOnce).await.0
    }

    fn column_titles<R: Repository<Task, Draft = NewTask>>(board: &TaskBoard<R>, status: TaskStatus) -> Vec<String> {
        board.column(status).into_iter().map(|t| t.title).collect()
    }

    fn orders(tasks: &[Task]) -> Vec<i32> {
        tasks.iter().map(|t| t.order).collect()
    }

    #[tokio::test]
    async fn test_add_puts_task_on_top() {
        let board = board().await;
        board.add("first", None, None).await.unwrap();
        let second = board.add("second", Some("details".to_string()), Some(5)).await.unwrap();

        assert_eq!(column_titles(&board, TaskStatus::Todo), vec!["second", "first"]);
        assert_eq!(orders(&board.column(TaskStatus::Todo)), vec![0, 1]);
        assert_eq!(second.points, 5);
        assert_eq!(second.description.as_deref(), Some("details"));
        assert!(board.last_error().is_none());
    }

    #[tokio::test]
    async fn test_add_uses_default_points() {
        let db = setup_test_db().await;
        let board = TaskBoard::new(
            Arc::new(TaskRepository::new(db.connection())),
            Arc::new(KvRewardLedger::new(db.connection())),
            RearmPolicy::ConsumeOnce,
        )
        .with_default_points(25);

        let task = board.add("worth more", None, None).await.unwrap();
        assert_eq!(task.points, 25);
    }

    #[tokio::test]
    async fn test_add_blank_title_is_rejected() {
        let board = board().await;
        let result = board.add("  ", None, None).await;
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        assert!(board.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_drop_on_empty_column() {
        let board = board().await;
        board.add("b", None, None).await.unwrap();
        let a = board.add("a", None, None).await.unwrap();

        let moved = board.move_to(&a.id, TaskStatus::Doing).await.unwrap();
        assert!(moved);

        let todo = board.column(TaskStatus::Todo);
        let doing = board.column(TaskStatus::Doing);
        assert_eq!(column_titles(&board, TaskStatus::Todo), vec!["b"]);
        assert_eq!(orders(&todo), vec![0]);
        assert_eq!(doing.len(), 1);
        assert_eq!(doing[0].id, a.id);
        assert_eq!(doing[0].order, 0);
        assert_eq!(doing[0].status, TaskStatus::Doing);
        assert!(doing[0].completed_at.is_none());
    }

    #[tokio::test]
    async fn test_reorder_within_column() {
        let board = board().await;
        let c = board.add("c", None, None).await.unwrap();
        board.add("b", None, None).await.unwrap();
        let a = board.add("a", None, None).await.unwrap();

        let moved = board.drop_on(&a.id, Some(DropTarget::Item(c.id.clone()))).await.unwrap();
        assert!(moved);
        assert_eq!(column_titles(&board, TaskStatus::Todo), vec!["b", "c", "a"]);
        assert_eq!(orders(&board.column(TaskStatus::Todo)), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_noop_drops_leave_board_alone() {
        let board = board().await;
        let a = board.add("a", None, None).await.unwrap();

        assert!(!board.drop_on(&a.id, None).await.unwrap());
        assert!(!board.drop_on(&a.id, Some(DropTarget::Item(a.id.clone()))).await.unwrap());
        assert!(!board.drop_on(&a.id, Some(DropTarget::Item("gone".to_string()))).await.unwrap());

        let missing = board.drop_on("gone", Some(DropTarget::Container(TaskStatus::Done))).await;
        assert!(matches!(missing, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_completion_pays_once() {
        let board = board().await;
        let t = board.add("t", None, Some(15)).await.unwrap();

        board.move_to(&t.id, TaskStatus::Done).await.unwrap();
        assert_eq!(board.balance().await.unwrap(), 15);

        let done = board.get(&t.id).unwrap();
        assert_eq!(done.points_awarded, Some(true));
        assert!(done.completed_at.is_some());

        // already terminal: nothing to pay
        assert!(!board.move_to(&t.id, TaskStatus::Done).await.unwrap());
        assert_eq!(board.balance().await.unwrap(), 15);

        // leaving and re-entering done does not pay again by default
        board.move_to(&t.id, TaskStatus::Doing).await.unwrap();
        assert!(board.get(&t.id).unwrap().completed_at.is_none());
        board.move_to(&t.id, TaskStatus::Done).await.unwrap();
        assert_eq!(board.balance().await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_rearm_policy_pays_each_completion() {
        let (board, _db) = board_with(RearmPolicy::Rearm).await;
        let t = board.add("t", None, Some(15)).await.unwrap();

        board.move_to(&t.id, TaskStatus::Done).await.unwrap();
        board.move_to(&t.id, TaskStatus::Todo).await.unwrap();
        assert_eq!(board.get(&t.id).unwrap().points_awarded, Some(false));

        board.move_to(&t.id, TaskStatus::Done).await.unwrap();
        assert_eq!(board.balance().await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_paid_flag_survives_reload() {
        let (board, db) = board_with(RearmPolicy::ConsumeOnce).await;
        let t = board.add("t", None, Some(15)).await.unwrap();
        board.move_to(&t.id, TaskStatus::Done).await.unwrap();

        let reopened = TaskBoard::new(
            Arc::new(TaskRepository::new(db.connection())),
            Arc::new(KvRewardLedger::new(db.connection())),
            RearmPolicy::ConsumeOnce,
        );
        reopened.init().await.unwrap();

        let done = reopened.column(TaskStatus::Done);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].points_awarded, Some(true));
        assert_eq!(reopened.balance().await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_failed_write_reloads_without_credit() {
        let db = setup_test_db().await;
        let repo = Arc::new(FlakyRepo {
            inner: TaskRepository::new(db.connection()),
            failing: Mutex::new(None),
        });
        let ledger = Arc::new(KvRewardLedger::new(db.connection()));
        let board = TaskBoard::new(repo.clone(), ledger, RearmPolicy::ConsumeOnce);
        board.init().await.unwrap();

        board.add("b", None, None).await.unwrap();
        let a = board.add("a", None, Some(15)).await.unwrap();

        repo.fail_updates_of(Some(a.id.as_str()));
        let result = board.move_to(&a.id, TaskStatus::Done).await;
        assert!(matches!(result, Err(DomainError::Persistence(_))));

        assert!(matches!(board.last_error(), Some(DomainError::Persistence(_))));
        assert!(board.column(TaskStatus::Done).is_empty());
        assert_eq!(board.get(&a.id).unwrap().status, TaskStatus::Todo);
        assert_eq!(orders(&board.column(TaskStatus::Todo)), vec![0, 1]);
        assert_eq!(board.balance().await.unwrap(), 0);

        let stored: Vec<String> = repo.list().await.unwrap().into_iter().map(|t| t.id).collect();
        let mut shown: Vec<String> = board.snapshot().into_iter().map(|t| t.id).collect();
        let mut stored_sorted = stored.clone();
        stored_sorted.sort();
        shown.sort();
        assert_eq!(shown, stored_sorted);

        repo.fail_updates_of(None);
        board.clear_error();
        board.move_to(&a.id, TaskStatus::Done).await.unwrap();
        assert_eq!(board.balance().await.unwrap(), 15);
        assert!(board.last_error().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_position() {
        let board = board().await;
        board.add("b", None, None).await.unwrap();
        let a = board.add("a", None, None).await.unwrap();

        let mut edit = a.clone();
        edit.title = "a, renamed".to_string();
        edit.order = 99;
        let saved = board.update(edit).await.unwrap();

        assert_eq!(saved.title, "a, renamed");
        assert_eq!(saved.order, 0);
        assert_eq!(column_titles(&board, TaskStatus::Todo), vec!["a, renamed", "b"]);
    }

    #[tokio::test]
    async fn test_update_status_moves_and_pays() {
        let board = board().await;
        let t = board.add("t", None, Some(15)).await.unwrap();

        let mut edit = t.clone();
        edit.status = TaskStatus::Done;
        edit.points_awarded = Some(true);
        let saved = board.update(edit).await.unwrap();

        assert_eq!(saved.status, TaskStatus::Done);
        assert_eq!(saved.order, 0);
        assert!(board.column(TaskStatus::Todo).is_empty());
        assert_eq!(board.balance().await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_update_unknown_task() {
        let board = board().await;
        let ghost = Task::new("ghost", "Ghost", TaskStatus::Todo, 0);
        assert!(matches!(board.update(ghost).await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_closes_gap() {
        let board = board().await;
        board.add("c", None, None).await.unwrap();
        let b = board.add("b", None, None).await.unwrap();
        board.add("a", None, None).await.unwrap();

        board.remove(&b.id).await.unwrap();
        assert_eq!(column_titles(&board, TaskStatus::Todo), vec!["a", "c"]);
        assert_eq!(orders(&board.column(TaskStatus::Todo)), vec![0, 1]);
        assert!(board.ledger().balance().await.is_ok());

        assert!(matches!(board.remove(&b.id).await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_closed_database_surfaces_error() {
        let (board, db) = board_with(RearmPolicy::ConsumeOnce).await;
        let a = board.add("a", None, None).await.unwrap();
        db.close().await;

        let result = board.move_to(&a.id, TaskStatus::Doing).await;
        assert!(matches!(result, Err(DomainError::Persistence(_))));
        // reload failed too, so the last confirmed state is shown
        assert_eq!(board.get(&a.id).unwrap().status, TaskStatus::Todo);
        assert!(board.last_error().is_some());
    }

    #[tokio::test]
    async fn test_out_of_range_points_are_rejected() {
        let board = board().await;

        let huge = board.add("huge", None, Some(i64::MAX)).await;
        assert!(matches!(huge, Err(DomainError::InvalidInput(_))));
        let negative = board.add("negative", None, Some(-5)).await;
        assert!(matches!(negative, Err(DomainError::InvalidInput(_))));

        let t = board.add("t", None, Some(15)).await.unwrap();
        let edit = Task {
            points: i64::MAX,
            ..t.clone()
        };
        assert!(matches!(board.update(edit).await, Err(DomainError::InvalidInput(_))));
        assert_eq!(board.get(&t.id).unwrap().points, 15);
        assert!(board.last_error().is_none());
    }

    #[tokio::test]
    async fn test_ledger_overflow_surfaces_error() {
        let db = setup_test_db().await;
        let ledger = Arc::new(KvRewardLedger::new(db.connection()));
        ledger.credit("seed", i64::MAX).await.unwrap();
        let board = TaskBoard::new(
            Arc::new(TaskRepository::new(db.connection())),
            ledger.clone(),
            RearmPolicy::ConsumeOnce,
        );
        board.init().await.unwrap();

        let t = board.add("t", None, Some(15)).await.unwrap();
        let result = board.move_to(&t.id, TaskStatus::Done).await;

        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        assert!(board.last_error().is_some());
        assert_eq!(board.balance().await.unwrap(), i64::MAX);
        // the reload shows what storage holds: the task is done and marked paid
        let stored = board.get(&t.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Done);
        assert_eq!(stored.points_awarded, Some(true));
    }

    #[tokio::test]
    async fn test_legacy_done_row_is_settled_on_load() {
        let db = setup_test_db().await;
        {
            let conn = db.connection();
            let guard = conn.lock().await;
            guard
                .as_ref()
                .unwrap()
                .execute(
                    "INSERT INTO tasks (id, body, status, position) VALUES (?1, ?2, 'done', 0)",
                    rusqlite::params!["old", r#"{"id":"old","title":"Old","status":"done"}"#],
                )
                .unwrap();
        }

        let board = TaskBoard::new(
            Arc::new(TaskRepository::new(db.connection())),
            Arc::new(KvRewardLedger::new(db.connection())),
            RearmPolicy::ConsumeOnce,
        );
        board.init().await.unwrap();

        let old = board.get("old").unwrap();
        assert_eq!(old.status, TaskStatus::Done);
        assert!(old.completed_at.is_some());
        assert_eq!(old.points_awarded, Some(true));

        // settling never pays, and re-entering done later does not either
        board.move_to("old", TaskStatus::Todo).await.unwrap();
        assert!(board.get("old").unwrap().completed_at.is_none());
        board.move_to("old", TaskStatus::Done).await.unwrap();
        assert_eq!(board.balance().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_after_rewarded_write_pays_once() {
        let db = setup_test_db().await;
        let repo = Arc::new(FlakyRepo {
            inner: TaskRepository::new(db.connection()),
            failing: Mutex::new(None),
        });
        let ledger = Arc::new(KvRewardLedger::new(db.connection()));
        let board = TaskBoard::new(repo.clone(), ledger, RearmPolicy::ConsumeOnce);
        board.init().await.unwrap();

        let x = board.add("x", None, Some(0)).await.unwrap();
        board.move_to(&x.id, TaskStatus::Done).await.unwrap();
        let a = board.add("a", None, Some(15)).await.unwrap();

        // `a` takes x's slot, so x is rewritten after a's write and credit
        repo.fail_updates_of(Some(x.id.as_str()));
        let result = board.drop_on(&a.id, Some(DropTarget::Item(x.id.clone()))).await;
        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert_eq!(board.balance().await.unwrap(), 15);

        let reloaded = board.get(&a.id).unwrap();
        assert_eq!(reloaded.status, TaskStatus::Done);
        assert_eq!(reloaded.points_awarded, Some(true));
        assert_eq!(orders(&board.column(TaskStatus::Done)), vec![0, 1]);

        repo.fail_updates_of(None);
        board.move_to(&a.id, TaskStatus::Todo).await.unwrap();
        board.move_to(&a.id, TaskStatus::Done).await.unwrap();
        assert_eq!(board.balance().await.unwrap(), 15);
        assert!(board.last_error().is_none());
    }
}
