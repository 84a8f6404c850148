//! Library Service
//!
//! Folders and the notes inside them. Unlike the task board the library is
//! persisted as one snapshot, so every change saves the whole document.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{DomainError, DomainResult, Folder, LibrarySnapshot, Note, NotePatch, DEFAULT_FOLDER_ID};
use crate::ordering::{
    container_members, insert_front, normalize_all, remove_and_reindex, resolve_move, verify_contiguous,
    DropTarget, MoveOutcome, TargetOf,
};
use crate::repository::{LibraryRepository, SqliteLibraryRepository};

#[derive(Debug, Default)]
struct LibraryState {
    authoritative: LibrarySnapshot,
    working: LibrarySnapshot,
    error: Option<DomainError>,
}

pub struct LibraryService<L = SqliteLibraryRepository>
where
    L: LibraryRepository,
{
    repo: Arc<L>,
    state: RwLock<LibraryState>,
    writer: Mutex<()>,
}

impl<L: LibraryRepository> LibraryService<L> {
    pub fn new(repo: Arc<L>) -> Self {
        Self {
            repo,
            state: RwLock::new(LibraryState::default()),
            writer: Mutex::new(()),
        }
    }

    /// Load the library; a first run yields the default folder
    pub async fn init(&self) -> DomainResult<()> {
        let _guard = self.writer.lock().await;
        let snapshot = self.repo.load_snapshot().await.map_err(|e| self.record(e))?;
        let snapshot = normalize(snapshot);

        log::info!(
            "library loaded: {} folders, {} notes",
            snapshot.folders.len(),
            snapshot.notes.len()
        );
        let mut state = self.write();
        state.authoritative = snapshot.clone();
        state.working = snapshot;
        state.error = None;
        Ok(())
    }

    pub fn snapshot(&self) -> LibrarySnapshot {
        self.read().working.clone()
    }

    pub fn folders(&self) -> Vec<Folder> {
        let state = self.read();
        container_members(&state.working.folders, &()).into_iter().cloned().collect()
    }

    /// Notes of one folder, in display order
    pub fn notes_in(&self, folder_id: &str) -> Vec<Note> {
        let state = self.read();
        container_members(&state.working.notes, &folder_id.to_string())
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn note(&self, id: &str) -> Option<Note> {
        self.read().working.note(id).cloned()
    }

    pub fn last_error(&self) -> Option<DomainError> {
        self.read().error.clone()
    }

    pub fn clear_error(&self) {
        self.write().error = None;
    }

    /// New folder at the top of the list; blank names become "Untitled"
    pub async fn create_folder(&self, name: &str) -> DomainResult<Folder> {
        let _guard = self.writer.lock().await;
        let mut next = self.current();

        let name = match name.trim() {
            "" => "Untitled",
            trimmed => trimmed,
        };
        let folder = Folder::new(format!("f_{}", Uuid::new_v4().simple()), name, 0);
        let id = folder.id.clone();
        next.folders = insert_front(next.folders, folder);

        self.commit(next).await?;
        let created = self.read().working.folder(&id).cloned();
        created.ok_or_else(|| DomainError::not_found(&id))
    }

    /// Blank names keep the current one
    pub async fn rename_folder(&self, id: &str, name: &str) -> DomainResult<()> {
        let _guard = self.writer.lock().await;
        let mut next = self.current();

        let folder = next
            .folders
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| DomainError::not_found(id))?;
        let name = name.trim();
        if name.is_empty() || folder.name == name {
            return Ok(());
        }
        folder.name = name.to_string();
        folder.updated_at = Utc::now();

        self.commit(next).await
    }

    /// Delete a folder together with its notes
    pub async fn delete_folder(&self, id: &str) -> DomainResult<()> {
        if id == DEFAULT_FOLDER_ID {
            return Err(DomainError::InvalidInput("the default folder cannot be deleted".to_string()));
        }

        let _guard = self.writer.lock().await;
        let current = self.current();

        let (_, folders) =
            remove_and_reindex(current.folders, &id.to_string()).ok_or_else(|| DomainError::not_found(id))?;
        let notes: Vec<Note> = current.notes.into_iter().filter(|n| n.folder_id != id).collect();

        self.commit(LibrarySnapshot { folders, notes }).await
    }

    /// New note at the top of a folder; blank titles become "New note"
    pub async fn create_note(&self, folder_id: &str, title: &str) -> DomainResult<Note> {
        let _guard = self.writer.lock().await;
        let mut next = self.current();

        if next.folder(folder_id).is_none() {
            return Err(DomainError::not_found(folder_id));
        }
        let title = match title.trim() {
            "" => "New note",
            trimmed => trimmed,
        };
        let note = Note::new(format!("n_{}", Uuid::new_v4().simple()), folder_id, title, 0);
        let id = note.id.clone();
        next.notes = insert_front(next.notes, note);

        self.commit(next).await?;
        self.note(&id).ok_or_else(|| DomainError::not_found(&id))
    }

    /// Edit a note; moving it to another folder appends it there
    pub async fn update_note(&self, id: &str, patch: NotePatch) -> DomainResult<Note> {
        let _guard = self.writer.lock().await;
        let mut next = self.current();
        let now = Utc::now();

        let note = next
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| DomainError::not_found(id))?;

        if let Some(title) = patch.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            note.title = title.to_string();
        }
        if let Some(content) = patch.content {
            note.content = content;
        }
        note.updated_at = now;
        let source = note.folder_id.clone();

        if let Some(folder_id) = patch.folder_id.filter(|f| *f != source) {
            if next.folder(&folder_id).is_none() {
                return Err(DomainError::not_found(&folder_id));
            }
            let target = DropTarget::Container(folder_id);
            if let MoveOutcome::Moved(notes) = resolve_move(&next.notes, &id.to_string(), Some(&target), now)? {
                next.notes = notes;
            }
        }

        self.commit(next).await?;
        self.note(id).ok_or_else(|| DomainError::not_found(id))
    }

    pub async fn delete_note(&self, id: &str) -> DomainResult<()> {
        let _guard = self.writer.lock().await;
        let mut next = self.current();

        let (_, notes) =
            remove_and_reindex(next.notes, &id.to_string()).ok_or_else(|| DomainError::not_found(id))?;
        next.notes = notes;

        self.commit(next).await
    }

    /// Drop a folder over another one; returns whether anything moved
    pub async fn reorder_folder(&self, active: &str, over: Option<&str>) -> DomainResult<bool> {
        let _guard = self.writer.lock().await;
        let mut next = self.current();

        let target = over.map(|id| DropTarget::Item(id.to_string()));
        match resolve_move(&next.folders, &active.to_string(), target.as_ref(), Utc::now())? {
            MoveOutcome::Unchanged => Ok(false),
            MoveOutcome::Moved(folders) => {
                next.folders = folders;
                self.commit(next).await?;
                Ok(true)
            }
        }
    }

    /// Drop a note over another note or onto a folder
    pub async fn move_note(&self, active: &str, target: Option<TargetOf<Note>>) -> DomainResult<bool> {
        let _guard = self.writer.lock().await;
        let mut next = self.current();

        if let Some(DropTarget::Container(folder_id)) = &target {
            if next.folder(folder_id).is_none() {
                return Err(DomainError::not_found(folder_id));
            }
        }

        match resolve_move(&next.notes, &active.to_string(), target.as_ref(), Utc::now())? {
            MoveOutcome::Unchanged => Ok(false),
            MoveOutcome::Moved(notes) => {
                next.notes = notes;
                self.commit(next).await?;
                Ok(true)
            }
        }
    }

    /// Replace the whole library
    pub async fn apply_snapshot(&self, snapshot: LibrarySnapshot) -> DomainResult<()> {
        let _guard = self.writer.lock().await;
        self.commit(snapshot).await
    }

    fn current(&self) -> LibrarySnapshot {
        self.read().authoritative.clone()
    }

    /// Normalize, publish optimistically, then save; the caller holds the writer lock
    async fn commit(&self, next: LibrarySnapshot) -> DomainResult<()> {
        let next = normalize(next);
        verify_contiguous(&next.folders)?;
        verify_contiguous(&next.notes)?;

        if let Some(orphan) = next.notes.iter().find(|n| next.folder(&n.folder_id).is_none()) {
            return Err(DomainError::InvariantViolation(format!(
                "note {} points at missing folder {}",
                orphan.id, orphan.folder_id
            )));
        }

        if self.read().authoritative == next {
            return Ok(());
        }

        {
            let mut state = self.write();
            state.working = next.clone();
            state.error = None;
        }

        match self.repo.save_snapshot(&next).await {
            Ok(()) => {
                self.write().authoritative = next;
                Ok(())
            }
            Err(e) => {
                log::warn!("library save failed, reloading: {}", e);
                let reloaded = match self.repo.load_snapshot().await {
                    Ok(snapshot) => Some(normalize(snapshot)),
                    Err(reload) => {
                        log::error!("library reload also failed: {}", reload);
                        None
                    }
                };

                let mut state = self.write();
                if let Some(snapshot) = reloaded {
                    state.authoritative = snapshot;
                }
                state.working = state.authoritative.clone();
                state.error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn record(&self, error: DomainError) -> DomainError {
        self.write().error = Some(error.clone());
        error
    }

    fn read(&self) -> RwLockReadGuard<'_, LibraryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LibraryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn normalize(snapshot: LibrarySnapshot) -> LibrarySnapshot {
    LibrarySnapshot {
        folders: normalize_all(snapshot.folders),
        notes: normalize_all(snapshot.notes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::default_snapshot;
    use crate::repository::init_db;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Library repository whose saves can be made to fail
    struct FailingLibrary {
        inner: SqliteLibraryRepository,
        fail_saves: AtomicBool,
    }

    #[async_trait]
    impl LibraryRepository for FailingLibrary {
        async fn load_snapshot(&self) -> DomainResult<LibrarySnapshot> {
            self.inner.load_snapshot().await
        }

        async fn save_snapshot(&self, snapshot: &LibrarySnapshot) -> DomainResult<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(DomainError::Persistence("read-only".to_string()));
            }
            self.inner.save_snapshot(snapshot).await
        }
    }

    async fn library() -> LibraryService {
        let db = init_db(&PathBuf::from(":memory:")).await.expect("Failed to init test DB");
        let service = LibraryService::new(Arc::new(SqliteLibraryRepository::new(db.connection())));
        service.init().await.unwrap();
        service
    }

    fn names(folders: &[Folder]) -> Vec<String> {
        folders.iter().map(|f| f.name.clone()).collect()
    }

    fn titles(notes: &[Note]) -> Vec<String> {
        notes.iter().map(|n| n.title.clone()).collect()
    }

    fn orders<T: crate::domain::Positioned>(items: &[T]) -> Vec<i32> {
        items.iter().map(|i| i.order()).collect()
    }

    #[tokio::test]
    async fn test_first_run_has_default_folder() {
        let lib = library().await;
        let folders = lib.folders();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].id, DEFAULT_FOLDER_ID);
        assert_eq!(titles(&lib.notes_in(DEFAULT_FOLDER_ID)), vec!["Welcome!"]);
    }

    #[tokio::test]
    async fn test_create_folder_on_top() {
        let lib = library().await;
        let work = lib.create_folder(" Work ").await.unwrap();
        let blank = lib.create_folder("").await.unwrap();

        assert_eq!(work.name, "Work");
        assert_eq!(blank.name, "Untitled");
        assert_eq!(names(&lib.folders()), vec!["Untitled", "Work", "General"]);
        assert_eq!(orders(&lib.folders()), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_rename_folder() {
        let lib = library().await;
        let f = lib.create_folder("Draft").await.unwrap();

        lib.rename_folder(&f.id, "  ").await.unwrap();
        assert_eq!(lib.snapshot().folder(&f.id).unwrap().name, "Draft");

        lib.rename_folder(&f.id, "Final").await.unwrap();
        assert_eq!(lib.snapshot().folder(&f.id).unwrap().name, "Final");

        assert!(matches!(lib.rename_folder("nope", "x").await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_folder_cascades() {
        let lib = library().await;
        let g = lib.create_folder("G").await.unwrap();
        let f = lib.create_folder("F").await.unwrap();
        lib.create_note(&f.id, "f1").await.unwrap();
        lib.create_note(&f.id, "f2").await.unwrap();
        lib.create_note(&g.id, "g1").await.unwrap();

        lib.delete_folder(&f.id).await.unwrap();

        let snap = lib.snapshot();
        assert!(snap.notes.iter().all(|n| n.folder_id != f.id));
        assert_eq!(titles(&lib.notes_in(&g.id)), vec!["g1"]);
        assert_eq!(names(&lib.folders()), vec!["G", "General"]);
        assert_eq!(orders(&lib.folders()), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_default_folder_cannot_be_deleted() {
        let lib = library().await;
        let result = lib.delete_folder(DEFAULT_FOLDER_ID).await;
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        assert!(matches!(lib.delete_folder("nope").await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_note() {
        let lib = library().await;
        let note = lib.create_note(DEFAULT_FOLDER_ID, "   ").await.unwrap();

        assert_eq!(note.title, "New note");
        assert_eq!(titles(&lib.notes_in(DEFAULT_FOLDER_ID)), vec!["New note", "Welcome!"]);
        assert!(matches!(lib.create_note("nope", "x").await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_note_moves_between_folders() {
        let lib = library().await;
        let other = lib.create_folder("Other").await.unwrap();
        lib.create_note(&other.id, "already here").await.unwrap();

        let patch = NotePatch {
            title: Some("Hello".to_string()),
            content: Some("body".to_string()),
            folder_id: Some(other.id.clone()),
        };
        let moved = lib.update_note("welcome", patch).await.unwrap();

        assert_eq!(moved.folder_id, other.id);
        assert_eq!(moved.content, "body");
        assert_eq!(titles(&lib.notes_in(&other.id)), vec!["already here", "Hello"]);
        assert!(lib.notes_in(DEFAULT_FOLDER_ID).is_empty());

        let bad = NotePatch {
            folder_id: Some("nope".to_string()),
            ..NotePatch::default()
        };
        assert!(matches!(lib.update_note("welcome", bad).await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_note_closes_gap() {
        let lib = library().await;
        let a = lib.create_note(DEFAULT_FOLDER_ID, "a").await.unwrap();
        lib.create_note(DEFAULT_FOLDER_ID, "b").await.unwrap();

        lib.delete_note(&a.id).await.unwrap();
        let notes = lib.notes_in(DEFAULT_FOLDER_ID);
        assert_eq!(titles(&notes), vec!["b", "Welcome!"]);
        assert_eq!(orders(&notes), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_reorder_folders() {
        let lib = library().await;
        let c = lib.create_folder("C").await.unwrap();
        let b = lib.create_folder("B").await.unwrap();
        let a = lib.create_folder("A").await.unwrap();
        // A, B, C, General

        assert!(lib.reorder_folder(&a.id, Some(c.id.as_str())).await.unwrap());
        assert_eq!(names(&lib.folders()), vec!["B", "C", "A", "General"]);

        assert!(!lib.reorder_folder(&b.id, None).await.unwrap());
        assert!(!lib.reorder_folder(&b.id, Some(b.id.as_str())).await.unwrap());
    }

    #[tokio::test]
    async fn test_move_note_onto_folder() {
        let lib = library().await;
        let empty = lib.create_folder("Empty").await.unwrap();

        let moved = lib
            .move_note("welcome", Some(DropTarget::Container(empty.id.clone())))
            .await
            .unwrap();
        assert!(moved);
        assert_eq!(lib.note("welcome").unwrap().folder_id, empty.id);
        assert_eq!(lib.note("welcome").unwrap().order, 0);

        let unknown = lib
            .move_note("welcome", Some(DropTarget::Container("nope".to_string())))
            .await;
        assert!(matches!(unknown, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_apply_snapshot_normalizes() {
        let lib = library().await;
        let mut snap = default_snapshot();
        snap.folders.push(Folder::new("f2", "Second", 7));
        snap.notes.push(Note::new("n2", "f2", "Two", 3));

        lib.apply_snapshot(snap).await.unwrap();
        assert_eq!(orders(&lib.folders()), vec![0, 1]);
        assert_eq!(lib.note("n2").unwrap().order, 0);

        let mut orphaned = lib.snapshot();
        orphaned.notes.push(Note::new("n3", "ghost", "Lost", 0));
        assert!(matches!(
            lib.apply_snapshot(orphaned).await,
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back() {
        let db = init_db(&PathBuf::from(":memory:")).await.unwrap();
        let repo = Arc::new(FailingLibrary {
            inner: SqliteLibraryRepository::new(db.connection()),
            fail_saves: AtomicBool::new(false),
        });
        let lib = LibraryService::new(repo.clone());
        lib.init().await.unwrap();
        let kept = lib.create_folder("Kept").await.unwrap();

        repo.fail_saves.store(true, Ordering::SeqCst);
        let result = lib.create_folder("Lost").await;
        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert!(lib.last_error().is_some());
        assert_eq!(names(&lib.folders()), vec!["Kept", "General"]);
        assert!(lib.snapshot().folder(&kept.id).is_some());

        repo.fail_saves.store(false, Ordering::SeqCst);
        lib.clear_error();
        lib.create_folder("Saved").await.unwrap();
        assert_eq!(names(&lib.folders()), vec!["Saved", "Kept", "General"]);
        assert!(lib.last_error().is_none());
    }
}
