//! Domain Layer
//!
//! Entities, the positioning traits the ordering engine works against,
//! and the domain error type.
//! This layer has NO storage dependencies (only serde, chrono, thiserror).

mod entity;
mod positioned;
mod task;
mod library;

pub use entity::{Entity, DomainError, DomainResult};
pub use positioned::{Completable, Positioned, Relocatable};
pub use task::{
    validate_points, ChecklistItem, NewTask, Task, TaskStatus, DEFAULT_TASK_POINTS, MAX_TASK_POINTS,
};
pub use library::{
    default_snapshot, Folder, LibrarySnapshot, Note, NotePatch, DEFAULT_FOLDER_ID,
};
