//! Service Layer
//!
//! Stateful handles callers hold on to:
//! - coordinator: optimistic apply with diff persistence and reload on failure
//! - board: the kanban task board
//! - library: folders and notes

mod coordinator;
mod board;
mod library;

pub use coordinator::{SyncCoordinator, SyncState};
pub use board::TaskBoard;
pub use library::LibraryService;
