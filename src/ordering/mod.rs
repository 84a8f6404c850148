//! Ordering Engine
//!
//! Pure, storage-free logic shared by the task board and the library:
//! - store: contiguous per-container ordering
//! - reorder: drag-and-drop move resolution
//! - transition: terminal-state edges and one-time rewards

pub mod store;
pub mod reorder;
pub mod transition;

pub use reorder::{resolve_move, DropTarget, MoveOutcome, TargetOf};
pub use store::{
    container_members, insert_front, normalize_all, normalize_container, reindex_container,
    remove_and_reindex, verify_contiguous,
};
pub use transition::{apply_transitions, settle_completion, Award, RearmPolicy, Transitions};
