//! Mindboard Engine
//!
//! Ordered multi-container collections for a kanban board and a note library.
//!
//! Layered architecture:
//! - domain: Core entities and the positioning traits
//! - ordering: Pure ordering, move resolution and completion rewards
//! - repository: Data access abstractions and SQLite implementations
//! - service: Board and library handles with optimistic persistence
//! - engine: Wiring from an `EngineConfig` to ready services

pub mod domain;
pub mod ordering;
pub mod repository;
pub mod service;
pub mod config;
pub mod engine;

pub use config::{ConfigError, EngineConfig};
pub use domain::{DomainError, DomainResult, Folder, LibrarySnapshot, Note, NotePatch, Task, TaskStatus};
pub use engine::{init_logging, Engine};
pub use ordering::{DropTarget, MoveOutcome, RearmPolicy};
pub use service::{LibraryService, SyncCoordinator, TaskBoard};
