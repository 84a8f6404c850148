//! Repository Layer
//!
//! Data access abstractions and implementations.

mod traits;
mod db;
mod kv;
mod task_repo;
mod library_repo;
mod reward_repo;


pub use traits::{LibraryRepository, Repository, RewardLedger};
pub use db::{init_db, DbState, SharedConnection};
pub use kv::KvStore;
pub use task_repo::TaskRepository;
pub use library_repo::SqliteLibraryRepository;
pub use reward_repo::{KvRewardLedger, LedgerState, RewardProduct};
