//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for data access.
//! The services only see these traits; implementations can use SQLite,
//! in-memory fakes, etc.

use async_trait::async_trait;

use crate::domain::{DomainResult, LibrarySnapshot, Positioned};

/// Core repository trait for positioned entities
///
/// All operations are async and may fail with a persistence error.
#[async_trait]
pub trait Repository<T: Positioned>: Send + Sync {
    /// Input accepted by `create`; id and timestamps are assigned here
    type Draft: Send + 'static;

    /// List all entities
    async fn list(&self) -> DomainResult<Vec<T>>;

    /// Find entity by ID
    async fn find_by_id(&self, id: &T::Id) -> DomainResult<Option<T>>;

    /// Create a new entity from a draft
    async fn create(&self, draft: Self::Draft) -> DomainResult<T>;

    /// Replace an existing entity; returns it with `updated_at` stamped
    async fn update(&self, entity: &T) -> DomainResult<T>;

    /// Delete entity by ID
    async fn remove(&self, id: &T::Id) -> DomainResult<()>;

    /// Put an entity into another container, keeping its stored order
    async fn move_to(&self, id: &T::Id, container: T::Container) -> DomainResult<T>;
}

/// Destination for one-time completion rewards
///
/// Idempotency is the caller's job; every call credits.
#[async_trait]
pub trait RewardLedger: Send + Sync {
    async fn credit(&self, item_id: &str, amount: i64) -> DomainResult<()>;

    async fn balance(&self) -> DomainResult<i64>;
}

/// Library storage: the whole snapshot is read and written as one unit
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    async fn load_snapshot(&self) -> DomainResult<LibrarySnapshot>;

    async fn save_snapshot(&self, snapshot: &LibrarySnapshot) -> DomainResult<()>;
}
