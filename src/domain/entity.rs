//! Domain Layer - Core Entity Trait
//!
//! This trait defines the basic contract for all domain entities.
//! All entities must have a unique ID and be thread-safe.

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Core trait for all domain entities
pub trait Entity: Sized + Send + Sync + Clone {
    /// The type of the entity's unique identifier
    type Id: Clone + Eq + Hash + Ord + Debug + Send + Sync;

    /// Returns the entity's unique identifier
    fn id(&self) -> &Self::Id;
}

/// Common result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DomainError {
    /// An operation referenced an item or container that does not exist
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The storage backend rejected a read or write
    #[error("Persistence failure: {0}")]
    Persistence(String),
    /// A computed ordering broke contiguity; never persisted
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Insufficient points: balance {balance}, cost {cost}")]
    InsufficientPoints { balance: i64, cost: i64 },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(what: impl Debug) -> Self {
        DomainError::NotFound(format!("{:?}", what))
    }

    /// Whether the error came from the storage backend
    pub fn is_persistence(&self) -> bool {
        matches!(self, DomainError::Persistence(_))
    }
}
