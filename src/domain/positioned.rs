//! Positioning Contracts
//!
//! The ordering engine never looks at concrete entities. It works through
//! these traits: where an item lives, its rank there, how it is moved, and
//! (for tasks) whether it sits in the terminal state.

use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use super::entity::Entity;

/// An entity ranked inside a named container
pub trait Positioned: Entity {
    /// Key of the container (column, folder id, or a single scope)
    type Container: Clone + Eq + Ord + Hash + Debug + Send + Sync;

    fn container(&self) -> &Self::Container;

    /// Zero-based rank within the container
    fn order(&self) -> i32;

    fn set_order(&mut self, order: i32);
}

/// A positioned entity that can change containers
pub trait Relocatable: Positioned {
    /// Put the item into `to`, updating whatever bookkeeping the
    /// container change implies (completion stamp, modification time).
    fn relocate(&mut self, to: Self::Container, now: DateTime<Utc>);
}

/// An entity with a terminal state that pays out a one-time reward
pub trait Completable: Entity {
    fn is_terminal(&self) -> bool;

    fn reward_points(&self) -> i64;

    /// `None` only on records written before the flag existed
    fn points_awarded(&self) -> Option<bool>;

    fn set_points_awarded(&mut self, awarded: bool);

    fn completed_at(&self) -> Option<DateTime<Utc>>;

    fn set_completed_at(&mut self, at: Option<DateTime<Utc>>);
}
