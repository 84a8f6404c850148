//! Completion Transitions
//!
//! Compares a proposed collection with the previous snapshot, finds items
//! that just entered the terminal state and marks their reward as paid.
//! The function is pure: it returns the awards and leaves crediting to the
//! caller.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Completable;

/// What happens to the paid flag when an item leaves the terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RearmPolicy {
    /// The reward is paid once per item, ever
    #[default]
    ConsumeOnce,
    /// Leaving the terminal state clears the flag, so a later completion
    /// pays again
    Rearm,
}

/// A reward owed for one completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Award<I> {
    pub item_id: I,
    pub amount: i64,
}

/// Output of [`apply_transitions`]
#[derive(Debug, Clone)]
pub struct Transitions<T: Completable> {
    pub items: Vec<T>,
    pub awards: Vec<Award<T::Id>>,
}

impl<T: Completable> Transitions<T> {
    pub fn award_for(&self, id: &T::Id) -> Option<&Award<T::Id>> {
        self.awards.iter().find(|award| &award.item_id == id)
    }
}

/// Detect terminal-entry edges between `previous` and `next`
///
/// An award fires when the item existed before, was not terminal, is
/// terminal now, and its flag is not already set. Terminal items with no
/// flag at all are legacy records: the flag is backfilled without paying.
/// Completion stamps are made consistent with the terminal state.
pub fn apply_transitions<T: Completable>(
    previous: &[T],
    next: Vec<T>,
    policy: RearmPolicy,
    now: DateTime<Utc>,
) -> Transitions<T> {
    let before: HashMap<&T::Id, &T> = previous.iter().map(|item| (item.id(), item)).collect();
    let mut awards = Vec::new();

    let items = next
        .into_iter()
        .map(|mut item| {
            let was_terminal = before.get(item.id()).map(|old| old.is_terminal());

            match (was_terminal, item.is_terminal()) {
                (Some(false), true) if item.points_awarded() != Some(true) => {
                    item.set_points_awarded(true);
                    let amount = item.reward_points();
                    if amount > 0 {
                        awards.push(Award {
                            item_id: item.id().clone(),
                            amount,
                        });
                    }
                }
                (Some(true), false) if policy == RearmPolicy::Rearm => {
                    item.set_points_awarded(false);
                }
                _ => {}
            }

            settle(&mut item, now);
            item
        })
        .collect();

    Transitions { items, awards }
}

/// Make stored items consistent without paying anything
///
/// Terminal items get a completion stamp and, when the flag is missing, a
/// set paid flag; other items lose any completion stamp. Used on loaded
/// snapshots, where there is no previous state to detect edges against.
pub fn settle_completion<T: Completable>(items: Vec<T>, now: DateTime<Utc>) -> Vec<T> {
    items
        .into_iter()
        .map(|mut item| {
            settle(&mut item, now);
            item
        })
        .collect()
}

fn settle<T: Completable>(item: &mut T, now: DateTime<Utc>) {
    if item.is_terminal() {
        if item.points_awarded().is_none() {
            item.set_points_awarded(true);
        }
        if item.completed_at().is_none() {
            item.set_completed_at(Some(now));
        }
    } else if item.completed_at().is_some() {
        item.set_completed_at(None);
    }
}
