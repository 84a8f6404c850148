//! Move Resolution
//!
//! Turns "drop item X over target Y" into a complete new ordering.
//! Used for task columns, notes across folders, and folders among themselves.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::store::container_members;
use crate::domain::{DomainError, DomainResult, Entity, Positioned, Relocatable};

/// Where the dragged item was released
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropTarget<I, C> {
    /// Over another item: take its slot
    Item(I),
    /// Directly on a container: append at the end
    Container(C),
}

/// Drop target for a given entity type
pub type TargetOf<T> = DropTarget<<T as Entity>::Id, <T as Positioned>::Container>;

/// Result of resolving a move
#[derive(Clone, Debug, PartialEq)]
pub enum MoveOutcome<T> {
    /// Nothing to do: no target, dropped on itself, or same slot
    Unchanged,
    /// Full collection after the move
    Moved(Vec<T>),
}

/// Resolve a move request against the current collection
///
/// Same-container moves follow the array-move rule: the item is removed
/// first, then reinserted at the index the target held before the removal.
/// Cross-container moves insert at the target's index (clamped), relocating
/// the item. Only the affected containers are re-indexed.
pub fn resolve_move<T: Relocatable>(
    items: &[T],
    active: &T::Id,
    target: Option<&TargetOf<T>>,
    now: DateTime<Utc>,
) -> DomainResult<MoveOutcome<T>> {
    let source = items
        .iter()
        .find(|item| item.id() == active)
        .ok_or_else(|| DomainError::not_found(active))?
        .container()
        .clone();

    let Some(target) = target else {
        return Ok(MoveOutcome::Unchanged);
    };

    let (destination, over) = match target {
        DropTarget::Item(over_id) if over_id == active => return Ok(MoveOutcome::Unchanged),
        DropTarget::Item(over_id) => match items.iter().find(|item| item.id() == over_id) {
            Some(over) => (over.container().clone(), Some(over_id)),
            None => {
                log::debug!("drop target {:?} no longer exists, ignoring move", over_id);
                return Ok(MoveOutcome::Unchanged);
            }
        },
        DropTarget::Container(key) => (key.clone(), None),
    };

    let mut source_ids: Vec<T::Id> = container_members(items, &source)
        .into_iter()
        .map(|item| item.id().clone())
        .collect();
    let from = source_ids
        .iter()
        .position(|id| id == active)
        .ok_or_else(|| DomainError::Internal(format!("{:?} missing from its container", active)))?;

    let mut new_orders: HashMap<T::Id, i32> = HashMap::new();
    let mut relocated: Option<T> = None;

    if destination == source {
        let to = match over {
            Some(over_id) => source_ids.iter().position(|id| id == over_id).unwrap_or(source_ids.len()),
            None => source_ids.len(),
        };
        let moving = source_ids.remove(from);
        let to = to.min(source_ids.len());
        if to == from {
            return Ok(MoveOutcome::Unchanged);
        }
        source_ids.insert(to, moving);
        assign(&mut new_orders, &source_ids);
    } else {
        let mut target_ids: Vec<T::Id> = container_members(items, &destination)
            .into_iter()
            .map(|item| item.id().clone())
            .collect();
        let to = over
            .and_then(|over_id| target_ids.iter().position(|id| id == over_id))
            .unwrap_or(target_ids.len())
            .min(target_ids.len());

        let moving = source_ids.remove(from);
        target_ids.insert(to, moving);
        assign(&mut new_orders, &source_ids);
        assign(&mut new_orders, &target_ids);

        let mut item = items
            .iter()
            .find(|item| item.id() == active)
            .cloned()
            .ok_or_else(|| DomainError::not_found(active))?;
        item.relocate(destination, now);
        relocated = Some(item);
    }

    let moved = items
        .iter()
        .map(|item| {
            let mut next = match &relocated {
                Some(moving) if moving.id() == item.id() => moving.clone(),
                _ => item.clone(),
            };
            if let Some(&order) = new_orders.get(next.id()) {
                next.set_order(order);
            }
            next
        })
        .collect();

    Ok(MoveOutcome::Moved(moved))
}

fn assign<I: Clone + Eq + std::hash::Hash>(orders: &mut HashMap<I, i32>, sequence: &[I]) {
    for (position, id) in sequence.iter().enumerate() {
        orders.insert(id.clone(), position as i32);
    }
}
