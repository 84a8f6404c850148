//! Container Ordering
//!
//! Keeps `order` contiguous (0, 1, 2, ...) inside every container.
//! Everything here is a total function over in-memory items.

use std::collections::{BTreeMap, HashSet};

use crate::domain::{DomainError, DomainResult, Positioned};

/// Rewrite orders to 0..n-1 following the given sequence
pub fn normalize_container<T: Positioned>(mut items: Vec<T>) -> Vec<T> {
    for (position, item) in items.iter_mut().enumerate() {
        item.set_order(position as i32);
    }
    items
}

/// Stable sort by current order; ties keep their input order
pub fn sort_by_order<T: Positioned>(items: &mut [T]) {
    items.sort_by_key(|item| item.order());
}

pub fn group_by_container<T: Positioned>(items: Vec<T>) -> BTreeMap<T::Container, Vec<T>> {
    let mut groups: BTreeMap<T::Container, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(item.container().clone()).or_default().push(item);
    }
    groups
}

/// Normalize every container at once
///
/// Groups are emitted in container-key order, each sorted by its new order.
pub fn normalize_all<T: Positioned>(items: Vec<T>) -> Vec<T> {
    group_by_container(items)
        .into_values()
        .flat_map(|mut group| {
            sort_by_order(&mut group);
            normalize_container(group)
        })
        .collect()
}

/// Re-index one container in place, leaving the others untouched
pub fn reindex_container<T: Positioned>(items: &mut [T], key: &T::Container) {
    let mut members: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.container() == key)
        .map(|(index, _)| index)
        .collect();
    members.sort_by_key(|&index| items[index].order());

    for (position, index) in members.into_iter().enumerate() {
        items[index].set_order(position as i32);
    }
}

/// Members of one container, sorted by order
pub fn container_members<'a, T: Positioned>(items: &'a [T], key: &T::Container) -> Vec<&'a T> {
    let mut members: Vec<&T> = items.iter().filter(|item| item.container() == key).collect();
    members.sort_by_key(|item| item.order());
    members
}

/// Add a new item at the front of its container
///
/// The item enters at order -1 and the container is normalized, so existing
/// members shift down by one.
pub fn insert_front<T: Positioned>(mut items: Vec<T>, mut item: T) -> Vec<T> {
    let key = item.container().clone();
    item.set_order(-1);
    items.push(item);
    reindex_container(&mut items, &key);
    items
}

/// Remove an item and close the gap it leaves
pub fn remove_and_reindex<T: Positioned>(mut items: Vec<T>, id: &T::Id) -> Option<(T, Vec<T>)> {
    let index = items.iter().position(|item| item.id() == id)?;
    let removed = items.remove(index);
    reindex_container(&mut items, removed.container());
    Some((removed, items))
}

/// Check that every container holds exactly the orders 0..n-1 and that
/// no id appears twice
pub fn verify_contiguous<T: Positioned>(items: &[T]) -> DomainResult<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id()) {
            return Err(DomainError::InvariantViolation(format!(
                "item {:?} appears more than once",
                item.id()
            )));
        }
    }

    let mut orders: BTreeMap<&T::Container, Vec<i32>> = BTreeMap::new();
    for item in items {
        orders.entry(item.container()).or_default().push(item.order());
    }

    for (key, mut found) in orders {
        found.sort_unstable();
        let contiguous = found.iter().enumerate().all(|(expected, &order)| order == expected as i32);
        if !contiguous {
            return Err(DomainError::InvariantViolation(format!(
                "container {:?} has orders {:?}",
                key, found
            )));
        }
    }
    Ok(())
}
