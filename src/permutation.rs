//! Orderings in which pieces are offered to the placer.
//!
//! Pieces are grouped by dimension class, large classes are split into up
//! to five ordering groups, and every ordering of the (at most five) most
//! frequent groups is generated. The remaining groups keep their position at
//! the tail of each ordering.

use std::collections::HashSet;

use crate::types::{GroupedTileDimensions, TileDimensions};

/// Most ordering groups that are permuted; `5! = 120` orderings at most.
pub const MAX_PERMUTED_GROUPS: usize = 5;

pub const DEFAULT_MAX_PERMUTATIONS: usize = 50;

/// Builds at most `max_permutations` distinct piece orderings.
pub fn generate(tiles: &[TileDimensions], max_permutations: usize) -> Vec<Vec<TileDimensions>> {
    if tiles.is_empty() || max_permutations == 0 {
        return Vec::new();
    }

    let grouped = assign_groups(tiles);
    let classes = classes_by_quantity(&grouped);

    let split = classes.len().min(MAX_PERMUTED_GROUPS);
    let (permuted, tail) = classes.split_at(split);

    let mut seen: HashSet<Vec<(u32, u32)>> = HashSet::new();
    let mut orderings = Vec::new();

    for mut order in permutations(permuted) {
        order.extend_from_slice(tail);

        let mut arranged = grouped.clone();
        // Stable: pieces of one class keep their relative order.
        arranged.sort_by_key(|g| {
            let key = g.class_key();
            order.iter().position(|k| *k == key).unwrap_or(order.len())
        });

        let signature: Vec<(u32, u32)> = arranged.iter().map(|g| g.tile.dimensions()).collect();
        if !seen.insert(signature) {
            continue;
        }

        orderings.push(arranged.into_iter().map(|g| g.tile).collect());
        if orderings.len() >= max_permutations {
            break;
        }
    }

    tracing::debug!(
        pieces = tiles.len(),
        classes = classes.len(),
        orderings = orderings.len(),
        "generated piece orderings"
    );

    orderings
}

/// Tags each piece with an ordering group.
///
/// A dimension class whose quantity is above the average class size is
/// split in halves across consecutive groups, as long as the total number
/// of groups stays below [`MAX_PERMUTED_GROUPS`].
pub fn assign_groups(tiles: &[TileDimensions]) -> Vec<GroupedTileDimensions> {
    let class_counts = count_in_order(tiles.iter().map(TileDimensions::dimensions));
    let distinct = class_counts.len();
    if distinct == 0 {
        return Vec::new();
    }
    let split_greater_than = tiles.len() / distinct;

    let mut group_counts: Vec<((u32, u32, u8), usize)> = Vec::new();
    let mut group: u8 = 0;
    let mut grouped = Vec::with_capacity(tiles.len());

    for tile in tiles {
        let key = (tile.width, tile.height, group);
        let in_group = match group_counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => {
                *n += 1;
                *n
            }
            None => {
                group_counts.push((key, 1));
                1
            }
        };
        grouped.push(GroupedTileDimensions::new(*tile, group));

        let quantity = class_counts
            .iter()
            .find(|(dims, _)| *dims == tile.dimensions())
            .map_or(0, |(_, n)| *n);

        if (group as usize) + distinct < MAX_PERMUTED_GROUPS
            && quantity > split_greater_than
            && in_group > quantity / 2
        {
            group += 1;
        }
    }

    grouped
}

/// Distinct group keys sorted by descending quantity, ties in first
/// appearance order.
fn classes_by_quantity(grouped: &[GroupedTileDimensions]) -> Vec<(u32, u32, u8)> {
    let mut counts = count_in_order(grouped.iter().map(GroupedTileDimensions::class_key));
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().map(|(key, _)| key).collect()
}

fn count_in_order<K: PartialEq>(keys: impl Iterator<Item = K>) -> Vec<(K, usize)> {
    let mut counts: Vec<(K, usize)> = Vec::new();
    for key in keys {
        match counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => *n += 1,
            None => counts.push((key, 1)),
        }
    }
    counts
}

/// All orderings of `items`, in lexicographic order of positions.
pub fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(items.len());
    let mut used = vec![false; items.len()];
    permute(items, &mut used, &mut current, &mut out);
    out
}

fn permute<T: Clone>(items: &[T], used: &mut [bool], current: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
    if current.len() == items.len() {
        out.push(current.clone());
        return;
    }
    for i in 0..items.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        current.push(items[i].clone());
        permute(items, used, current, out);
        current.pop();
        used[i] = false;
    }
}
