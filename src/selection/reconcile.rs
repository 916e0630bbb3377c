// Pure ordering rules shared by the read and write paths of the selection store

use std::collections::HashSet;

use crate::catalog::{CatalogKind, SelectionEntry};

/// Merge the user's chosen ids with their requested display order.
///
/// Ids in `ordered` that are still selected keep their relative order; any
/// selected id the order does not mention is appended in selection order.
/// Duplicates on either side collapse to their first occurrence.
pub fn final_order(selected: &[String], ordered: &[String]) -> Vec<String> {
    let selected_set: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut result = Vec::with_capacity(selected.len());

    for id in ordered {
        if selected_set.contains(id.as_str()) && seen.insert(id.as_str()) {
            result.push(id.clone());
        }
    }
    for id in selected {
        if seen.insert(id.as_str()) {
            result.push(id.clone());
        }
    }

    result
}

/// Entry ids of the active rows, by ascending priority.
///
/// Unranked rows sort after every ranked one; ties keep fetch order.
pub fn sort_by_priority(rows: &[SelectionEntry]) -> Vec<String> {
    let mut active: Vec<&SelectionEntry> = rows.iter().filter(|r| r.is_active).collect();
    active.sort_by_key(|r| (r.priority.is_none(), r.priority));
    active.into_iter().map(|r| r.entry_id.clone()).collect()
}

/// Rows to upsert for `order`, ranked from 1.
pub fn ranked_rows(user_id: &str, kind: CatalogKind, order: &[String]) -> Vec<SelectionEntry> {
    order
        .iter()
        .enumerate()
        .map(|(index, id)| SelectionEntry {
            user_id: user_id.to_string(),
            catalog: kind,
            entry_id: id.clone(),
            priority: Some(index as i64 + 1),
            is_active: true,
        })
        .collect()
}

/// Ids of existing rows that `order` no longer contains.
pub fn stale_ids(existing: &[SelectionEntry], order: &[String]) -> Vec<String> {
    let keep: HashSet<&str> = order.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    existing
        .iter()
        .filter(|r| !keep.contains(r.entry_id.as_str()))
        .filter(|r| seen.insert(r.entry_id.as_str()))
        .map(|r| r.entry_id.clone())
        .collect()
}

/// Swap `id` with its predecessor. A first or missing id leaves the order unchanged.
pub fn move_up(ordered: &[String], id: &str) -> Vec<String> {
    let mut result = ordered.to_vec();
    if let Some(pos) = result.iter().position(|x| x == id) {
        if pos > 0 {
            result.swap(pos - 1, pos);
        }
    }
    result
}

/// Swap `id` with its successor. A last or missing id leaves the order unchanged.
pub fn move_down(ordered: &[String], id: &str) -> Vec<String> {
    let mut result = ordered.to_vec();
    if let Some(pos) = result.iter().position(|x| x == id) {
        if pos + 1 < result.len() {
            result.swap(pos, pos + 1);
        }
    }
    result
}
