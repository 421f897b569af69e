//! Pure functions for item id handling.
//!
//! Ids are typed on the command line as comma-separated lists and inclusive
//! ranges, e.g. `1,3-5 7`.

use crate::error::{Result, TasklineError};
use crate::item::Item;
use std::collections::HashSet;

/// Longest range a single token may expand to
const MAX_RANGE_LEN: u64 = 10_000;

fn parse_id(token: &str) -> Result<u64> {
    let token = token.trim();
    let token = token.strip_prefix('@').unwrap_or(token);
    match token.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(TasklineError::InvalidId(token.to_string())),
    }
}

fn parse_range(token: &str) -> Result<Vec<u64>> {
    let invalid = || TasklineError::InvalidIdRange(token.to_string());
    let (start, end) = token.split_once('-').ok_or_else(invalid)?;
    let start: u64 = start.trim().parse().map_err(|_| invalid())?;
    let end: u64 = end.trim().parse().map_err(|_| invalid())?;
    if start == 0 || start > end || end - start >= MAX_RANGE_LEN {
        return Err(invalid());
    }
    Ok((start..=end).collect())
}

/// Expand id arguments into a de-duplicated list, keeping first-seen order.
///
/// `"2-4"` yields `[2, 3, 4]`; `"2,3-4"` yields `[2, 3, 4]`.
pub fn parse_ids<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for input in inputs {
        for token in input.as_ref().split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if token.contains('-') {
                ids.extend(parse_range(token)?);
            } else {
                ids.push(parse_id(token)?);
            }
        }
    }

    if ids.is_empty() {
        return Err(TasklineError::InvalidId(String::new()));
    }

    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));
    Ok(ids)
}

/// Parse exactly one id
pub fn parse_single_id(input: &str) -> Result<u64> {
    match parse_ids(&[input])?.as_slice() {
        [id] => Ok(*id),
        _ => Err(TasklineError::InvalidId(input.to_string())),
    }
}

/// Fail on the first id that is not part of `items`
pub fn validate_ids(ids: &[u64], items: &[Item]) -> Result<()> {
    let known: HashSet<u64> = items.iter().map(Item::id).collect();
    match ids.iter().find(|id| !known.contains(id)) {
        Some(id) => Err(TasklineError::InvalidId(id.to_string())),
        None => Ok(()),
    }
}

/// The id a new item in `items` receives
pub fn next_id(items: &[Item]) -> u64 {
    items.iter().map(Item::id).max().unwrap_or(0) + 1
}
